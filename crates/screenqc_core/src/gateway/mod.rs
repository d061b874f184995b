//! Server gateway: the seam between local logic and the remote store.
//!
//! # Responsibility
//! - Define the transport/session contract every backend implements.
//! - Own the connection lifecycle, including the one-shot reconnect on a
//!   lost session.
//!
//! # Invariants
//! - All remote mutation is append-only except deletion of annotations the
//!   caller explicitly names.
//! - A lost session is retried exactly once per operation, never more.

use crate::config::ConfigError;
use crate::model::{
    Annotation, AnnotationId, AnnotationTarget, ImageId, ImageSnapshot, NewAnnotation, Plane,
};
use crate::query::ComposedQuery;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod connection;
pub mod memory;

pub use connection::Connection;
pub use memory::{ImageSpec, MemoryServer, PlaneSpec};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Remote-call failure.
#[derive(Debug)]
pub enum GatewayError {
    /// Settings were rejected before any connect attempt.
    Config(ConfigError),
    /// Session establishment failed.
    Connect { endpoint: String, message: String },
    /// The transport reported the session as gone; recoverable once.
    ConnectionLost,
    /// The server knows no image with this id.
    ImageNotFound(ImageId),
    /// The requested plane coordinate is outside the image's dimensions.
    PlaneOutOfRange {
        image: ImageId,
        z: usize,
        c: usize,
        t: usize,
    },
    /// Any other server-side failure.
    Remote(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Connect { endpoint, message } => {
                write!(f, "connection {endpoint} failed: {message}")
            }
            Self::ConnectionLost => write!(f, "server connection lost"),
            Self::ImageNotFound(id) => write!(f, "image not found: {id}"),
            Self::PlaneOutOfRange { image, z, c, t } => {
                write!(f, "image {image} has no plane at z={z} c={c} t={t}")
            }
            Self::Remote(message) => write!(f, "server error: {message}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for GatewayError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// One live session against the server.
///
/// Implementations surface a dead transport as
/// [`GatewayError::ConnectionLost`]; the [`Connection`] wrapper decides
/// whether to retry.
pub trait Session {
    /// Runs a composed image query, returning ids in server order.
    fn find_images(&self, query: &ComposedQuery) -> GatewayResult<Vec<ImageId>>;

    /// Fetches one image's metadata snapshot.
    fn image(&self, id: ImageId) -> GatewayResult<ImageSnapshot>;

    /// Fetches the pixel plane at (z, c, t).
    fn plane(&self, id: ImageId, z: usize, c: usize, t: usize) -> GatewayResult<Plane>;

    /// Lists annotations on a target, optionally restricted to a namespace.
    fn annotations(
        &self,
        target: AnnotationTarget,
        namespace: Option<&str>,
    ) -> GatewayResult<Vec<Annotation>>;

    /// Creates an annotation and links it to the target.
    fn save_annotation(
        &self,
        target: AnnotationTarget,
        annotation: &NewAnnotation,
    ) -> GatewayResult<AnnotationId>;

    /// Deletes the named annotations; returns how many existed.
    fn delete_annotations(&self, ids: &[AnnotationId]) -> GatewayResult<usize>;
}

/// Session factory for one server endpoint.
pub trait Transport {
    fn connect(
        &self,
        config: &crate::config::ConnectionConfig,
    ) -> GatewayResult<Box<dyn Session>>;
}
