//! Quality-check engine.
//!
//! # Responsibility
//! - Define the pluggable check contract and drive the per-image
//!   check/store loop over eligible candidates.
//!
//! # Invariants
//! - Eligibility is decided entirely by tags: a check's completion tag on
//!   an image, or `#noqc` on the image or its plate, excludes it.
//! - A stored image carries its completion tag and result annotations in
//!   the check's namespace, and nothing else from this engine.

use crate::gateway::GatewayError;
use crate::model::ImageId;
use crate::query::QueryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod check;
pub mod runner;

pub use check::{CheckResult, QualityCheck};
pub use runner::{QcEngine, RunSummary};

pub type EngineResult<T> = Result<T, EngineError>;

/// Per-image failure inside a check's own `check` or `store`.
#[derive(Debug)]
pub enum CheckError {
    Gateway(GatewayError),
    /// The numeric computation could not produce a result.
    Computation(String),
    /// Staging an artifact on the local filesystem failed.
    Io(std::io::Error),
    /// Rendering or encoding a plot artifact failed.
    Encode(image::ImageError),
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gateway(err) => write!(f, "{err}"),
            Self::Computation(message) => write!(f, "computation failed: {message}"),
            Self::Io(err) => write!(f, "artifact staging failed: {err}"),
            Self::Encode(err) => write!(f, "artifact encoding failed: {err}"),
        }
    }
}

impl Error for CheckError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Gateway(err) => Some(err),
            Self::Computation(_) => None,
            Self::Io(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<GatewayError> for CheckError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<std::io::Error> for CheckError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<image::ImageError> for CheckError {
    fn from(value: image::ImageError) -> Self {
        Self::Encode(value)
    }
}

/// Run-level engine failure; the first one aborts the remaining run.
#[derive(Debug)]
pub enum EngineError {
    /// Check names feed tags and namespaces, so their shape is restricted.
    InvalidCheckName(String),
    Query(QueryError),
    Gateway(GatewayError),
    /// A check failed on one image; earlier images keep their results.
    Check { image: ImageId, source: CheckError },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCheckName(name) => write!(f, "invalid check name: {name}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::Gateway(err) => write!(f, "{err}"),
            Self::Check { image, source } => {
                write!(f, "check failed on image {image}: {source}")
            }
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCheckName(_) => None,
            Self::Query(err) => Some(err),
            Self::Gateway(err) => Some(err),
            Self::Check { source, .. } => Some(source),
        }
    }
}

impl From<QueryError> for EngineError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<GatewayError> for EngineError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}
