//! Value snapshots of remote entities.
//!
//! # Responsibility
//! - Mirror the server's object graph (images, plates, annotations) as
//!   immutable local values.
//!
//! # Invariants
//! - Ids are opaque and server-assigned; the client never mints them.
//! - Snapshots are never mutated locally; every change is a remote call.

pub mod annotation;
pub mod image;

pub use annotation::{
    Annotation, AnnotationId, AnnotationTarget, AnnotationValue, NewAnnotation,
};
pub use image::{ImageId, ImageSnapshot, Plane, PlateId};
