//! Annotation values and links.
//!
//! # Responsibility
//! - Model the typed annotation kinds the server stores (tag, key-value map,
//!   numeric, file attachment).
//! - Keep namespace scoping explicit, since it is what makes check output
//!   removable and re-runs idempotent.
//!
//! # Invariants
//! - An annotation is linked to exactly one image or plate.
//! - Map rows preserve insertion order and may repeat keys.

use crate::model::image::{ImageId, PlateId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Server-assigned annotation identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AnnotationId(pub i64);

impl Display for AnnotationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The object an annotation is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationTarget {
    Image(ImageId),
    Plate(PlateId),
}

impl Display for AnnotationTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(id) => write!(f, "image {id}"),
            Self::Plate(id) => write!(f, "plate {id}"),
        }
    }
}

/// Typed annotation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationValue {
    /// Short text sentinel, e.g. `#noqc` or a check's completion tag.
    Tag(String),
    /// Key-value rows; duplicate keys are allowed and order is preserved.
    Map(Vec<(String, String)>),
    /// Single numeric value.
    Double(f64),
    /// Binary attachment.
    File {
        name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl AnnotationValue {
    /// Tag text when this is a tag annotation.
    pub fn tag_text(&self) -> Option<&str> {
        match self {
            Self::Tag(text) => Some(text),
            _ => None,
        }
    }
}

/// Annotation snapshot fetched from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub value: AnnotationValue,
}

/// Annotation to be created and linked by an update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub value: AnnotationValue,
}

impl NewAnnotation {
    pub fn tag(text: impl Into<String>) -> Self {
        Self::from_value(AnnotationValue::Tag(text.into()))
    }

    pub fn map(rows: Vec<(String, String)>) -> Self {
        Self::from_value(AnnotationValue::Map(rows))
    }

    pub fn double(value: f64) -> Self {
        Self::from_value(AnnotationValue::Double(value))
    }

    pub fn file(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::from_value(AnnotationValue::File {
            name: name.into(),
            mime: mime.into(),
            bytes,
        })
    }

    /// Scopes the annotation to a namespace.
    pub fn namespaced(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Gives the annotation a display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn from_value(value: AnnotationValue) -> Self {
        Self {
            namespace: None,
            name: None,
            value,
        }
    }
}
