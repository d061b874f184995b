//! Image and plate snapshots.
//!
//! # Responsibility
//! - Carry the image metadata a check needs (dimensions, channel labels,
//!   creation time, pixel range) without holding pixel data.
//! - Address pixel planes by their (z, c, t) coordinate.
//!
//! # Invariants
//! - A snapshot reflects the server state at fetch time and is never
//!   updated in place.
//! - `Plane::samples` is row-major with `width * height` entries.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Server-assigned image identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ImageId(pub i64);

impl Display for ImageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned plate identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlateId(pub i64);

impl Display for PlateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata snapshot of one remote image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSnapshot {
    pub id: ImageId,
    pub name: String,
    /// Focal sections.
    pub size_z: usize,
    /// Channels.
    pub size_c: usize,
    /// Timepoints.
    pub size_t: usize,
    /// Plane width in pixels.
    pub size_x: usize,
    /// Plane height in pixels.
    pub size_y: usize,
    /// One label per channel; may be shorter than `size_c` for
    /// sparsely-annotated imports.
    pub channel_labels: Vec<String>,
    /// Creation-event time, unix epoch milliseconds.
    pub created_at: i64,
    /// Largest representable sample value for the image's pixel type.
    pub pixel_max: f64,
}

impl ImageSnapshot {
    /// Every (z, c, t) plane coordinate, z-major.
    pub fn plane_coordinates(&self) -> Vec<(usize, usize, usize)> {
        let mut coordinates = Vec::with_capacity(self.size_z * self.size_c * self.size_t);
        for z in 0..self.size_z {
            for c in 0..self.size_c {
                for t in 0..self.size_t {
                    coordinates.push((z, c, t));
                }
            }
        }
        coordinates
    }

    /// Label of channel `c`, falling back to a positional name when the
    /// import carried no label for it.
    pub fn channel_label(&self, c: usize) -> String {
        self.channel_labels
            .get(c)
            .cloned()
            .unwrap_or_else(|| format!("channel {c}"))
    }
}

/// One pixel plane fetched from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    /// Row-major samples, `width * height` entries.
    pub samples: Vec<f64>,
}

impl Plane {
    /// Builds a plane from row-major samples; `None` when the sample count
    /// does not match the dimensions.
    pub fn from_samples(width: usize, height: usize, samples: Vec<f64>) -> Option<Self> {
        if samples.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            samples,
        })
    }

    /// A plane with every sample set to `value`.
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            samples: vec![value; width * height],
        }
    }

    pub fn sample(&self, x: usize, y: usize) -> f64 {
        self.samples[y * self.width + x]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageSnapshot, Plane, PlateId};

    fn snapshot() -> ImageSnapshot {
        ImageSnapshot {
            id: super::ImageId(7),
            name: "well A1".to_string(),
            size_z: 2,
            size_c: 2,
            size_t: 1,
            size_x: 4,
            size_y: 4,
            channel_labels: vec!["DAPI".to_string()],
            created_at: 0,
            pixel_max: 255.0,
        }
    }

    #[test]
    fn plane_coordinates_are_z_major() {
        let coordinates = snapshot().plane_coordinates();
        assert_eq!(
            coordinates,
            vec![(0, 0, 0), (0, 1, 0), (1, 0, 0), (1, 1, 0)]
        );
    }

    #[test]
    fn channel_label_falls_back_to_position() {
        let snap = snapshot();
        assert_eq!(snap.channel_label(0), "DAPI");
        assert_eq!(snap.channel_label(1), "channel 1");
    }

    #[test]
    fn plane_from_samples_checks_shape() {
        assert!(Plane::from_samples(2, 2, vec![0.0; 4]).is_some());
        assert!(Plane::from_samples(2, 2, vec![0.0; 3]).is_none());
    }

    #[test]
    fn plane_sample_is_row_major() {
        let plane = Plane::from_samples(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(plane.sample(1, 0), 2.0);
        assert_eq!(plane.sample(0, 1), 3.0);
    }

    #[test]
    fn ids_display_as_plain_numbers() {
        assert_eq!(PlateId(42).to_string(), "42");
    }
}
