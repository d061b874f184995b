//! Saturation detection check.
//!
//! # Responsibility
//! - Report, per plane, the fraction of samples clipped at the image's
//!   maximum representable value.
//!
//! # Invariants
//! - The saturation level comes from the image's pixel type, never from
//!   the observed sample range.

use crate::engine::{CheckError, CheckResult, QualityCheck};
use crate::gateway::Connection;
use crate::model::{AnnotationTarget, ImageId, NewAnnotation};

/// Clipped-sample fraction per plane.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaturationCheck;

impl QualityCheck for SaturationCheck {
    fn check_name(&self) -> &'static str {
        "saturation"
    }

    fn version(&self) -> &'static str {
        "0.1"
    }

    fn check(&self, conn: &mut Connection, image: ImageId) -> Result<CheckResult, CheckError> {
        let snapshot = conn.image(image)?;
        let mut rows = Vec::new();
        for (z, c, t) in snapshot.plane_coordinates() {
            let plane = conn.plane(image, z, c, t)?;
            if plane.is_empty() {
                return Err(CheckError::Computation(format!(
                    "image {image} plane z={z} c={c} t={t} has no samples"
                )));
            }
            let clipped = plane
                .samples
                .iter()
                .filter(|sample| **sample >= snapshot.pixel_max)
                .count();
            let fraction = clipped as f64 / plane.len() as f64;
            rows.push((
                format!("{} saturation", snapshot.channel_label(c)),
                format!("{fraction}"),
            ));
        }
        Ok(CheckResult::Entries(rows))
    }

    fn store(
        &self,
        conn: &mut Connection,
        image: ImageId,
        result: &CheckResult,
        namespace: &str,
    ) -> Result<(), CheckError> {
        let CheckResult::Entries(rows) = result else {
            return Err(CheckError::Computation(
                "saturation expects labelled rows".to_string(),
            ));
        };
        let annotation = NewAnnotation::map(rows.clone()).namespaced(namespace);
        conn.save_annotation(AnnotationTarget::Image(image), &annotation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SaturationCheck;
    use crate::engine::QualityCheck;

    #[test]
    fn identity_matches_tag_format() {
        let check = SaturationCheck;
        assert_eq!(check.completion_tag(), "#saturation_v0.1");
        assert_eq!(check.namespace(), "saturation.qualitycheck");
    }
}
