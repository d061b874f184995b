//! Contrast measurement check.
//!
//! # Responsibility
//! - Measure per-plane contrast as the interquartile range over the
//!   median, `(P75 - P25) / P50`.
//!
//! # Invariants
//! - A near-zero median yields the `divide by zero` sentinel row instead
//!   of an unbounded ratio.
//! - One result row per (z, c, t) plane, in plane order; channel labels
//!   repeat across z and t.

use crate::checks::stats::percentile;
use crate::engine::{CheckError, CheckResult, QualityCheck};
use crate::gateway::Connection;
use crate::model::{AnnotationTarget, ImageId, NewAnnotation};

/// Medians below this magnitude are reported as the sentinel row.
const MEDIAN_EPSILON: f64 = 1e-5;

const DIVIDE_BY_ZERO: &str = "divide by zero";

/// Interquartile-over-median contrast per plane.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContrastMeasure;

impl QualityCheck for ContrastMeasure {
    fn check_name(&self) -> &'static str {
        "contrast"
    }

    fn version(&self) -> &'static str {
        "0.1"
    }

    fn check(&self, conn: &mut Connection, image: ImageId) -> Result<CheckResult, CheckError> {
        let snapshot = conn.image(image)?;
        let mut rows = Vec::new();
        for (z, c, t) in snapshot.plane_coordinates() {
            let plane = conn.plane(image, z, c, t)?;
            let label = format!("{} contrast", snapshot.channel_label(c));

            let median = percentile(&plane.samples, 50.0);
            let value = if median.abs() < MEDIAN_EPSILON {
                DIVIDE_BY_ZERO.to_string()
            } else {
                let spread = percentile(&plane.samples, 75.0) - percentile(&plane.samples, 25.0);
                format!("{}", spread / median)
            };
            rows.push((label, value));
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
                "contrast expects labelled rows".to_string(),
            ));
        };
        let annotation = NewAnnotation::map(rows.clone()).namespaced(namespace);
        conn.save_annotation(AnnotationTarget::Image(image), &annotation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ContrastMeasure, MEDIAN_EPSILON};
    use crate::engine::QualityCheck;

    #[test]
    fn identity_matches_tag_format() {
        let check = ContrastMeasure;
        assert_eq!(check.completion_tag(), "#contrast_v0.1");
        assert_eq!(check.namespace(), "contrast.qualitycheck");
    }

    #[test]
    fn epsilon_only_guards_near_zero_medians() {
        assert!(0.5_f64.abs() >= MEDIAN_EPSILON);
        assert!(1e-6_f64.abs() < MEDIAN_EPSILON);
    }
}
