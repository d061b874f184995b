//! The pluggable check contract.
//!
//! # Responsibility
//! - Separate the per-image computation (`check`) from result persistence
//!   (`store`), so the engine can wrap storage with completion tagging.
//!
//! # Invariants
//! - `(check_name, version)` is a check's identity; both feed the
//!   completion tag, so bumping the version makes every image eligible
//!   again under the new identity while old results stay in place.

use crate::engine::CheckError;
use crate::gateway::Connection;
use crate::model::ImageId;
use std::collections::BTreeMap;

/// Result of one check over one image.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    /// Labelled text rows, stored as one key-value map annotation.
    /// Duplicate labels across planes are preserved.
    Entries(Vec<(String, String)>),
    /// Per-channel numeric series, e.g. a radial spectrum profile.
    Profiles(BTreeMap<String, Vec<f64>>),
}

/// One automated quality check.
pub trait QualityCheck {
    /// Short lowercase identifier, e.g. `contrast`.
    fn check_name(&self) -> &'static str;

    /// Version string embedded in the completion tag.
    fn version(&self) -> &'static str;

    /// Computes the result for one image from its pixel data.
    fn check(&self, conn: &mut Connection, image: ImageId) -> Result<CheckResult, CheckError>;

    /// Persists the result as annotations linked to the image. The engine
    /// has already linked the completion tag when this runs.
    fn store(
        &self,
        conn: &mut Connection,
        image: ImageId,
        result: &CheckResult,
        namespace: &str,
    ) -> Result<(), CheckError>;

    /// Tag value marking an image as done for this check identity.
    fn completion_tag(&self) -> String {
        format!("#{}_v{}", self.check_name(), self.version())
    }

    /// Namespace scoping every annotation this check writes.
    fn namespace(&self) -> String {
        format!("{}.qualitycheck", self.check_name())
    }
}

#[cfg(test)]
mod tests {
    use super::{CheckResult, QualityCheck};
    use crate::engine::CheckError;
    use crate::gateway::Connection;
    use crate::model::ImageId;

    struct Probe;

    impl QualityCheck for Probe {
        fn check_name(&self) -> &'static str {
            "probe"
        }

        fn version(&self) -> &'static str {
            "0.3"
        }

        fn check(
            &self,
            _conn: &mut Connection,
            _image: ImageId,
        ) -> Result<CheckResult, CheckError> {
            Ok(CheckResult::Entries(Vec::new()))
        }

        fn store(
            &self,
            _conn: &mut Connection,
            _image: ImageId,
            _result: &CheckResult,
            _namespace: &str,
        ) -> Result<(), CheckError> {
            Ok(())
        }
    }

    #[test]
    fn identity_strings_embed_name_and_version() {
        let probe = Probe;
        assert_eq!(probe.completion_tag(), "#probe_v0.3");
        assert_eq!(probe.namespace(), "probe.qualitycheck");
    }
}
