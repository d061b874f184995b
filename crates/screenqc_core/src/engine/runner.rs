//! Check run loop.
//!
//! # Responsibility
//! - Find eligible images, run the check on each, and persist results
//!   behind the completion tag.
//! - Remove a check's own annotations so an object can be reprocessed.
//!
//! # Invariants
//! - The completion tag is linked before the check-specific store runs, so
//!   the eligibility query never offers an image twice, even when the
//!   store half fails.
//! - The run is fail-fast: the first per-image error aborts the remainder;
//!   images stored earlier in the run keep their tags and results.

use crate::engine::{CheckResult, EngineError, EngineResult, QualityCheck};
use crate::gateway::Connection;
use crate::model::{AnnotationId, AnnotationTarget, ImageId, NewAnnotation};
use crate::query::Criteria;
use log::{debug, error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static CHECK_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*$").expect("valid check name regex"));

/// Outcome of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Correlation id carried by this run's log events.
    pub run_id: Uuid,
    pub check: String,
    /// Eligible images found by the candidate query.
    pub candidates: usize,
    /// Images checked and stored; equals `candidates` on success.
    pub checked: usize,
}

/// Drives quality checks over one connection.
pub struct QcEngine<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> QcEngine<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Runs `check` over every eligible image.
    ///
    /// Eligible means: no completion tag for this check identity, and no
    /// `#noqc` tag on the image or its plate.
    pub fn run(&mut self, check: &dyn QualityCheck) -> EngineResult<RunSummary> {
        let name = check.check_name();
        if !CHECK_NAME_RE.is_match(name) {
            return Err(EngineError::InvalidCheckName(name.to_string()));
        }

        let run_id = Uuid::new_v4();
        info!(
            "event=qc_run module=engine status=start run_id={run_id} check={name} version={}",
            check.version()
        );
        match self.run_inner(check, run_id) {
            Ok(summary) => {
                info!(
                    "event=qc_run module=engine status=ok run_id={run_id} check={name} \
                     candidates={} checked={}",
                    summary.candidates, summary.checked
                );
                Ok(summary)
            }
            Err(err) => {
                error!(
                    "event=qc_run module=engine status=error run_id={run_id} check={name} \
                     error={err}"
                );
                Err(err)
            }
        }
    }

    fn run_inner(&mut self, check: &dyn QualityCheck, run_id: Uuid) -> EngineResult<RunSummary> {
        let tag = check.completion_tag();
        let namespace = check.namespace();

        let query = Criteria::new()
            .set("without_tag", tag.as_str())
            .set("noqc", true)
            .build()?;
        let candidates = self.conn.find_images(&query)?;
        debug!(
            "event=qc_candidates module=engine run_id={run_id} check={} count={}",
            check.check_name(),
            candidates.len()
        );

        let mut checked = 0;
        for image in &candidates {
            let result = check
                .check(self.conn, *image)
                .map_err(|source| EngineError::Check {
                    image: *image,
                    source,
                })?;
            self.store_with_tag(check, *image, &result, &tag, &namespace)?;
            debug!(
                "event=qc_image module=engine status=ok run_id={run_id} check={} image={image}",
                check.check_name()
            );
            checked += 1;
        }

        Ok(RunSummary {
            run_id,
            check: check.check_name().to_string(),
            candidates: candidates.len(),
            checked,
        })
    }

    /// Links the completion tag, then hands storage to the check. Tagging
    /// comes first: the candidate query keys off the tag, and it stays on
    /// even when the check's own store fails afterwards.
    fn store_with_tag(
        &mut self,
        check: &dyn QualityCheck,
        image: ImageId,
        result: &CheckResult,
        tag: &str,
        namespace: &str,
    ) -> EngineResult<()> {
        let annotation = NewAnnotation::tag(tag).namespaced(namespace);
        self.conn
            .save_annotation(AnnotationTarget::Image(image), &annotation)?;
        check
            .store(self.conn, image, result, namespace)
            .map_err(|source| EngineError::Check { image, source })
    }

    /// Deletes every annotation `check` wrote on `target`; afterwards the
    /// object is eligible again.
    pub fn remove(
        &mut self,
        check: &dyn QualityCheck,
        target: AnnotationTarget,
    ) -> EngineResult<usize> {
        let namespace = check.namespace();
        let annotations = self.conn.annotations(target, Some(&namespace))?;
        let ids: Vec<AnnotationId> = annotations.iter().map(|a| a.id).collect();
        let removed = self.conn.delete_annotations(&ids)?;
        info!(
            "event=qc_remove module=engine status=ok check={} target=\"{target}\" removed={removed}",
            check.check_name()
        );
        Ok(removed)
    }
}
