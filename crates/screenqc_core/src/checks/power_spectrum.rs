//! Power-spectrum check.
//!
//! # Responsibility
//! - Compute a radially-averaged log power spectrum per plane and keep
//!   the latest profile per channel.
//! - Store, per channel, a numeric summary annotation and a PNG plot of
//!   the profile.
//!
//! # Invariants
//! - Plot files are staged through named temp files scoped to one store
//!   call; staging cleans up whether or not the upload succeeds.

use crate::checks::plot::{encode_png, render_profile};
use crate::checks::spectral::{log_power_spectrum, radial_average};
use crate::checks::stats::finite_mean;
use crate::engine::{CheckError, CheckResult, QualityCheck};
use crate::gateway::Connection;
use crate::model::{AnnotationTarget, ImageId, NewAnnotation};
use std::io::Write;

const PLOT_WIDTH: u32 = 640;
const PLOT_HEIGHT: u32 = 480;

/// Radially-averaged log power spectrum per channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct PowerSpectrum;

impl QualityCheck for PowerSpectrum {
    fn check_name(&self) -> &'static str {
        "powerspectrum"
    }

    fn version(&self) -> &'static str {
        "0.1"
    }

    fn check(&self, conn: &mut Connection, image: ImageId) -> Result<CheckResult, CheckError> {
        let snapshot = conn.image(image)?;
        let mut profiles = std::collections::BTreeMap::new();
        for (z, c, t) in snapshot.plane_coordinates() {
            let plane = conn.plane(image, z, c, t)?;
            if plane.is_empty() {
                return Err(CheckError::Computation(format!(
                    "image {image} plane z={z} c={c} t={t} has no samples"
                )));
            }
            let spectrum = log_power_spectrum(&plane);
            let profile = radial_average(&spectrum, plane.width, plane.height);
            profiles.insert(snapshot.channel_label(c), profile);
        }
        Ok(CheckResult::Profiles(profiles))
    }

    fn store(
        &self,
        conn: &mut Connection,
        image: ImageId,
        result: &CheckResult,
        namespace: &str,
    ) -> Result<(), CheckError> {
        let CheckResult::Profiles(profiles) = result else {
            return Err(CheckError::Computation(
                "power spectrum expects per-channel profiles".to_string(),
            ));
        };

        for (label, profile) in profiles {
            let summary = NewAnnotation::double(finite_mean(profile))
                .named(format!("{label} power spectrum"))
                .namespaced(namespace);
            conn.save_annotation(AnnotationTarget::Image(image), &summary)?;

            let png = encode_png(&render_profile(profile, PLOT_WIDTH, PLOT_HEIGHT))?;

            // Staged through a named temp file scoped to this store call;
            // dropping the handle removes it either way.
            let prefix = label.replace(' ', "_");
            let mut staged = tempfile::Builder::new()
                .prefix(&format!("{prefix}_"))
                .suffix("_powerspectrum.png")
                .tempfile()?;
            staged.write_all(&png)?;
            staged.flush()?;

            let file_name = staged
                .path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{prefix}_powerspectrum.png"));
            let bytes = std::fs::read(staged.path())?;
            let attachment =
                NewAnnotation::file(file_name, "image/png", bytes).namespaced(namespace);
            conn.save_annotation(AnnotationTarget::Image(image), &attachment)?;
        }
        Ok(())
    }
}
