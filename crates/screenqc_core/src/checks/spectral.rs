//! Spectral analysis over pixel planes.
//!
//! # Responsibility
//! - Compute the 2-D log power spectrum of a plane with a direct,
//!   separable DFT (row pass, then column pass).
//! - Radially average spectrum values into unit-distance bins around the
//!   plane's midpoint.
//!
//! # Invariants
//! - Distances use the wrapped metric, so spatial frequency is measured
//!   from the nearest spectral copy of the midpoint.
//! - Bin `k` covers distances in `(k, k+1]`; the zero-distance DC sample
//!   falls into no bin.

use crate::model::Plane;
use std::f64::consts::PI;

/// `log10(|DFT2(plane)|^2)`, row-major, one value per pixel.
///
/// A zero-power frequency maps to `-inf`, matching the logarithm's limit;
/// callers average with that in mind.
pub fn log_power_spectrum(plane: &Plane) -> Vec<f64> {
    let width = plane.width;
    let height = plane.height;
    let mut field: Vec<(f64, f64)> = plane.samples.iter().map(|&v| (v, 0.0)).collect();

    // Row pass.
    for y in 0..height {
        let row: Vec<(f64, f64)> = field[y * width..(y + 1) * width].to_vec();
        let transformed = dft(&row);
        field[y * width..(y + 1) * width].copy_from_slice(&transformed);
    }

    // Column pass.
    for x in 0..width {
        let column: Vec<(f64, f64)> = (0..height).map(|y| field[y * width + x]).collect();
        let transformed = dft(&column);
        for (y, value) in transformed.into_iter().enumerate() {
            field[y * width + x] = value;
        }
    }

    field
        .into_iter()
        .map(|(re, im)| (re * re + im * im).log10())
        .collect()
}

/// Direct 1-D DFT; quadratic, sized for QC planes rather than streaming.
fn dft(input: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }
    let mut output = Vec::with_capacity(n);
    for k in 0..n {
        let mut re = 0.0;
        let mut im = 0.0;
        for (idx, &(x_re, x_im)) in input.iter().enumerate() {
            let angle = -2.0 * PI * (k as f64) * (idx as f64) / n as f64;
            let (sin, cos) = angle.sin_cos();
            re += x_re * cos - x_im * sin;
            im += x_re * sin + x_im * cos;
        }
        output.push((re, im));
    }
    output
}

/// Distance from pixel (x, y) to the plane midpoint under the wrapped
/// metric `hypot(midcol - |x - midcol|, midrow - |y - midrow|)`.
pub fn wrapped_distance(x: usize, y: usize, width: usize, height: usize) -> f64 {
    let midcol = (width as f64 / 2.0).ceil();
    let midrow = (height as f64 / 2.0).ceil();
    let dx = midcol - (x as f64 - midcol).abs();
    let dy = midrow - (y as f64 - midrow).abs();
    dx.hypot(dy)
}

/// Radially averages row-major `values` into unit-distance bins.
///
/// Returns `ceil(max distance)` bins; a bin covering no pixels averages to
/// NaN, the same as a mean over an empty selection.
pub fn radial_average(values: &[f64], width: usize, height: usize) -> Vec<f64> {
    let mut max_distance: f64 = 0.0;
    for y in 0..height {
        for x in 0..width {
            max_distance = max_distance.max(wrapped_distance(x, y, width, height));
        }
    }
    let bins = max_distance.ceil() as usize;
    if bins == 0 {
        return Vec::new();
    }

    let mut sums = vec![0.0; bins];
    let mut counts = vec![0usize; bins];
    for y in 0..height {
        for x in 0..width {
            let distance = wrapped_distance(x, y, width, height);
            if distance <= 0.0 {
                continue;
            }
            let bin = (distance.ceil() as usize - 1).min(bins - 1);
            sums[bin] += values[y * width + x];
            counts[bin] += 1;
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| if count == 0 { f64::NAN } else { sum / count as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{log_power_spectrum, radial_average, wrapped_distance};
    use crate::model::Plane;

    #[test]
    fn wrapped_distance_folds_around_the_midpoint() {
        // 4 wide: offsets fold to [0, 1, 2, 1].
        let folded: Vec<f64> = (0..4).map(|x| wrapped_distance(x, 0, 4, 1).round()).collect();
        assert_eq!(folded, vec![0.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn bin_count_is_ceil_of_max_corner_distance() {
        // 4x4: max distance hypot(2, 2) ~ 2.83, so three unit bins.
        let values = vec![0.0; 16];
        assert_eq!(radial_average(&values, 4, 4).len(), 3);
    }

    #[test]
    fn impulse_plane_has_flat_zero_spectrum() {
        // A unit impulse transforms to constant magnitude 1, and
        // log10(1) = 0 everywhere.
        let mut samples = vec![0.0; 16];
        samples[0] = 1.0;
        let plane = Plane::from_samples(4, 4, samples).unwrap();
        let spectrum = log_power_spectrum(&plane);
        assert!(spectrum.iter().all(|v| v.abs() < 1e-9));

        let profile = radial_average(&spectrum, 4, 4);
        assert_eq!(profile.len(), 3);
        assert!(profile.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn constant_plane_concentrates_power_at_dc() {
        let plane = Plane::filled(4, 4, 2.0);
        let spectrum = log_power_spectrum(&plane);
        // DC holds (sum)^2 = (32)^2; the rest cancels down to rounding
        // residue, many orders of magnitude below the DC term.
        assert!((spectrum[0] - (32.0f64 * 32.0).log10()).abs() < 1e-9);
        assert!(spectrum[1..].iter().all(|v| *v < -20.0));
    }

    #[test]
    fn radial_bins_average_matching_distances() {
        // Values equal to their bin index + 1 everywhere; each bin must
        // then average to exactly that value.
        let width = 4;
        let height = 4;
        let values: Vec<f64> = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| {
                    let d = wrapped_distance(x, y, width, height);
                    if d <= 0.0 {
                        0.0
                    } else {
                        (d.ceil()) as f64
                    }
                })
            })
            .collect();
        let profile = radial_average(&values, width, height);
        for (idx, bin) in profile.iter().enumerate() {
            assert!((bin - (idx as f64 + 1.0)).abs() < 1e-12);
        }
    }
}
