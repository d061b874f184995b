//! Plain-buffer sample statistics.

/// Percentile of `samples` with linear interpolation between ranks,
/// `q` in `0..=100`. NaN for an empty slice.
pub fn percentile(samples: &[f64], q: f64) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (sorted.len() - 1) as f64 * q / 100.0;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    if below == above {
        return sorted[below];
    }
    sorted[below] + (sorted[above] - sorted[below]) * (rank - below as f64)
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Mean over finite samples only; NaN when none are finite. Keeps one
/// unbounded bin from poisoning a profile-wide summary.
pub fn finite_mean(samples: &[f64]) -> f64 {
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    mean(&finite)
}
