//! Summary statistics and normal-distribution helpers.

use statrs::distribution::{ContinuousCDF, Normal};

/// Standard normal quantile Φ⁻¹(p).
///
/// Returns ±∞ at the boundaries and NaN outside `[0, 1]`.
///
/// # Example
/// ```
/// use weekly_anomaly::utils::quantile_normal;
///
/// let z = quantile_normal(0.975);
/// assert!((z - 1.959964).abs() < 1e-5);
/// ```
pub fn quantile_normal(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    standard_normal().inverse_cdf(p)
}

/// Standard normal CDF Φ(x).
pub fn cdf_normal(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    standard_normal().cdf(x)
}

/// Two-sided bounds `(Φ⁻¹(α/2), Φ⁻¹(1 − α/2))` for significance level `α`.
pub fn two_sided_bounds(sig_level: f64) -> (f64, f64) {
    (
        quantile_normal(sig_level / 2.0),
        quantile_normal(1.0 - sig_level / 2.0),
    )
}

fn standard_normal() -> Normal {
    Normal::standard()
}

/// Mean of a slice; NaN when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`).
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`).
pub fn population_std(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Median of a slice; NaN when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n.is_multiple_of(2) {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}
