//! Sample autocorrelation and partial autocorrelation.
//!
//! Both use the biased estimator (normalised by `n`), which keeps the
//! autocorrelation sequence positive semi-definite so Durbin-Levinson is
//! stable.

use crate::utils::stats::{mean, quantile_normal};
use rustfft::{num_complex::Complex64, FftPlanner};

/// Number of lags examined by default for a series of length `n`:
/// `min(⌊10·log10 n⌋, n/2 − 1)`.
pub fn default_nlags(n: usize) -> usize {
    if n < 4 {
        return 0;
    }
    let by_log = (10.0 * (n as f64).log10()).floor() as usize;
    by_log.min(n / 2 - 1)
}

/// Sample autocorrelation at lags `0..=nlags`, computed through the FFT.
///
/// Returns an empty vector for an empty series. A constant series yields
/// `1.0` at lag 0 and zeros elsewhere.
pub fn acf(series: &[f64], nlags: usize) -> Vec<f64> {
    let n = series.len();
    if n == 0 {
        return Vec::new();
    }
    let nlags = nlags.min(n - 1);

    let m = mean(series);
    // zero-pad to avoid circular wrap-around
    let size = (2 * n).next_power_of_two();
    let mut buffer: Vec<Complex64> = series
        .iter()
        .map(|&x| Complex64::new(x - m, 0.0))
        .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
        .take(size)
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(size).process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex64::new(c.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(size).process(&mut buffer);

    let c0 = buffer[0].re;
    if c0.abs() < 1e-12 * size as f64 {
        let mut out = vec![0.0; nlags + 1];
        out[0] = 1.0;
        return out;
    }
    buffer[..=nlags].iter().map(|c| c.re / c0).collect()
}

/// Sample partial autocorrelation at lags `0..=nlags` (Durbin-Levinson).
///
/// Lag 0 is `1.0` by convention. If the recursion degenerates the remaining
/// lags are set to zero.
pub fn pacf(series: &[f64], nlags: usize) -> Vec<f64> {
    let r = acf(series, nlags);
    if r.is_empty() {
        return r;
    }
    let nlags = r.len() - 1;

    let mut out = vec![0.0; nlags + 1];
    out[0] = 1.0;
    if nlags == 0 {
        return out;
    }

    let mut phi = vec![0.0; nlags + 1];
    let mut prev = vec![0.0; nlags + 1];
    let mut error: f64 = 1.0;
    for k in 1..=nlags {
        let mut num = r[k];
        for j in 1..k {
            num -= prev[j] * r[k - j];
        }
        if error.abs() < 1e-12 {
            break;
        }
        let reflection = num / error;
        phi[k] = reflection;
        for j in 1..k {
            phi[j] = prev[j] - reflection * prev[k - j];
        }
        error *= 1.0 - reflection * reflection;
        out[k] = reflection;
        prev[..=k].copy_from_slice(&phi[..=k]);
    }
    out
}

/// Half-width of the constant two-sided confidence band `z / √n`.
pub fn constant_band(n: usize, sig_level: f64) -> f64 {
    quantile_normal(1.0 - sig_level / 2.0) / (n as f64).sqrt()
}

/// Half-widths of Bartlett's confidence band for each lag of `acf_values`.
///
/// Lag `k` uses `var_k = (1 + 2 Σ_{j<k} r_j²) / n`; lag 0 has zero width.
pub fn bartlett_band(acf_values: &[f64], n: usize, sig_level: f64) -> Vec<f64> {
    let z = quantile_normal(1.0 - sig_level / 2.0);
    let n = n as f64;
    let mut cumulative = 0.0;
    acf_values
        .iter()
        .enumerate()
        .map(|(k, &r)| {
            if k == 0 {
                return 0.0;
            }
            let width = z * ((1.0 + 2.0 * cumulative) / n).sqrt();
            cumulative += r * r;
            width
        })
        .collect()
}
