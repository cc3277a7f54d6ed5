//! Augmented Dickey-Fuller unit-root test.
//!
//! Regression with a constant:
//!
//! `Δy_t = α + β·y_{t−1} + Σ_{i=1..k} γ_i·Δy_{t−i} + ε_t`
//!
//! The null hypothesis is a unit root (`β = 0`); a small p-value indicates
//! stationarity.

use crate::error::{AnomalyError, Result};
use crate::utils::ols::{ols_fit, OLSResult};
use crate::utils::stats::cdf_normal;

/// Result of [`adf_test`].
#[derive(Debug, Clone)]
pub struct AdfResult {
    /// t-ratio of the lagged level coefficient.
    pub statistic: f64,
    /// MacKinnon approximate p-value.
    pub p_value: f64,
    /// Number of lagged differences included.
    pub lags: usize,
    /// Observations used in the final regression.
    pub nobs: usize,
    pub critical_values: CriticalValues,
}

impl AdfResult {
    /// Whether the unit-root null is rejected at `sig_level`.
    pub fn is_stationary(&self, sig_level: f64) -> bool {
        self.p_value < sig_level
    }
}

/// Finite-sample critical values for the constant-only regression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalValues {
    pub one_pct: f64,
    pub five_pct: f64,
    pub ten_pct: f64,
}

impl CriticalValues {
    /// MacKinnon (2010) response-surface values for `nobs` observations.
    pub fn for_nobs(nobs: usize) -> Self {
        let t = nobs as f64;
        let surface = |b: [f64; 4]| b[0] + b[1] / t + b[2] / t.powi(2) + b[3] / t.powi(3);
        Self {
            one_pct: surface([-3.43035, -6.5393, -16.786, -79.433]),
            five_pct: surface([-2.86154, -2.8903, -4.234, -40.040]),
            ten_pct: surface([-2.56677, -1.5384, -2.809, 0.0]),
        }
    }
}

/// Smallest series the test accepts.
pub const MIN_ADF_LENGTH: usize = 8;

/// Run the ADF test.
///
/// With `max_lags = None` the cap is `⌈12·(n/100)^¼⌉`, limited so the
/// regression keeps enough degrees of freedom. The lag order is chosen by AIC
/// over a common sample, then the chosen regression is refitted on every
/// available observation.
///
/// Fails with `InsufficientData` for fewer than [`MIN_ADF_LENGTH`] points and
/// with `InvalidParameter` when the regression is singular, e.g. for a
/// constant series.
pub fn adf_test(series: &[f64], max_lags: Option<usize>) -> Result<AdfResult> {
    let n = series.len();
    if n < MIN_ADF_LENGTH {
        return Err(AnomalyError::InsufficientData {
            needed: MIN_ADF_LENGTH,
            got: n,
        });
    }

    let cap = n / 2 - 2;
    let max_lags = max_lags
        .unwrap_or_else(|| (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize)
        .min(cap);

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best = (0, f64::INFINITY);
    for lag in 0..=max_lags {
        let aic = match adf_regression(series, &diff, lag, max_lags) {
            Ok(fit) => fit.aic(),
            Err(_) => continue,
        };
        if aic < best.1 {
            best = (lag, aic);
        }
    }
    let lags = best.0;

    let fit = adf_regression(series, &diff, lags, lags)?;
    let statistic = fit.t_stat(1);
    if !statistic.is_finite() {
        return Err(AnomalyError::InvalidParameter(
            "ADF regression produced a non-finite statistic".into(),
        ));
    }

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        lags,
        nobs: fit.nobs,
        critical_values: CriticalValues::for_nobs(fit.nobs),
    })
}

/// Fit the ADF regression with `lag` lagged differences, dropping the first
/// `start` differences so different lag orders can share a sample.
fn adf_regression(level: &[f64], diff: &[f64], lag: usize, start: usize) -> Result<OLSResult> {
    let start = start.max(lag);
    let mut y = Vec::with_capacity(diff.len().saturating_sub(start));
    let mut rows = Vec::with_capacity(y.capacity());
    for t in start..diff.len() {
        let mut row = Vec::with_capacity(lag + 2);
        row.push(1.0);
        row.push(level[t]);
        row.extend((1..=lag).map(|i| diff[t - i]));
        rows.push(row);
        y.push(diff[t]);
    }
    ols_fit(&y, &rows)
}

/// MacKinnon (1994) approximate p-value for the constant-only ADF statistic.
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
    const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &SMALL_P
    } else {
        &LARGE_P
    };
    let z = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, &c| acc * statistic + c);
    cdf_normal(z)
}
