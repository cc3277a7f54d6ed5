//! STL (Seasonal-Trend decomposition using LOESS).
//!
//! Splits a series into trend, seasonal and remainder components following
//! Cleveland et al. (1990): an inner loop alternates cycle-subseries smoothing
//! with trend smoothing, and an optional outer loop recomputes bisquare
//! robustness weights from the remainder so outliers stop pulling on the
//! fitted components.

use crate::error::{AnomalyError, Result};
use crate::utils::stats::{median, population_variance};

/// Output of [`STL::decompose`].
#[derive(Debug, Clone, PartialEq)]
pub struct STLResult {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
    /// Final robustness weight of each observation (all 1 when not robust).
    pub weights: Vec<f64>,
}

impl STLResult {
    /// Seasonal strength in `[0, 1]`: `1 − Var(R) / Var(S + R)`.
    pub fn seasonal_strength(&self) -> f64 {
        strength(&self.seasonal, &self.remainder)
    }

    /// Trend strength in `[0, 1]`: `1 − Var(R) / Var(T + R)`.
    pub fn trend_strength(&self) -> f64 {
        strength(&self.trend, &self.remainder)
    }
}

fn strength(component: &[f64], remainder: &[f64]) -> f64 {
    let combined: Vec<f64> = component
        .iter()
        .zip(remainder.iter())
        .map(|(c, r)| c + r)
        .collect();
    let var_combined = population_variance(&combined);
    if !(var_combined > 1e-12) {
        return 0.0;
    }
    (1.0 - population_variance(remainder) / var_combined).clamp(0.0, 1.0)
}

/// STL decomposer.
///
/// # Example
/// ```
/// use weekly_anomaly::seasonality::STL;
///
/// let series: Vec<f64> = (0..60)
///     .map(|i| 10.0 + 0.1 * i as f64 + [2.0, 0.0, -2.0, 0.0][i % 4])
///     .collect();
/// let parts = STL::new(4).decompose(&series).unwrap();
/// assert_eq!(parts.remainder.len(), 60);
/// assert!(parts.seasonal_strength() > 0.9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct STL {
    period: usize,
    seasonal_span: usize,
    trend_span: usize,
    low_pass_span: usize,
    inner_iterations: usize,
    outer_iterations: usize,
}

const DEFAULT_SEASONAL_SPAN: usize = 7;
const ROBUST_OUTER_ITERATIONS: usize = 6;

fn odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

impl STL {
    /// Non-robust decomposer for `period` with the usual default spans.
    pub fn new(period: usize) -> Self {
        let ns = DEFAULT_SEASONAL_SPAN;
        let nt = (1.5 * period as f64 / (1.0 - 1.5 / ns as f64)).ceil() as usize;
        Self {
            period,
            seasonal_span: ns,
            trend_span: odd(nt.max(3)),
            low_pass_span: odd(period + 1),
            inner_iterations: 2,
            outer_iterations: 0,
        }
    }

    /// Enable bisquare robustness iterations.
    pub fn robust(mut self) -> Self {
        self.outer_iterations = ROBUST_OUTER_ITERATIONS;
        self
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn is_robust(&self) -> bool {
        self.outer_iterations > 0
    }

    /// Decompose `series`.
    ///
    /// Needs a period of at least 2 and at least two full periods of data.
    pub fn decompose(&self, series: &[f64]) -> Result<STLResult> {
        if self.period < 2 {
            return Err(AnomalyError::InvalidParameter(format!(
                "STL period must be at least 2, got {}",
                self.period
            )));
        }
        let n = series.len();
        if n < 2 * self.period {
            return Err(AnomalyError::InsufficientData {
                needed: 2 * self.period,
                got: n,
            });
        }
        let count = series.iter().filter(|x| !x.is_finite()).count();
        if count > 0 {
            return Err(AnomalyError::NonFiniteData { count });
        }

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut weights = vec![1.0; n];
        let scale = series.iter().fold(1.0_f64, |acc, y| acc.max(y.abs()));

        for pass in 0..=self.outer_iterations {
            for _ in 0..self.inner_iterations {
                let detrended: Vec<f64> =
                    series.iter().zip(trend.iter()).map(|(y, t)| y - t).collect();
                let cycle = self.smooth_cycle_subseries(&detrended, &weights);
                let low_pass = self.low_pass(&cycle);
                for i in 0..n {
                    seasonal[i] = cycle[i + self.period] - low_pass[i];
                }

                let deseasonalised: Vec<f64> =
                    series.iter().zip(seasonal.iter()).map(|(y, s)| y - s).collect();
                trend = loess(&deseasonalised, self.trend_span, &weights);
            }

            if pass < self.outer_iterations {
                let remainder = remainder_of(series, &trend, &seasonal);
                weights = bisquare_weights(&remainder, scale);
            }
        }

        Ok(STLResult {
            remainder: remainder_of(series, &trend, &seasonal),
            trend,
            seasonal,
            weights,
        })
    }

    /// Smooth each cycle-subseries and extrapolate it one step past both
    /// ends, giving a series of length `n + 2·period` aligned so that index
    /// `i + period` corresponds to observation `i`.
    fn smooth_cycle_subseries(&self, detrended: &[f64], weights: &[f64]) -> Vec<f64> {
        let p = self.period;
        let mut out = vec![0.0; detrended.len() + 2 * p];
        for phase in 0..p {
            let indices: Vec<usize> = (phase..detrended.len()).step_by(p).collect();
            let values: Vec<f64> = indices.iter().map(|&i| detrended[i]).collect();
            let w: Vec<f64> = indices.iter().map(|&i| weights[i]).collect();
            let m = values.len();
            for x in 0..=m + 1 {
                let fitted = loess_at(&values, self.seasonal_span, &w, x as f64 - 1.0);
                out[phase + x * p] = fitted;
            }
        }
        out
    }

    /// Moving averages of length `p`, `p` and 3 followed by LOESS; maps the
    /// extended cycle series back to length `n`.
    fn low_pass(&self, cycle: &[f64]) -> Vec<f64> {
        let smoothed = moving_average(
            &moving_average(&moving_average(cycle, self.period), self.period),
            3,
        );
        loess(&smoothed, self.low_pass_span, &vec![1.0; smoothed.len()])
    }
}

impl Default for STL {
    fn default() -> Self {
        Self::new(12)
    }
}

fn remainder_of(series: &[f64], trend: &[f64], seasonal: &[f64]) -> Vec<f64> {
    series
        .iter()
        .zip(trend.iter().zip(seasonal.iter()))
        .map(|(y, (t, s))| y - t - s)
        .collect()
}

/// Relative floor on the bisquare scale, in units of the series magnitude.
const ROBUSTNESS_FLOOR: f64 = 1e-5;

/// Bisquare weights with scale `6 · median|r|`, floored at a tiny fraction
/// of `scale` so an exact fit keeps its outliers downweighted.
fn bisquare_weights(remainder: &[f64], scale: f64) -> Vec<f64> {
    let abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    let h = (6.0 * median(&abs)).max(ROBUSTNESS_FLOOR * scale);
    if !h.is_finite() {
        return vec![1.0; remainder.len()];
    }
    abs.iter()
        .map(|a| {
            let u = a / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

/// Moving average over full windows only; output has `len − window + 1`
/// points.
fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || series.len() < window {
        return Vec::new();
    }
    let mut sum: f64 = series[..window].iter().sum();
    let mut out = Vec::with_capacity(series.len() - window + 1);
    out.push(sum / window as f64);
    for i in window..series.len() {
        sum += series[i] - series[i - window];
        out.push(sum / window as f64);
    }
    out
}

fn loess(values: &[f64], span: usize, robustness: &[f64]) -> Vec<f64> {
    (0..values.len())
        .map(|i| loess_at(values, span, robustness, i as f64))
        .collect()
}

/// Locally linear fit at position `x` using the `span` nearest points with a
/// tricube kernel multiplied by `robustness`.
///
/// A span longer than the series widens the bandwidth proportionally. If
/// every robustness weight in the window is zero the kernel alone is used.
fn loess_at(values: &[f64], span: usize, robustness: &[f64], x: f64) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let k = span.min(n).max(1);
    let centre = x.round().clamp(0.0, (n - 1) as f64) as usize;
    let lo = centre.saturating_sub(k / 2).min(n - k);
    let hi = lo + k;
    let extra = span.saturating_sub(n) as f64 / 2.0;
    let reach = (x - lo as f64).abs().max((x - (hi - 1) as f64).abs()) + extra;
    let h = reach + 1.0;

    let fit = |use_robustness: bool| -> Option<f64> {
        let kernel: Vec<f64> = (lo..hi)
            .map(|j| {
                let u = (x - j as f64).abs() / h;
                let w = (1.0 - u.powi(3)).max(0.0).powi(3);
                if use_robustness {
                    w * robustness[j]
                } else {
                    w
                }
            })
            .collect();
        let sw: f64 = kernel.iter().sum();
        if sw <= 0.0 {
            return None;
        }
        let x_bar = (lo..hi).zip(&kernel).map(|(j, w)| w * j as f64).sum::<f64>() / sw;
        let y_bar = (lo..hi).zip(&kernel).map(|(j, w)| w * values[j]).sum::<f64>() / sw;
        let (sxx, sxy) = (lo..hi)
            .zip(&kernel)
            .fold((0.0, 0.0), |(sxx, sxy), (j, w)| {
                let dx = j as f64 - x_bar;
                (sxx + w * dx * dx, sxy + w * dx * (values[j] - y_bar))
            });
        Some(if sxx > 1e-12 * sw {
            y_bar + sxy / sxx * (x - x_bar)
        } else {
            y_bar
        })
    };

    fit(true)
        .or_else(|| fit(false))
        .unwrap_or(values[centre])
}
