//! Order search for the ARIMA strategy.
//!
//! `starting_parameters` proposes upper bounds `(p, d, q)` from stationarity
//! and correlogram heuristics; `best_fit_model` then grid-searches every order
//! below those bounds and keeps the lowest AICc.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{AnomalyError, Result};
use crate::features::autocorrelation::{acf, bartlett_band, constant_band, default_nlags, pacf};
use crate::models::arima::diff::difference;
use crate::models::arima::model::{ArimaModel, ArimaOrder, SeasonalOrder};
use crate::utils::stats::population_std;
use crate::validation::stationarity::{adf_test, MIN_ADF_LENGTH};

/// Seasonal period of weekly data with annual seasonality.
pub const WEEKLY_SEASONAL_PERIOD: usize = 52;

/// MA orders at or above this are treated as an under-differenced signal.
pub const MA_ORDER_LIMIT: usize = 10;

/// Number of differences to apply so the series is stationary.
///
/// Candidates are the series differenced `0..=max_iterations` times. Among
/// those that pass the ADF test at `sig_level`, the one with the smallest
/// standard deviation wins; ties go to the lower order. Returns 0 when no
/// candidate is stationary.
pub fn optimal_differencing(series: &[f64], max_iterations: usize, sig_level: f64) -> usize {
    let mut candidates = vec![series.to_vec()];
    for _ in 0..max_iterations {
        let next = candidates
            .last()
            .map(|s| difference(s, 1))
            .unwrap_or_default();
        if next.len() < MIN_ADF_LENGTH {
            break;
        }
        candidates.push(next);
    }

    candidates
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            adf_test(s, None)
                .map(|r| r.is_stationary(sig_level))
                .unwrap_or(false)
        })
        .map(|(d, s)| (d, population_std(s)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(d, _)| d)
        .unwrap_or(0)
}

/// Upper bound for the AR order: leading PACF lags outside the constant band.
///
/// Counting stops at the first lag inside the band.
pub fn max_ar_order(series: &[f64], sig_level: f64) -> usize {
    let nlags = default_nlags(series.len());
    if nlags == 0 {
        return 0;
    }
    let band = constant_band(series.len(), sig_level);
    pacf(series, nlags)[1..]
        .iter()
        .take_while(|v| v.abs() >= band)
        .count()
}

/// Upper bound for the MA order: leading ACF lags outside Bartlett's band.
///
/// Counting stops at the first lag inside the band.
pub fn max_ma_order(series: &[f64], sig_level: f64) -> usize {
    let nlags = default_nlags(series.len());
    if nlags == 0 {
        return 0;
    }
    let r = acf(series, nlags);
    let band = bartlett_band(&r, series.len(), sig_level);
    r.iter()
        .zip(band.iter())
        .skip(1)
        .take_while(|(v, b)| v.abs() >= **b)
        .count()
}

/// Starting bounds `(p, d, q)` for the grid search.
///
/// `d` comes from [`optimal_differencing`]; `p` and `q` are measured on the
/// differenced series. While `q ≥ 10` the series is differenced once more,
/// `q` drops by 5 and `p` is re-measured.
pub fn starting_parameters(series: &[f64], sig_level: f64) -> ArimaOrder {
    let mut d = optimal_differencing(series, 3, sig_level);
    let mut differenced = difference(series, d);
    let mut p = max_ar_order(&differenced, sig_level);
    let mut q = max_ma_order(&differenced, sig_level);

    while q >= MA_ORDER_LIMIT {
        q -= 5;
        d += 1;
        differenced = difference(&differenced, 1);
        p = max_ar_order(&differenced, sig_level);
    }

    ArimaOrder::new(p, d, q)
}

/// Knobs for [`best_fit_model`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Seasonal period tried alongside the regular orders.
    pub seasonal_period: usize,
    /// Whether seasonal `(P, D, Q) ∈ {0, 1}³` orders are tried at all.
    pub seasonal: bool,
    /// Seasonal orders are only tried with at least this many full cycles.
    pub min_seasonal_cycles: usize,
    /// Cap on the AR bound.
    pub max_p: usize,
    /// Cap on the MA bound.
    pub max_q: usize,
    /// Wall-clock budget for the whole search.
    pub deadline: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            seasonal_period: WEEKLY_SEASONAL_PERIOD,
            seasonal: true,
            min_seasonal_cycles: 3,
            max_p: 5,
            max_q: 5,
            deadline: None,
        }
    }
}

impl SearchOptions {
    fn seasonal_orders(&self, n: usize) -> Vec<SeasonalOrder> {
        let period = self.seasonal_period;
        if !self.seasonal || period < 2 || n < self.min_seasonal_cycles * period {
            return vec![SeasonalOrder::none()];
        }
        let mut out = Vec::with_capacity(8);
        for p in 0..=1 {
            for d in 0..=1 {
                for q in 0..=1 {
                    out.push(SeasonalOrder::new(p, d, q, period));
                }
            }
        }
        out
    }
}

/// Fit every order from `(0, 0, 0)` to `(p, max(d, 1), q)` and return the
/// one with the lowest AICc.
///
/// All candidates are conditioned on a common burn-in so their criteria are
/// computed on the same observations. When the deadline passes, the best
/// model so far is returned, or `DeadlineExceeded` if none was fitted yet.
pub fn best_fit_model(
    series: &[f64],
    bounds: ArimaOrder,
    options: &SearchOptions,
) -> Result<ArimaModel> {
    let started = Instant::now();
    let max_p = bounds.p.min(options.max_p);
    let max_q = bounds.q.min(options.max_q);
    let max_d = bounds.d.max(1);

    let mut candidates = Vec::new();
    for seasonal in options.seasonal_orders(series.len()) {
        for d in 0..=max_d {
            for p in 0..=max_p {
                for q in 0..=max_q {
                    let order = ArimaOrder::new(p, d, q).with_seasonal(seasonal);
                    let needed = order.min_burn() + order.n_coefficients() + 2;
                    if needed <= series.len() {
                        candidates.push(order);
                    }
                }
            }
        }
    }
    if candidates.is_empty() {
        return Err(AnomalyError::InsufficientData {
            needed: 2,
            got: series.len(),
        });
    }
    let burn = candidates.iter().map(|o| o.min_burn()).max().unwrap_or(0);

    let mut best: Option<ArimaModel> = None;
    let mut first_error = None;
    for order in candidates {
        if let Some(deadline) = options.deadline {
            if started.elapsed() >= deadline {
                debug!(elapsed_ms = started.elapsed().as_millis(), "order search deadline");
                return best.ok_or(AnomalyError::DeadlineExceeded {
                    elapsed_ms: started.elapsed().as_millis(),
                });
            }
        }
        match ArimaModel::fit_conditioned(series, order, burn) {
            Ok(model) => {
                let aicc = model.aicc();
                debug!(order = %order, aicc, "candidate fitted");
                let better = best
                    .as_ref()
                    .map(|b| aicc.is_finite() && aicc < b.aicc())
                    .unwrap_or(aicc.is_finite());
                if better {
                    best = Some(model);
                }
            }
            Err(err) => {
                debug!(order = %order, error = %err, "candidate rejected");
                first_error.get_or_insert(err);
            }
        }
    }

    best.ok_or_else(|| match first_error {
        Some(err @ AnomalyError::InsufficientData { .. }) => err,
        _ => AnomalyError::NonConvergent(format!(
            "no order up to {bounds} produced a finite AICc"
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect()
    }

    fn ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let e = noise(n, seed);
        let mut x = vec![0.0; n];
        for t in 1..n {
            x[t] = phi * x[t - 1] + e[t];
        }
        x
    }

    #[test]
    fn white_noise_needs_no_differencing() {
        assert_eq!(optimal_differencing(&noise(200, 3), 3, 0.05), 0);
    }

    #[test]
    fn random_walk_needs_one_difference() {
        let walk: Vec<f64> = noise(300, 8)
            .iter()
            .scan(0.0, |acc, e| {
                *acc += e;
                Some(*acc)
            })
            .collect();
        assert_eq!(optimal_differencing(&walk, 3, 0.05), 1);
    }

    #[test]
    fn ar_order_sees_ar1_signal() {
        assert!(max_ar_order(&ar1(0.8, 300, 2), 0.05) >= 1);
    }

    #[test]
    fn orders_of_flat_or_short_series_are_zero() {
        assert_eq!(max_ar_order(&[3.0; 50], 0.05), 0);
        assert_eq!(max_ma_order(&[3.0; 50], 0.05), 0);
        assert_eq!(max_ar_order(&[1.0, 2.0, 3.0], 0.05), 0);
    }

    #[test]
    fn ma_order_stops_at_first_lag_in_band() {
        let series: Vec<f64> = (0..200)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 40.0).sin())
            .collect();
        let q = max_ma_order(&series, 0.05);
        assert!((3..=10).contains(&q), "q = {q}");
    }

    #[test]
    fn starting_parameters_cap_ma_order() {
        let series: Vec<f64> = (0..400)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 200.0).sin())
            .collect();
        let order = starting_parameters(&series, 0.05);
        assert!(order.q < MA_ORDER_LIMIT);
    }

    #[test]
    fn grid_search_stays_within_bounds() {
        let series = ar1(0.6, 150, 5);
        let options = SearchOptions {
            seasonal: false,
            ..SearchOptions::default()
        };
        let model = best_fit_model(&series, ArimaOrder::new(2, 0, 1), &options).unwrap();
        let order = model.order();
        assert!(order.p <= 2 && order.q <= 1 && order.d <= 1);
        assert!(model.aicc().is_finite());
    }

    #[test]
    fn seasonal_orders_require_enough_cycles() {
        let options = SearchOptions::default();
        assert_eq!(options.seasonal_orders(100), vec![SeasonalOrder::none()]);
        assert_eq!(options.seasonal_orders(200).len(), 8);
    }

    #[test]
    fn zero_deadline_fails_before_fitting() {
        let options = SearchOptions {
            deadline: Some(Duration::ZERO),
            seasonal: false,
            ..SearchOptions::default()
        };
        assert!(matches!(
            best_fit_model(&noise(80, 1), ArimaOrder::new(1, 0, 1), &options),
            Err(AnomalyError::DeadlineExceeded { .. })
        ));
    }
}
