//! Seasonal ARIMA fitted by conditional sum of squares.
//!
//! The seasonal part is additive: seasonal AR and MA terms enter at lags
//! `s, 2s, ..` alongside the regular lags rather than multiplying the regular
//! polynomials. Differencing is `(1 − B)^d (1 − B^s)^D`.

use std::fmt;

use crate::error::{AnomalyError, Result};
use crate::models::arima::diff::{
    difference, differencing_polynomial, poly_mul, seasonal_difference,
};
use crate::utils::optimization::NelderMead;
use crate::utils::stats::{mean, quantile_normal};

const COEFFICIENT_BOUND: f64 = 0.99;
const MAX_ITER: usize = 500;

/// Seasonal `(P, D, Q)` order at period `s`. A zero period disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

impl SeasonalOrder {
    pub fn new(p: usize, d: usize, q: usize, period: usize) -> Self {
        Self { p, d, q, period }
    }

    /// No seasonal component.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.period == 0 || self.p + self.d + self.q == 0
    }
}

/// ARIMA order `(p, d, q)` with an optional seasonal part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal: SeasonalOrder,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal: SeasonalOrder::none(),
        }
    }

    pub fn with_seasonal(mut self, seasonal: SeasonalOrder) -> Self {
        self.seasonal = seasonal;
        self
    }

    /// Effective seasonal period, 0 when there is no seasonal part.
    pub fn period(&self) -> usize {
        if self.seasonal.is_none() {
            0
        } else {
            self.seasonal.period
        }
    }

    /// Observations lost to differencing.
    pub fn differencing_loss(&self) -> usize {
        self.d + self.seasonal.d * self.period()
    }

    /// Longest autoregressive lag.
    pub fn ar_span(&self) -> usize {
        self.p.max(self.seasonal.p * self.period())
    }

    /// Observations consumed before the first residual can be formed.
    pub fn min_burn(&self) -> usize {
        self.differencing_loss() + self.ar_span()
    }

    /// A mean (or drift) term is estimated when total differencing is below 2.
    pub fn includes_mean(&self) -> bool {
        self.d + self.seasonal.d * usize::from(self.period() > 0) < 2
    }

    /// Number of estimated coefficients, excluding the innovation variance.
    pub fn n_coefficients(&self) -> usize {
        let seasonal = if self.period() > 0 {
            self.seasonal.p + self.seasonal.q
        } else {
            0
        };
        usize::from(self.includes_mean()) + self.p + self.q + seasonal
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)?;
        if self.period() > 0 {
            write!(
                f,
                "({},{},{})[{}]",
                self.seasonal.p, self.seasonal.d, self.seasonal.q, self.seasonal.period
            )?;
        }
        Ok(())
    }
}

/// Estimated coefficients of an [`ArimaModel`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coefficients {
    /// Mean of the differenced series (drift when `d + D = 1`).
    pub mean: f64,
    pub ar: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

impl Coefficients {
    fn unpack(order: &ArimaOrder, params: &[f64]) -> Self {
        let seasonal = order.period() > 0;
        let mut rest = params;
        let mut take = |k: usize| {
            let (head, tail) = rest.split_at(k.min(rest.len()));
            rest = tail;
            head.to_vec()
        };
        let mean = if order.includes_mean() {
            take(1).first().copied().unwrap_or(0.0)
        } else {
            0.0
        };
        let ar = take(order.p);
        let seasonal_ar = take(if seasonal { order.seasonal.p } else { 0 });
        let ma = take(order.q);
        let seasonal_ma = take(if seasonal { order.seasonal.q } else { 0 });
        Self {
            mean,
            ar,
            seasonal_ar,
            ma,
            seasonal_ma,
        }
    }

    /// `1 − Σ φ_i Bⁱ − Σ Φ_k B^{ks}`, lowest power first.
    pub fn ar_polynomial(&self, period: usize) -> Vec<f64> {
        lag_polynomial(&self.ar, &self.seasonal_ar, period, -1.0)
    }

    /// `1 + Σ θ_j Bʲ + Σ Θ_k B^{ks}`, lowest power first.
    pub fn ma_polynomial(&self, period: usize) -> Vec<f64> {
        lag_polynomial(&self.ma, &self.seasonal_ma, period, 1.0)
    }
}

fn lag_polynomial(regular: &[f64], seasonal: &[f64], period: usize, sign: f64) -> Vec<f64> {
    let degree = regular.len().max(seasonal.len() * period);
    let mut poly = vec![0.0; degree + 1];
    poly[0] = 1.0;
    for (i, c) in regular.iter().enumerate() {
        poly[i + 1] += sign * c;
    }
    for (k, c) in seasonal.iter().enumerate() {
        poly[(k + 1) * period] += sign * c;
    }
    poly
}

/// Non-zero `(lag, coefficient)` pairs of a polynomial, skipping lag 0.
fn terms(poly: &[f64]) -> Vec<(usize, f64)> {
    poly.iter()
        .enumerate()
        .skip(1)
        .filter(|(_, c)| **c != 0.0)
        .map(|(i, c)| (i, *c))
        .collect()
}

/// Point forecasts with a symmetric prediction interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaForecast {
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub std_errors: Vec<f64>,
    /// Coverage of the interval, e.g. 0.95.
    pub level: f64,
}

impl ArimaForecast {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// A fitted seasonal ARIMA model.
#[derive(Debug, Clone)]
pub struct ArimaModel {
    order: ArimaOrder,
    coefficients: Coefficients,
    history: Vec<f64>,
    /// Residuals on the differenced scale; zero before the first fitted point.
    residuals: Vec<f64>,
    sigma2: f64,
    nobs: usize,
    log_likelihood: f64,
    converged: bool,
}

impl ArimaModel {
    /// Fit `order` to `series` by conditional sum of squares.
    pub fn fit(series: &[f64], order: ArimaOrder) -> Result<Self> {
        Self::fit_conditioned(series, order, 0)
    }

    /// Fit while excluding the first `burn` observations from the objective.
    ///
    /// Fitting candidates of different orders with a common `burn` makes
    /// their information criteria comparable.
    pub fn fit_conditioned(series: &[f64], order: ArimaOrder, burn: usize) -> Result<Self> {
        let count = series.iter().filter(|x| !x.is_finite()).count();
        if count > 0 {
            return Err(AnomalyError::NonFiniteData { count });
        }

        let period = order.period();
        let loss = order.differencing_loss();
        let start = order.ar_span().max(burn.saturating_sub(loss));
        let k = order.n_coefficients();
        let needed = loss + start + k + 2;
        if series.len() < needed {
            return Err(AnomalyError::InsufficientData {
                needed,
                got: series.len(),
            });
        }

        let w = seasonal_difference(&difference(series, order.d), order.seasonal.d, period);
        let nobs = w.len() - start;

        let mut initial = Vec::with_capacity(k);
        if order.includes_mean() {
            initial.push(mean(&w));
        }
        initial.extend((0..order.p).map(|i| 0.1 / (i + 1) as f64));
        if period > 0 {
            initial.extend(std::iter::repeat_n(0.1, order.seasonal.p));
        }
        initial.extend((0..order.q).map(|i| 0.1 / (i + 1) as f64));
        if period > 0 {
            initial.extend(std::iter::repeat_n(0.1, order.seasonal.q));
        }

        let mut bounds = Vec::with_capacity(k);
        if order.includes_mean() {
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }
        bounds.resize(k, (-COEFFICIENT_BOUND, COEFFICIENT_BOUND));

        let objective = |params: &[f64]| {
            let c = Coefficients::unpack(&order, params);
            let e = css_residuals(&w, &c, period, start);
            e[start..].iter().map(|r| r * r).sum::<f64>()
        };
        let min = NelderMead::new()
            .with_max_iter(MAX_ITER)
            .with_bounds(bounds)
            .minimize(objective, &initial);

        if !min.value.is_finite() {
            return Err(AnomalyError::NonConvergent(format!(
                "{order}: conditional sum of squares diverged"
            )));
        }

        let coefficients = Coefficients::unpack(&order, &min.point);
        let residuals = css_residuals(&w, &coefficients, period, start);
        let sigma2 = min.value / nobs as f64;
        let log_likelihood = -0.5
            * nobs as f64
            * ((2.0 * std::f64::consts::PI * sigma2.max(f64::MIN_POSITIVE)).ln() + 1.0);

        Ok(Self {
            order,
            coefficients,
            history: series.to_vec(),
            residuals,
            sigma2,
            nobs,
            log_likelihood,
            converged: min.converged,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Innovation variance estimate.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Observations entering the likelihood.
    pub fn nobs(&self) -> usize {
        self.nobs
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Whether the optimiser met its tolerance.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Residuals on the differenced scale.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Estimated parameters including the innovation variance.
    fn n_params(&self) -> f64 {
        (self.order.n_coefficients() + 1) as f64
    }

    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood + 2.0 * self.n_params()
    }

    /// Small-sample corrected AIC; infinite when the sample is too small.
    pub fn aicc(&self) -> f64 {
        let k = self.n_params();
        let denom = self.nobs as f64 - k - 1.0;
        if denom <= 0.0 {
            return f64::INFINITY;
        }
        self.aic() + 2.0 * k * (k + 1.0) / denom
    }

    pub fn bic(&self) -> f64 {
        -2.0 * self.log_likelihood + self.n_params() * (self.nobs as f64).ln()
    }

    /// Forecast `steps` ahead with a prediction interval of coverage `level`.
    pub fn forecast(&self, steps: usize, level: f64) -> Result<ArimaForecast> {
        if !(level > 0.0 && level < 1.0) {
            return Err(AnomalyError::InvalidParameter(format!(
                "interval level must be in (0, 1), got {level}"
            )));
        }

        let period = self.order.period();
        let phi = self.coefficients.ar_polynomial(period);
        let theta = self.coefficients.ma_polynomial(period);
        let pi = poly_mul(
            &phi,
            &differencing_polynomial(self.order.d, self.order.seasonal.d, period),
        );
        let constant = self.coefficients.mean * phi.iter().sum::<f64>();
        let pi_terms = terms(&pi);
        let theta_terms = terms(&theta);

        let loss = self.order.differencing_loss();
        let mut y = self.history.clone();
        let mut e = vec![0.0; loss];
        e.extend_from_slice(&self.residuals);

        let mut mean_path = Vec::with_capacity(steps);
        for _ in 0..steps {
            let t = y.len();
            let mut value = constant;
            for &(i, c) in &pi_terms {
                value -= c * y[t - i];
            }
            for &(j, c) in &theta_terms {
                if t >= j {
                    value += c * e[t - j];
                }
            }
            y.push(value);
            e.push(0.0);
            mean_path.push(value);
        }

        // ψ weights of π(B) ψ(B) = θ(B)
        let mut psi = vec![0.0; steps.max(1)];
        psi[0] = 1.0;
        for j in 1..steps {
            let mut value = theta.get(j).copied().unwrap_or(0.0);
            for &(i, c) in pi_terms.iter().filter(|(i, _)| *i <= j) {
                value -= c * psi[j - i];
            }
            psi[j] = value;
        }

        let z = quantile_normal((1.0 + level) / 2.0);
        let mut cumulative = 0.0;
        let mut std_errors = Vec::with_capacity(steps);
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        for (h, point) in mean_path.iter().enumerate() {
            cumulative += psi[h] * psi[h];
            let se = (self.sigma2 * cumulative).sqrt();
            std_errors.push(se);
            lower.push(point - z * se);
            upper.push(point + z * se);
        }

        Ok(ArimaForecast {
            mean: mean_path,
            lower,
            upper,
            std_errors,
            level,
        })
    }
}

/// One-step residuals of the differenced series `w`, zero before `start`.
fn css_residuals(w: &[f64], c: &Coefficients, period: usize, start: usize) -> Vec<f64> {
    let ar = terms(&c.ar_polynomial(period));
    let ma = terms(&c.ma_polynomial(period));
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut value = w[t] - c.mean;
        for &(i, coef) in &ar {
            value += coef * (w[t - i] - c.mean);
        }
        for &(j, coef) in &ma {
            if t >= j {
                value -= coef * e[t - j];
            }
        }
        e[t] = value;
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect()
    }

    #[test]
    fn order_bookkeeping() {
        let order = ArimaOrder::new(2, 1, 1).with_seasonal(SeasonalOrder::new(1, 1, 0, 52));
        assert_eq!(order.period(), 52);
        assert_eq!(order.differencing_loss(), 53);
        assert_eq!(order.ar_span(), 52);
        assert!(!order.includes_mean());
        assert_eq!(order.n_coefficients(), 4);
        assert_eq!(order.to_string(), "ARIMA(2,1,1)(1,1,0)[52]");
        assert_eq!(ArimaOrder::new(1, 0, 0).to_string(), "ARIMA(1,0,0)");
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let e = noise(600, 1);
        let mut x = vec![0.0; e.len()];
        for t in 1..x.len() {
            x[t] = 0.6 * x[t - 1] + e[t];
        }
        let model = ArimaModel::fit(&x, ArimaOrder::new(1, 0, 0)).unwrap();
        assert_relative_eq!(model.coefficients().ar[0], 0.6, epsilon = 0.1);
        assert_relative_eq!(model.coefficients().mean, 0.0, epsilon = 0.1);
        assert!(model.aicc() > model.aic());
        assert!(model.bic() > model.aic());
    }

    #[test]
    fn drift_model_extends_trend() {
        let e = noise(100, 5);
        let series: Vec<f64> = (0..100).map(|i| 2.0 * i as f64 + 0.1 * e[i]).collect();
        let model = ArimaModel::fit(&series, ArimaOrder::new(0, 1, 0)).unwrap();
        let fc = model.forecast(3, 0.95).unwrap();
        let last = series[99];
        assert_relative_eq!(fc.mean[0], last + 2.0, epsilon = 0.05);
        assert_relative_eq!(fc.mean[2], last + 6.0, epsilon = 0.15);
        assert!(fc.std_errors[2] > fc.std_errors[0]);
        for h in 0..3 {
            assert!(fc.lower[h] < fc.mean[h] && fc.mean[h] < fc.upper[h]);
        }
    }

    #[test]
    fn seasonal_difference_repeats_pattern() {
        let pattern = [10.0, 14.0, 9.0, 12.0];
        let series: Vec<f64> = (0..40).map(|i| pattern[i % 4]).collect();
        let order = ArimaOrder::new(0, 0, 0).with_seasonal(SeasonalOrder::new(0, 1, 0, 4));
        let model = ArimaModel::fit(&series, order).unwrap();
        let fc = model.forecast(4, 0.95).unwrap();
        for (h, expected) in pattern.iter().enumerate() {
            assert_relative_eq!(fc.mean[h], *expected, epsilon = 1e-3);
        }
    }

    #[test]
    fn white_noise_interval_is_flat() {
        let series = noise(200, 9);
        let model = ArimaModel::fit(&series, ArimaOrder::new(0, 0, 0)).unwrap();
        let fc = model.forecast(4, 0.9).unwrap();
        assert_eq!(fc.len(), 4);
        assert_relative_eq!(fc.std_errors[0], fc.std_errors[3], epsilon = 1e-12);
        assert_relative_eq!(fc.std_errors[0], model.sigma2().sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn short_series_is_rejected() {
        assert!(matches!(
            ArimaModel::fit(&[1.0, 2.0, 3.0], ArimaOrder::new(2, 1, 1)),
            Err(AnomalyError::InsufficientData { .. })
        ));
    }

    #[test]
    fn invalid_level_is_rejected() {
        let model = ArimaModel::fit(&noise(50, 2), ArimaOrder::new(0, 0, 0)).unwrap();
        assert!(model.forecast(2, 1.5).is_err());
    }

    #[test]
    fn common_burn_shrinks_sample() {
        let series = noise(120, 4);
        let plain = ArimaModel::fit(&series, ArimaOrder::new(1, 0, 0)).unwrap();
        let conditioned =
            ArimaModel::fit_conditioned(&series, ArimaOrder::new(1, 0, 0), 10).unwrap();
        assert_eq!(plain.nobs(), 119);
        assert_eq!(conditioned.nobs(), 110);
    }
}
