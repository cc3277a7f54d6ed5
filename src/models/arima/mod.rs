//! Seasonal ARIMA and its order search.
//!
//! This module provides:
//! - Differencing helpers and their inverse
//! - [`ArimaModel`], fitted by conditional sum of squares, with AIC/AICc/BIC
//!   and prediction intervals
//! - The order-search heuristics used by the ARIMA detection strategy

mod diff;
mod model;
mod search;

pub use diff::{difference, differencing_polynomial, seasonal_difference};
pub use model::{ArimaForecast, ArimaModel, ArimaOrder, Coefficients, SeasonalOrder};
pub use search::{
    best_fit_model, max_ar_order, max_ma_order, optimal_differencing, starting_parameters,
    SearchOptions, MA_ORDER_LIMIT, WEEKLY_SEASONAL_PERIOD,
};
