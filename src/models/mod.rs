//! Statistical models.

pub mod arima;
