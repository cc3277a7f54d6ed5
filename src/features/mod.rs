//! Serial-correlation features used by the ARIMA order search.

pub mod autocorrelation;

pub use autocorrelation::{acf, bartlett_band, constant_band, default_nlags, pacf};
