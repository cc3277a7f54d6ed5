//! Stationarity testing.

pub mod stationarity;

pub use stationarity::{adf_test, mackinnon_p_value, AdfResult, CriticalValues, MIN_ADF_LENGTH};
