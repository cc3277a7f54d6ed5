//! Anomaly detection over per-category weekly series.
//!
//! This module provides:
//! - The STL and ARIMA scoring strategies for a single category
//! - [`AnomalyModel`], which prepares the data, fans out over categories and
//!   merges the results into an [`AnomalyTable`]

mod arima;
mod config;
mod model;
mod result;
mod stl;

pub use arima::arima_anomalies;
pub use config::{DetectionConfig, Strategy, DEFAULT_BAD_CATEGORY_FLOOR};
pub use model::{AnomalyModel, DEFAULT_MEASURE};
pub use result::{
    AnomalyRow, AnomalyTable, CategoryFailure, ScoredPoint, ANOMALY_COLUMN, SCORE_COLUMN,
};
pub use stl::stl_anomalies;

use chrono::NaiveDate;

use crate::core::Table;
use crate::error::{AnomalyError, Result};

/// Dates and measure values of one category, in date order.
///
/// Fails with [`AnomalyError::NonFiniteData`] if any value is NaN or infinite.
pub(crate) fn extract_series(table: &Table, measure: &str) -> Result<(Vec<NaiveDate>, Vec<f64>)> {
    if table.is_empty() {
        return Err(AnomalyError::EmptyData);
    }
    let mut sorted = table.clone();
    sorted.sort_by_date();
    let values = sorted.values(measure)?;
    let count = values.iter().filter(|v| !v.is_finite()).count();
    if count > 0 {
        return Err(AnomalyError::NonFiniteData { count });
    }
    Ok((sorted.dates().to_vec(), values))
}
