//! Anomaly Table: the scored output of a detection run.

use chrono::NaiveDate;

use crate::core::{Column, Dimension, Table};
use crate::detection::config::Strategy;
use crate::error::{AnomalyError, Result};

/// Score column name in [`AnomalyTable::to_table`].
pub const SCORE_COLUMN: &str = "STANDARD_DEVIATIONS";
/// Flag column name in [`AnomalyTable::to_table`]; 1 for anomalies, else 0.
pub const ANOMALY_COLUMN: &str = "ANOMALY";

/// One scored observation of one category's series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPoint {
    pub date: NaiveDate,
    pub value: f64,
    /// Standardised deviation; NaN when the scale is degenerate.
    pub score: f64,
    pub anomaly: bool,
}

/// A scored observation tagged with its category.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRow {
    pub date: NaiveDate,
    pub category: String,
    pub value: f64,
    pub score: f64,
    pub anomaly: bool,
}

impl AnomalyRow {
    pub(crate) fn from_point(category: &str, point: ScoredPoint) -> Self {
        Self {
            date: point.date,
            category: category.to_string(),
            value: point.value,
            score: point.score,
            anomaly: point.anomaly,
        }
    }
}

/// A category whose detector failed during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFailure {
    pub category: String,
    pub error: AnomalyError,
}

/// Result of a detection run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnomalyTable {
    strategy: Option<Strategy>,
    measure: String,
    dimension: Dimension,
    sig_level: f64,
    rows: Vec<AnomalyRow>,
    failures: Vec<CategoryFailure>,
}

impl AnomalyTable {
    /// Build a table, ordering rows by date then category.
    pub fn new(
        strategy: Strategy,
        measure: &str,
        dimension: Dimension,
        sig_level: f64,
        mut rows: Vec<AnomalyRow>,
        mut failures: Vec<CategoryFailure>,
    ) -> Self {
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.category.cmp(&b.category)));
        failures.sort_by(|a, b| a.category.cmp(&b.category));
        Self {
            strategy: Some(strategy),
            measure: measure.to_string(),
            dimension,
            sig_level,
            rows,
            failures,
        }
    }

    /// Strategy of the run, `None` before any run.
    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }

    pub fn measure(&self) -> &str {
        &self.measure
    }

    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    pub fn sig_level(&self) -> f64 {
        self.sig_level
    }

    /// Every scored observation.
    pub fn rows(&self) -> &[AnomalyRow] {
        &self.rows
    }

    /// Observations that crossed the significance threshold.
    pub fn flagged(&self) -> Vec<&AnomalyRow> {
        self.rows.iter().filter(|r| r.anomaly).collect()
    }

    /// Categories dropped from the run and why.
    pub fn failures(&self) -> &[CategoryFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Columnar view: date, dimension, measure, score and flag.
    pub fn to_table(&self, date_column: &str) -> Result<Table> {
        let dimension_column = self.dimension.to_string();
        if dimension_column == self.measure {
            return Err(AnomalyError::InvalidParameter(format!(
                "dimension and measure share the name {}",
                self.measure
            )));
        }
        Table::new(date_column, self.rows.iter().map(|r| r.date).collect())
            .with_labels(dimension_column, self.rows.iter().map(|r| r.category.clone()))?
            .with_values(self.measure.clone(), self.rows.iter().map(|r| r.value))?
            .with_values(SCORE_COLUMN, self.rows.iter().map(|r| r.score))?
            .with_column(
                ANOMALY_COLUMN,
                Column::Numeric(
                    self.rows
                        .iter()
                        .map(|r| Some(if r.anomaly { 1.0 } else { 0.0 }))
                        .collect(),
                ),
            )
    }
}
