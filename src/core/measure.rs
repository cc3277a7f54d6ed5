//! Measure registry: which source columns a measure aggregates and how the
//! derived column is computed.

use crate::error::{AnomalyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregation applied to a source column when rows are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Min,
    Max,
    Count,
}

impl Aggregation {
    /// Aggregate the present values of a group. Empty groups give 0.
    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Count => values.len() as f64,
        }
    }
}

/// How the measure column is derived from the aggregated sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MeasureKind {
    /// `numerator / denominator` per row.
    Ratio {
        numerator: String,
        denominator: String,
    },
    /// A row's value divided by the total of that column on the same date.
    Proportion { column: String },
    /// The aggregated column itself.
    Volume { column: String },
}

impl MeasureKind {
    /// Source columns the derivation reads.
    pub fn required_columns(&self) -> Vec<&str> {
        match self {
            MeasureKind::Ratio {
                numerator,
                denominator,
            } => vec![numerator.as_str(), denominator.as_str()],
            MeasureKind::Proportion { column } | MeasureKind::Volume { column } => {
                vec![column.as_str()]
            }
        }
    }
}

/// Aggregation spec of a single measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureSpec {
    /// Source columns and their aggregation, in output order.
    pub sources: Vec<(String, Aggregation)>,
    /// Derivation of the measure column.
    pub kind: MeasureKind,
}

impl MeasureSpec {
    /// Summed volume of one column.
    pub fn volume(column: &str) -> Self {
        Self {
            sources: vec![(column.to_string(), Aggregation::Sum)],
            kind: MeasureKind::Volume {
                column: column.to_string(),
            },
        }
    }

    /// Share of the date-wide total of one summed column.
    pub fn proportion(column: &str) -> Self {
        Self {
            sources: vec![(column.to_string(), Aggregation::Sum)],
            kind: MeasureKind::Proportion {
                column: column.to_string(),
            },
        }
    }

    /// Ratio of two summed columns.
    pub fn ratio(numerator: &str, denominator: &str) -> Self {
        Self {
            sources: vec![
                (denominator.to_string(), Aggregation::Sum),
                (numerator.to_string(), Aggregation::Sum),
            ],
            kind: MeasureKind::Ratio {
                numerator: numerator.to_string(),
                denominator: denominator.to_string(),
            },
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.sources.is_empty() {
            return Err(AnomalyError::Config(format!(
                "measure {} has no source columns",
                name
            )));
        }
        for column in self.kind.required_columns() {
            if !self.sources.iter().any(|(c, _)| c == column) {
                return Err(AnomalyError::Config(format!(
                    "measure {} derives from {} which it does not aggregate",
                    name, column
                )));
            }
        }
        Ok(())
    }
}

/// Mapping from measure name to its aggregation spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasureRegistry {
    measures: BTreeMap<String, MeasureSpec>,
}

impl MeasureRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            measures: BTreeMap::new(),
        }
    }

    /// Register a measure, replacing any existing one with the same name.
    pub fn with_measure(mut self, name: &str, spec: MeasureSpec) -> Result<Self> {
        spec.validate(name)?;
        self.measures.insert(name.to_string(), spec);
        Ok(self)
    }

    /// Parse a registry from JSON, e.g.
    /// `{"QUOTE_VOLUME": {"sources": [["QUOTE_COUNT", "sum"]], "kind": {"type": "volume", "column": "QUOTE_COUNT"}}}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let registry: MeasureRegistry = serde_json::from_str(json)?;
        for (name, spec) in &registry.measures {
            spec.validate(name)?;
        }
        Ok(registry)
    }

    /// Look up a measure.
    pub fn get(&self, name: &str) -> Result<&MeasureSpec> {
        self.measures
            .get(name)
            .ok_or_else(|| AnomalyError::UnknownMeasure(name.to_string()))
    }

    /// Whether a measure is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.measures.contains_key(name)
    }

    /// Registered measure names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.measures.keys().map(|k| k.as_str()).collect()
    }
}

impl Default for MeasureRegistry {
    fn default() -> Self {
        let measures = [
            ("QUOTE_VOLUME", MeasureSpec::volume("QUOTE_COUNT")),
            ("SALES_VOLUME", MeasureSpec::volume("SALES_COUNT")),
            ("QUOTE_PROPORTION", MeasureSpec::proportion("QUOTE_COUNT")),
            ("SALES_PROPORTION", MeasureSpec::proportion("SALES_COUNT")),
            (
                "CONVERSION_RATE",
                MeasureSpec::ratio("SALES_COUNT", "QUOTE_COUNT"),
            ),
        ];
        Self {
            measures: measures
                .into_iter()
                .map(|(n, s)| (n.to_string(), s))
                .collect(),
        }
    }
}
