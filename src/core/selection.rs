//! Measure/dimension selection and resampling frequency.

use crate::core::measure::MeasureRegistry;
use crate::core::table::Table;
use crate::error::{AnomalyError, Result, SelectionKind};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::fmt;
use std::str::FromStr;

/// Column used to split the data into per-category series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    /// No split: a single aggregate series.
    #[default]
    All,
    /// Split by the values of a categorical column.
    Column(String),
}

impl Dimension {
    /// Sentinel name of [`Dimension::All`].
    pub const ALL: &'static str = "ALL";

    /// Column name, or `None` for `All`.
    pub fn column(&self) -> Option<&str> {
        match self {
            Dimension::All => None,
            Dimension::Column(name) => Some(name),
        }
    }

    /// Whether this is the `All` sentinel.
    pub fn is_all(&self) -> bool {
        matches!(self, Dimension::All)
    }
}

/// Parses `ALL` in any case as [`Dimension::All`]; any other name becomes an
/// upper-cased column name. Use [`Selection`] to match it against a table.
impl FromStr for Dimension {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_uppercase();
        if name.is_empty() {
            return Err(AnomalyError::InvalidSelection {
                kind: SelectionKind::Dimension,
                name: s.to_string(),
            });
        }
        if name == Self::ALL {
            Ok(Dimension::All)
        } else {
            Ok(Dimension::Column(name))
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::All => write!(f, "{}", Self::ALL),
            Dimension::Column(name) => write!(f, "{}", name),
        }
    }
}

/// Resampling bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Seven-day buckets starting on `start`, labelled by their first day.
    Weekly { start: Weekday },
}

impl Frequency {
    /// Label of the bucket containing `date`.
    pub fn bucket(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Weekly { start } => {
                let offset = (7 + date.weekday().num_days_from_monday()
                    - start.num_days_from_monday())
                    % 7;
                date - Duration::days(offset as i64)
            }
        }
    }

    /// Label of the bucket after the one labelled `label`.
    pub fn next(&self, label: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Weekly { .. } => label + Duration::days(7),
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Weekly {
            start: Weekday::Mon,
        }
    }
}

/// Validated measure and dimension selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    measure: String,
    dimension: Dimension,
}

impl Selection {
    /// Validate a measure against the registry and a dimension against the
    /// categorical columns of `table`.
    pub fn new(
        registry: &MeasureRegistry,
        table: &Table,
        measure: &str,
        dimension: &str,
    ) -> Result<Self> {
        Ok(Self {
            measure: validate_measure(registry, measure)?,
            dimension: resolve_dimension(table, dimension)?,
        })
    }

    /// Selected measure name.
    pub fn measure(&self) -> &str {
        &self.measure
    }

    /// Selected dimension.
    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    /// Change the measure. On failure the selection is left unchanged.
    pub fn set_measure(&mut self, registry: &MeasureRegistry, measure: &str) -> Result<()> {
        self.measure = validate_measure(registry, measure)?;
        Ok(())
    }

    /// Change the dimension. On failure the selection is left unchanged.
    pub fn set_dimension(&mut self, table: &Table, dimension: &str) -> Result<()> {
        self.dimension = resolve_dimension(table, dimension)?;
        Ok(())
    }
}

fn validate_measure(registry: &MeasureRegistry, measure: &str) -> Result<String> {
    let name = measure.trim().to_uppercase();
    if registry.contains(&name) {
        Ok(name)
    } else {
        Err(AnomalyError::InvalidSelection {
            kind: SelectionKind::Measure,
            name: measure.to_string(),
        })
    }
}

/// Match `dimension` against the categorical columns of `table`, ignoring
/// case. An exact match wins over a case-insensitive one.
pub(crate) fn resolve_dimension(table: &Table, dimension: &str) -> Result<Dimension> {
    let invalid = || AnomalyError::InvalidSelection {
        kind: SelectionKind::Dimension,
        name: dimension.to_string(),
    };
    let upper = match dimension.parse::<Dimension>().map_err(|_| invalid())? {
        Dimension::All => return Ok(Dimension::All),
        Dimension::Column(upper) => upper,
    };
    let columns = table.dimensions();
    let exact = dimension.trim();
    columns
        .iter()
        .find(|c| c.as_str() == exact)
        .or_else(|| columns.iter().find(|c| c.to_uppercase() == upper))
        .map(|c| Dimension::Column(c.clone()))
        .ok_or_else(invalid)
}
