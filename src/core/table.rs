//! Columnar table of date-indexed transactional rows.
//!
//! A [`Table`] holds one date column plus any number of named categorical
//! ("dimension") and numeric columns. Cells may be missing (`None`). All
//! transforms in [`crate::transform`] take a table by reference and return a
//! new one, so a table handed to the engine is never mutated behind the
//! caller's back.

use crate::core::selection::Dimension;
use crate::error::{AnomalyError, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Default name of the date column.
pub const DEFAULT_DATE_COLUMN: &str = "QUOTE_DATE";

/// A single named column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Free-text category labels.
    Categorical(Vec<Option<String>>),
    /// Numeric counts or derived measures.
    Numeric(Vec<Option<f64>>),
}

impl Column {
    /// Number of cells.
    pub fn len(&self) -> usize {
        match self {
            Column::Categorical(v) => v.len(),
            Column::Numeric(v) => v.len(),
        }
    }

    /// Whether the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the column holds numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    /// Number of missing cells; a NaN number counts as missing.
    pub fn missing_count(&self) -> usize {
        match self {
            Column::Categorical(v) => v.iter().filter(|c| c.is_none()).count(),
            Column::Numeric(v) => v.iter().filter(|c| c.is_none_or(|x| x.is_nan())).count(),
        }
    }

    fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Categorical(v) => {
                Column::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
            Column::Numeric(v) => Column::Numeric(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    fn same_kind(&self, other: &Column) -> bool {
        self.is_numeric() == other.is_numeric()
    }

    fn extend_from(&mut self, other: &Column) {
        match (self, other) {
            (Column::Categorical(a), Column::Categorical(b)) => a.extend(b.iter().cloned()),
            (Column::Numeric(a), Column::Numeric(b)) => a.extend(b.iter().copied()),
            _ => {}
        }
    }
}

/// A date-indexed table with categorical and numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    date_column: String,
    dates: Vec<NaiveDate>,
    columns: Vec<(String, Column)>,
}

impl Table {
    /// Create a table with only a date column.
    pub fn new(date_column: impl Into<String>, dates: Vec<NaiveDate>) -> Self {
        Self {
            date_column: date_column.into(),
            dates,
            columns: Vec::new(),
        }
    }

    /// Add a column, replacing any existing column of the same name.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.set_column(name, column)?;
        Ok(self)
    }

    /// Add a categorical column where every cell is present.
    pub fn with_labels<I, S>(self, name: impl Into<String>, labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells = labels.into_iter().map(|s| Some(s.into())).collect();
        self.with_column(name, Column::Categorical(cells))
    }

    /// Add a numeric column where every cell is present.
    pub fn with_values<I>(self, name: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let cells = values.into_iter().map(Some).collect();
        self.with_column(name, Column::Numeric(cells))
    }

    /// Insert or replace a column in place.
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if column.len() != self.dates.len() {
            return Err(AnomalyError::LengthMismatch {
                expected: self.dates.len(),
                got: column.len(),
            });
        }
        if name == self.date_column {
            return Err(AnomalyError::InvalidParameter(format!(
                "column {} collides with the date column",
                name
            )));
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    /// Name of the date column.
    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    /// Row dates.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// All columns except the date column, in order.
    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut Vec<(String, Column)> {
        &mut self.columns
    }

    /// Every column name, date column first.
    pub fn column_names(&self) -> Vec<String> {
        std::iter::once(self.date_column.clone())
            .chain(self.columns.iter().map(|(n, _)| n.clone()))
            .collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Whether a non-date column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Categorical cells of a column.
    pub fn categorical(&self, name: &str) -> Result<&[Option<String>]> {
        match self.column(name) {
            Some(Column::Categorical(v)) => Ok(v),
            Some(Column::Numeric(_)) => Err(AnomalyError::InvalidParameter(format!(
                "column {} is numeric, expected categorical",
                name
            ))),
            None => Err(AnomalyError::MissingColumn(name.to_string())),
        }
    }

    /// Numeric cells of a column.
    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Categorical(_)) => Err(AnomalyError::InvalidParameter(format!(
                "column {} is categorical, expected numeric",
                name
            ))),
            None => Err(AnomalyError::MissingColumn(name.to_string())),
        }
    }

    /// Numeric column as plain values, missing cells as NaN.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self
            .numeric(name)?
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    /// Names of the categorical columns (the candidate dimensions).
    pub fn dimensions(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, c)| !c.is_numeric())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Names of the numeric columns.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, c)| c.is_numeric())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Sorted distinct categories of a dimension; `["ALL"]` for [`Dimension::All`].
    pub fn categories(&self, dimension: &Dimension) -> Result<Vec<String>> {
        match dimension {
            Dimension::All => Ok(vec![Dimension::ALL.to_string()]),
            Dimension::Column(name) => {
                let set: BTreeSet<&String> = self.categorical(name)?.iter().flatten().collect();
                Ok(set.into_iter().cloned().collect())
            }
        }
    }

    /// Number of rows per category of a dimension.
    pub fn value_counts(&self, dimension: &Dimension) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        match dimension {
            Dimension::All => {
                counts.insert(Dimension::ALL.to_string(), self.len());
            }
            Dimension::Column(name) => {
                for label in self.categorical(name)?.iter().flatten() {
                    *counts.entry(label.clone()).or_insert(0) += 1;
                }
            }
        }
        Ok(counts)
    }

    /// Select rows by index, in the given order.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            date_column: self.date_column.clone(),
            dates: indices.iter().map(|&i| self.dates[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.take(indices)))
                .collect(),
        }
    }

    /// Keep rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Table {
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, &keep)| keep)
            .map(|(i, _)| i)
            .collect();
        self.take(&indices)
    }

    /// Stable sort of the rows by date.
    pub fn sort_by_date(&mut self) {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.sort_by_key(|&i| self.dates[i]);
        *self = self.take(&indices);
    }

    /// Whether both tables have the same set of column names, ignoring order.
    pub fn same_schema(&self, other: &Table) -> bool {
        let mine: BTreeSet<String> = self.column_names().into_iter().collect();
        let theirs: BTreeSet<String> = other.column_names().into_iter().collect();
        mine == theirs
    }

    /// Append the rows of `other`, matching columns by name.
    pub fn concat(&mut self, other: &Table) -> Result<()> {
        let mismatch = || AnomalyError::SchemaMismatch {
            expected: self.column_names(),
            got: other.column_names(),
        };
        if !self.same_schema(other) || self.date_column != other.date_column {
            return Err(mismatch());
        }
        for (name, column) in &self.columns {
            let theirs = other.column(name).ok_or_else(mismatch)?;
            if !column.same_kind(theirs) {
                return Err(mismatch());
            }
        }

        self.dates.extend_from_slice(&other.dates);
        for (name, column) in self.columns.iter_mut() {
            if let Some(theirs) = other.column(name) {
                column.extend_from(theirs);
            }
        }
        Ok(())
    }

    /// Reorder the non-date columns so that `first` comes first.
    pub(crate) fn move_to_front(&mut self, first: &str) {
        if let Some(pos) = self.columns.iter().position(|(n, _)| n == first) {
            let col = self.columns.remove(pos);
            self.columns.insert(0, col);
        }
    }
}
