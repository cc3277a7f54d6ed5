//! Row-level transforms over [`Table`]s.
//!
//! Every function here is pure: it borrows its input and returns a new table.
//! They are composed into pipelines by [`crate::transform::pipeline`].

use crate::core::{Column, Dimension, Frequency, MeasureKind, MeasureRegistry, MeasureSpec, Table};
use crate::error::{AnomalyError, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// How category labels are compared against the requested categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// A label matches if it contains any requested category.
    #[default]
    Substring,
    /// A label matches if it equals a requested category.
    Exact,
}

/// Replace missing cells with `value`.
///
/// Numeric cells that are absent or NaN get `value`; categorical cells get
/// its text form, so `fill_missing(t, 0.0)` turns a missing region into `"0"`.
/// Infinite numbers are left alone.
pub fn fill_missing(table: &Table, value: f64) -> Table {
    let mut out = table.clone();
    let label = value.to_string();
    for (_, column) in out.columns_mut().iter_mut() {
        match column {
            Column::Numeric(cells) => {
                for cell in cells.iter_mut().filter(|c| c.is_none_or(|x| x.is_nan())) {
                    *cell = Some(value);
                }
            }
            Column::Categorical(cells) => {
                for cell in cells.iter_mut().filter(|c| c.is_none()) {
                    *cell = Some(label.clone());
                }
            }
        }
    }
    out
}

/// Group rows by `(date, dimension)`, or by date alone for
/// [`Dimension::All`], aggregating the measure's source columns.
///
/// The result is sorted by the grouping keys and contains only the date,
/// the dimension (if any) and the source columns.
pub fn collapse(
    table: &Table,
    registry: &MeasureRegistry,
    measure: &str,
    dimension: &Dimension,
) -> Result<Table> {
    let spec = registry.get(measure)?;
    collapse_with(table, measure, spec, dimension)
}

pub(crate) fn collapse_with(
    table: &Table,
    measure: &str,
    spec: &MeasureSpec,
    dimension: &Dimension,
) -> Result<Table> {
    let labels = match dimension.column() {
        Some(name) => Some(table.categorical(name)?),
        None => None,
    };
    let sources: Vec<&[Option<f64>]> = spec
        .sources
        .iter()
        .map(|(column, _)| {
            table
                .numeric(column)
                .map_err(|_| AnomalyError::MissingSourceColumn {
                    measure: measure.to_string(),
                    column: column.clone(),
                })
        })
        .collect::<Result<_>>()?;

    // group key -> per-source present values
    let mut groups: BTreeMap<(NaiveDate, Option<&str>), Vec<Vec<f64>>> = BTreeMap::new();
    for (row, &date) in table.dates().iter().enumerate() {
        let key = match labels {
            Some(labels) => match labels[row].as_deref() {
                Some(label) => (date, Some(label)),
                None => continue,
            },
            None => (date, None),
        };
        let acc = groups
            .entry(key)
            .or_insert_with(|| vec![Vec::new(); sources.len()]);
        for (i, source) in sources.iter().enumerate() {
            if let Some(v) = source[row] {
                acc[i].push(v);
            }
        }
    }

    let dates: Vec<NaiveDate> = groups.keys().map(|(d, _)| *d).collect();
    let mut out = Table::new(table.date_column(), dates);
    if let Some(name) = dimension.column() {
        let cells = groups
            .keys()
            .map(|(_, label)| label.map(str::to_string))
            .collect();
        out.set_column(name, Column::Categorical(cells))?;
    }
    for (i, (column, aggregation)) in spec.sources.iter().enumerate() {
        let cells = groups
            .values()
            .map(|acc| Some(aggregation.apply(&acc[i])))
            .collect();
        out.set_column(column.as_str(), Column::Numeric(cells))?;
    }
    Ok(out)
}

/// Keep the rows whose dimension label matches any of `categories`, or drop
/// them when `exclude` is set. Matching is by substring.
///
/// For [`Dimension::All`] there is nothing to filter and the table is
/// returned unchanged.
pub fn filter_category(
    table: &Table,
    dimension: &Dimension,
    categories: &[String],
    exclude: bool,
) -> Result<Table> {
    filter_category_with(table, dimension, categories, exclude, MatchMode::Substring)
}

/// [`filter_category`] with an explicit [`MatchMode`].
pub fn filter_category_with(
    table: &Table,
    dimension: &Dimension,
    categories: &[String],
    exclude: bool,
    mode: MatchMode,
) -> Result<Table> {
    let Some(name) = dimension.column() else {
        return Ok(table.clone());
    };
    let labels = table.categorical(name)?;

    let matches: Vec<bool> = match mode {
        MatchMode::Substring => {
            let pattern = union_pattern(categories)?;
            labels
                .iter()
                .map(|label| match (label, &pattern) {
                    (Some(label), Some(re)) => re.is_match(label),
                    _ => false,
                })
                .collect()
        }
        MatchMode::Exact => labels
            .iter()
            .map(|label| {
                label
                    .as_ref()
                    .is_some_and(|l| categories.iter().any(|c| c == l))
            })
            .collect(),
    };

    let mask: Vec<bool> = matches.into_iter().map(|m| m != exclude).collect();
    Ok(table.filter(&mask))
}

/// Regex matching any of the categories literally. `None` when there are no
/// categories, which matches nothing.
fn union_pattern(categories: &[String]) -> Result<Option<Regex>> {
    if categories.is_empty() {
        return Ok(None);
    }
    let alternation = categories
        .iter()
        .map(|c| regex::escape(c))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation)
        .map(Some)
        .map_err(|e| AnomalyError::InvalidParameter(format!("category pattern: {}", e)))
}

/// Re-bucket a collapsed table into `frequency` buckets, summing every
/// numeric column per `(category, bucket)`.
///
/// Buckets between a category's first and last observation that have no rows
/// are emitted with zero sums. Rows come out ordered by category, then date;
/// the date column stays first and the dimension column second.
pub fn resample(table: &Table, dimension: &Dimension, frequency: Frequency) -> Result<Table> {
    let labels = match dimension.column() {
        Some(name) => Some(table.categorical(name)?),
        None => None,
    };
    let numeric_names = table.numeric_columns();
    let numeric: Vec<&[Option<f64>]> = numeric_names
        .iter()
        .map(|n| table.numeric(n))
        .collect::<Result<_>>()?;

    // category -> bucket -> sums
    let mut groups: BTreeMap<Option<&str>, BTreeMap<NaiveDate, Vec<f64>>> = BTreeMap::new();
    for (row, &date) in table.dates().iter().enumerate() {
        let label = match labels {
            Some(labels) => match labels[row].as_deref() {
                Some(label) => Some(label),
                None => continue,
            },
            None => None,
        };
        let sums = groups
            .entry(label)
            .or_default()
            .entry(frequency.bucket(date))
            .or_insert_with(|| vec![0.0; numeric.len()]);
        for (i, column) in numeric.iter().enumerate() {
            if let Some(v) = column[row] {
                sums[i] += v;
            }
        }
    }

    let mut dates = Vec::new();
    let mut out_labels = Vec::new();
    let mut out_values: Vec<Vec<Option<f64>>> = vec![Vec::new(); numeric.len()];
    for (label, buckets) in &groups {
        let (Some(first), Some(last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
            continue;
        };
        let mut bucket = *first;
        while bucket <= *last {
            dates.push(bucket);
            out_labels.push(label.map(str::to_string));
            match buckets.get(&bucket) {
                Some(sums) => {
                    for (i, s) in sums.iter().enumerate() {
                        out_values[i].push(Some(*s));
                    }
                }
                None => {
                    for values in out_values.iter_mut() {
                        values.push(Some(0.0));
                    }
                }
            }
            bucket = frequency.next(bucket);
        }
    }

    let mut out = Table::new(table.date_column(), dates);
    if let Some(name) = dimension.column() {
        out.set_column(name, Column::Categorical(out_labels))?;
    }
    for (name, values) in numeric_names.into_iter().zip(out_values) {
        out.set_column(name, Column::Numeric(values))?;
    }
    if let Some(name) = dimension.column() {
        out.move_to_front(name);
    }
    Ok(out)
}

/// Append the measure column computed from the aggregated sources.
///
/// Ratios with a zero denominator and proportions of a zero total are 0.
/// With [`Dimension::All`] a proportion is 1 on every row.
pub fn derive_measure(
    table: &Table,
    registry: &MeasureRegistry,
    measure: &str,
    dimension: &Dimension,
) -> Result<Table> {
    let spec = registry.get(measure)?;
    derive_measure_with(table, measure, spec, dimension)
}

pub(crate) fn derive_measure_with(
    table: &Table,
    measure: &str,
    spec: &MeasureSpec,
    dimension: &Dimension,
) -> Result<Table> {
    let source = |column: &str| -> Result<Vec<f64>> {
        table
            .numeric(column)
            .map(|cells| cells.iter().map(|c| c.unwrap_or(0.0)).collect())
            .map_err(|_| AnomalyError::MissingSourceColumn {
                measure: measure.to_string(),
                column: column.to_string(),
            })
    };

    let derived: Vec<f64> = match &spec.kind {
        MeasureKind::Ratio {
            numerator,
            denominator,
        } => {
            let num = source(numerator)?;
            let den = source(denominator)?;
            num.iter()
                .zip(den.iter())
                .map(|(&n, &d)| if d == 0.0 { 0.0 } else { n / d })
                .collect()
        }
        MeasureKind::Proportion { column } => {
            let values = source(column)?;
            if dimension.is_all() {
                vec![1.0; values.len()]
            } else {
                let mut totals: HashMap<NaiveDate, f64> = HashMap::new();
                for (date, v) in table.dates().iter().zip(values.iter()) {
                    *totals.entry(*date).or_insert(0.0) += v;
                }
                table
                    .dates()
                    .iter()
                    .zip(values.iter())
                    .map(|(date, v)| {
                        let total = totals.get(date).copied().unwrap_or(0.0);
                        if total == 0.0 {
                            0.0
                        } else {
                            v / total
                        }
                    })
                    .collect()
            }
        }
        MeasureKind::Volume { column } => source(column)?,
    };

    let mut out = table.clone();
    out.set_column(measure, Column::Numeric(derived.into_iter().map(Some).collect()))?;
    Ok(out)
}

/// Keep the rows dated within calendar year `year`.
pub fn filter_year(table: &Table, year: i32) -> Table {
    let mask: Vec<bool> = table.dates().iter().map(|d| d.year() == year).collect();
    table.filter(&mask)
}
