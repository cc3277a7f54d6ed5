//! The anomaly model: owns the data and runs detection over categories.

use std::collections::BTreeSet;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::{resolve_dimension, Dimension, MeasureRegistry, Selection, Table};
use crate::detection::arima::arima_anomalies;
use crate::detection::config::{validate_sig_level, DetectionConfig, Strategy};
use crate::detection::result::{AnomalyRow, AnomalyTable, CategoryFailure, ScoredPoint};
use crate::detection::stl::stl_anomalies;
use crate::error::{AnomalyError, Result, SelectionKind};
use crate::seasonality::STL;
use crate::transform::{
    build_category_pipeline, build_dimension_pipeline, build_year_pipeline, fill_missing,
    filter_category, UNKNOWN_CATEGORY,
};

/// Measure selected when none is given.
pub const DEFAULT_MEASURE: &str = "CONVERSION_RATE";

/// Anomaly detection over one table.
///
/// The main table is never altered by a pipeline or detection run; those
/// work on the working table, which is reset to a copy of the main table at
/// the start and end of every run.
///
/// # Example
/// ```
/// use chrono::{Duration, NaiveDate};
/// use weekly_anomaly::core::{MeasureRegistry, Table};
/// use weekly_anomaly::detection::{AnomalyModel, Strategy};
///
/// let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
/// let dates: Vec<NaiveDate> = (0..120).map(|i| start + Duration::weeks(i)).collect();
/// let table = Table::new("QUOTE_DATE", dates)
///     .with_labels("REGION", vec!["North"; 120])
///     .unwrap()
///     .with_values("QUOTE_COUNT", (0..120).map(|i| 200.0 + (i % 12) as f64))
///     .unwrap()
///     .with_values("SALES_COUNT", vec![20.0; 120])
///     .unwrap();
///
/// let mut model =
///     AnomalyModel::new(table, MeasureRegistry::default(), Some("QUOTE_VOLUME"), None).unwrap();
/// let anomalies = model.detect(Strategy::Stl).unwrap();
/// assert_eq!(anomalies.len(), 120);
/// ```
#[derive(Debug, Clone)]
pub struct AnomalyModel {
    main: Table,
    working: Table,
    registry: MeasureRegistry,
    selection: Selection,
    config: DetectionConfig,
    anomalies: AnomalyTable,
}

impl AnomalyModel {
    /// Load `table` as the main table, filling missing cells with 0.
    ///
    /// `measure` defaults to [`DEFAULT_MEASURE`]; `dimension` defaults to
    /// the first categorical column, or `ALL` when there is none.
    pub fn new(
        table: Table,
        registry: MeasureRegistry,
        measure: Option<&str>,
        dimension: Option<&str>,
    ) -> Result<Self> {
        let main = fill_missing(&table, 0.0);
        let dimension = match dimension {
            Some(d) => d.to_string(),
            None => main
                .dimensions()
                .into_iter()
                .next()
                .unwrap_or_else(|| Dimension::ALL.to_string()),
        };
        let selection = Selection::new(
            &registry,
            &main,
            measure.unwrap_or(DEFAULT_MEASURE),
            &dimension,
        )?;
        debug!(
            rows = main.len(),
            measure = selection.measure(),
            dimension = %selection.dimension(),
            "anomaly model loaded"
        );
        Ok(Self {
            working: main.clone(),
            main,
            registry,
            selection,
            config: DetectionConfig::default(),
            anomalies: AnomalyTable::default(),
        })
    }

    /// Replace the detection configuration.
    pub fn with_config(mut self, config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn registry(&self) -> &MeasureRegistry {
        &self.registry
    }

    pub fn main_table(&self) -> &Table {
        &self.main
    }

    pub fn working_table(&self) -> &Table {
        &self.working
    }

    /// Result of the latest detection run; empty before the first run.
    pub fn anomalies(&self) -> &AnomalyTable {
        &self.anomalies
    }

    pub fn measure(&self) -> &str {
        self.selection.measure()
    }

    pub fn dimension(&self) -> &Dimension {
        self.selection.dimension()
    }

    /// Select another measure. The stored anomalies are left as they are.
    pub fn set_measure(&mut self, measure: &str) -> Result<()> {
        self.selection.set_measure(&self.registry, measure)
    }

    /// Select another dimension, or `ALL`. The stored anomalies are left as
    /// they are.
    pub fn set_dimension(&mut self, dimension: &str) -> Result<()> {
        self.selection.set_dimension(&self.main, dimension)
    }

    /// Categorical columns of the main table.
    pub fn dimensions(&self) -> Vec<String> {
        self.main.dimensions()
    }

    /// Sorted categories of the selected dimension; `["ALL"]` for `ALL`.
    pub fn categories(&self) -> Result<Vec<String>> {
        self.main.categories(self.dimension())
    }

    /// Mutable access to the working table, e.g. for ad hoc transforms
    /// between runs.
    pub fn working_table_mut(&mut self) -> &mut Table {
        &mut self.working
    }

    /// Working table ← copy of the main table.
    pub fn reset_working(&mut self) {
        self.working = self.main.clone();
    }

    /// Append the rows of `table` to the main table.
    ///
    /// The columns must match the main table's columns by name, in any
    /// order. On mismatch `SchemaMismatch` is returned and the main table is
    /// unchanged.
    pub fn append(&mut self, table: &Table, sort_after: bool) -> Result<()> {
        self.main.concat(&fill_missing(table, 0.0))?;
        if sort_after {
            self.main.sort_by_date();
        }
        debug!(rows = self.main.len(), "rows appended to main table");
        Ok(())
    }

    /// Categories of the selected dimension too sparse to analyse.
    ///
    /// Counted on the raw rows of the main table, so the answer does not
    /// depend on what the working table currently holds: categories with
    /// fewer rows than the configured floor, plus every category containing
    /// `Unknown`. Empty for `ALL`.
    pub fn bad_categories(&self) -> Result<Vec<String>> {
        self.bad_categories_in(&self.main)
    }

    /// Bad categories with row counts taken from `rows`.
    fn bad_categories_in(&self, rows: &Table) -> Result<Vec<String>> {
        let dimension = self.dimension();
        if dimension.is_all() {
            return Ok(Vec::new());
        }
        let floor = self.config.bad_category_floor;
        let mut bad: BTreeSet<String> = rows
            .value_counts(dimension)?
            .into_iter()
            .filter(|(_, count)| *count < floor)
            .map(|(category, _)| category)
            .collect();
        bad.extend(
            self.main
                .categories(dimension)?
                .into_iter()
                .filter(|c| c.contains(UNKNOWN_CATEGORY)),
        );
        Ok(bad.into_iter().collect())
    }

    /// Run the dimension pipeline over a fresh copy of the main table and
    /// keep the result as the working table, optionally restricted to one
    /// calendar year.
    pub fn run_dimension_pipeline(&mut self, year: Option<i32>) -> Result<&Table> {
        self.reset_working();
        let piped = self.dimension_pipeline_output()?;
        self.working = match year {
            Some(year) => build_year_pipeline(year).fit_transform(&piped)?,
            None => piped,
        };
        Ok(&self.working)
    }

    /// [`detect_anomalies`](Self::detect_anomalies) at the configured
    /// significance level with no pre-filter.
    pub fn detect(&mut self, strategy: Strategy) -> Result<&AnomalyTable> {
        let sig_level = self.config.sig_level;
        self.detect_anomalies(strategy, sig_level, None, &[])
    }

    /// Detect anomalies in every category of the selected dimension.
    ///
    /// With `filter_dimension` set, only rows whose label in that dimension
    /// contains one of `filter_categories` are used. A category whose
    /// detector fails with a recoverable error is recorded in
    /// [`AnomalyTable::failures`] and skipped; any other error aborts the
    /// run and leaves the previous anomalies in place.
    pub fn detect_anomalies(
        &mut self,
        strategy: Strategy,
        sig_level: f64,
        filter_dimension: Option<&str>,
        filter_categories: &[String],
    ) -> Result<&AnomalyTable> {
        validate_sig_level(sig_level)?;
        self.config.validate()?;

        self.reset_working();
        let outcome = self.run_detection(strategy, sig_level, filter_dimension, filter_categories);
        self.reset_working();

        self.anomalies = outcome?;
        Ok(&self.anomalies)
    }

    fn run_detection(
        &mut self,
        strategy: Strategy,
        sig_level: f64,
        filter_dimension: Option<&str>,
        filter_categories: &[String],
    ) -> Result<AnomalyTable> {
        if let Some(name) = filter_dimension {
            let filter = self.filter_dimension(name)?;
            self.working = filter_category(&self.working, &filter, filter_categories, false)?;
        }

        let piped = self.dimension_pipeline_output()?;
        self.working = piped;
        let dimension = self.dimension().clone();
        let categories = self.working.categories(&dimension)?;

        let started = Instant::now();
        info!(
            strategy = %strategy,
            measure = self.measure(),
            dimension = %dimension,
            categories = categories.len(),
            parallel = self.config.parallel,
            "detecting anomalies"
        );

        let outcomes: Vec<(String, Result<Vec<ScoredPoint>>)> = if self.config.parallel {
            categories
                .par_iter()
                .map(|c| (c.clone(), self.detect_category(c, strategy, sig_level)))
                .collect()
        } else {
            categories
                .iter()
                .map(|c| (c.clone(), self.detect_category(c, strategy, sig_level)))
                .collect()
        };

        let mut rows = Vec::new();
        let mut failures = Vec::new();
        for (category, outcome) in outcomes {
            match outcome {
                Ok(points) => {
                    rows.extend(points.into_iter().map(|p| AnomalyRow::from_point(&category, p)))
                }
                Err(error) if error.is_recoverable() => {
                    warn!(category = %category, error = %error, "category skipped");
                    failures.push(CategoryFailure { category, error });
                }
                Err(error) => return Err(error),
            }
        }

        let table = AnomalyTable::new(
            strategy,
            self.measure(),
            dimension,
            sig_level,
            rows,
            failures,
        );
        info!(
            elapsed_ms = started.elapsed().as_millis(),
            rows = table.len(),
            flagged = table.flagged().len(),
            failed = table.failures().len(),
            "anomaly detection finished"
        );
        Ok(table)
    }

    /// Extract one category from the piped working table and score it.
    fn detect_category(
        &self,
        category: &str,
        strategy: Strategy,
        sig_level: f64,
    ) -> Result<Vec<ScoredPoint>> {
        let dimension = self.dimension();
        let series = build_category_pipeline(dimension, &[category.to_string()])
            .fit_transform(&self.working)?;
        if series.is_empty() {
            return Err(AnomalyError::EmptyData);
        }
        let measure = self.measure();
        let points = match strategy {
            Strategy::Stl => {
                let mut stl = STL::new(self.config.stl_period);
                if self.config.stl_robust {
                    stl = stl.robust();
                }
                stl_anomalies(&series, measure, &stl, sig_level)?
            }
            Strategy::Arima => arima_anomalies(
                &series,
                measure,
                self.config.arima_steps,
                sig_level,
                &self.config.arima_search,
            )?,
        };
        debug!(
            category,
            points = points.len(),
            flagged = points.iter().filter(|p| p.anomaly).count(),
            "category scored"
        );
        Ok(points)
    }

    /// Pipe the working table, which must still hold raw rows.
    fn dimension_pipeline_output(&self) -> Result<Table> {
        let bad = self.bad_categories_in(&self.working)?;
        if !bad.is_empty() {
            debug!(?bad, "excluding bad categories");
        }
        build_dimension_pipeline(
            &self.registry,
            self.measure(),
            self.dimension(),
            &bad,
            self.config.frequency,
        )?
        .fit_transform(&self.working)
    }

    fn filter_dimension(&self, name: &str) -> Result<Dimension> {
        let invalid = || AnomalyError::InvalidSelection {
            kind: SelectionKind::Dimension,
            name: name.to_string(),
        };
        match resolve_dimension(&self.main, name)? {
            Dimension::All => Err(invalid()),
            column => Ok(column),
        }
    }
}
