//! Ordered transform pipelines.
//!
//! The dimension pipeline is the canonical preparation before detection:
//!
//! fill-missing → collapse → remove unknown/bad categories → resample →
//! derive measure.
//!
//! Ratio and proportion measures must be computed on the weekly totals, so
//! deriving comes last and resampling comes after collapsing.

use crate::core::{Dimension, Frequency, MeasureRegistry, MeasureSpec, Table};
use crate::error::Result;
use crate::transform::stage::{
    collapse_with, derive_measure_with, fill_missing, filter_category_with, filter_year, resample,
    MatchMode,
};
use tracing::debug;

/// Placeholder text marking categories that must never be analysed.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// A single transform in a [`Pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    FillMissing(f64),
    Collapse {
        measure: String,
        spec: MeasureSpec,
        dimension: Dimension,
    },
    FilterCategory {
        dimension: Dimension,
        categories: Vec<String>,
        exclude: bool,
        mode: MatchMode,
    },
    Resample {
        dimension: Dimension,
        frequency: Frequency,
    },
    DeriveMeasure {
        measure: String,
        spec: MeasureSpec,
        dimension: Dimension,
    },
    FilterYear(i32),
}

impl Step {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Step::FillMissing(_) => "fill_missing",
            Step::Collapse { .. } => "collapse",
            Step::FilterCategory { exclude: true, .. } => "remove_categories",
            Step::FilterCategory { exclude: false, .. } => "filter_categories",
            Step::Resample { .. } => "resample",
            Step::DeriveMeasure { .. } => "derive_measure",
            Step::FilterYear(_) => "filter_year",
        }
    }

    /// Apply the step to a table.
    pub fn apply(&self, table: &Table) -> Result<Table> {
        match self {
            Step::FillMissing(value) => Ok(fill_missing(table, *value)),
            Step::Collapse {
                measure,
                spec,
                dimension,
            } => collapse_with(table, measure, spec, dimension),
            Step::FilterCategory {
                dimension,
                categories,
                exclude,
                mode,
            } => filter_category_with(table, dimension, categories, *exclude, *mode),
            Step::Resample {
                dimension,
                frequency,
            } => resample(table, dimension, *frequency),
            Step::DeriveMeasure {
                measure,
                spec,
                dimension,
            } => derive_measure_with(table, measure, spec, dimension),
            Step::FilterYear(year) => Ok(filter_year(table, *year)),
        }
    }
}

/// An ordered sequence of [`Step`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// The steps, in application order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order, returning the final table.
    pub fn fit_transform(&self, table: &Table) -> Result<Table> {
        let mut current = table.clone();
        for step in &self.steps {
            current = step.apply(&current)?;
            debug!(step = step.name(), rows = current.len(), "pipeline step");
        }
        Ok(current)
    }
}

/// Build the preparation pipeline for a measure and dimension.
///
/// Fails fast with `UnknownMeasure` if `measure` is not registered. The
/// category-removal steps are omitted for [`Dimension::All`].
pub fn build_dimension_pipeline(
    registry: &MeasureRegistry,
    measure: &str,
    dimension: &Dimension,
    bad_categories: &[String],
    frequency: Frequency,
) -> Result<Pipeline> {
    let spec = registry.get(measure)?.clone();

    let mut pipeline = Pipeline::new()
        .then(Step::FillMissing(0.0))
        .then(Step::Collapse {
            measure: measure.to_string(),
            spec: spec.clone(),
            dimension: dimension.clone(),
        });

    if !dimension.is_all() {
        pipeline = pipeline.then(Step::FilterCategory {
            dimension: dimension.clone(),
            categories: vec![UNKNOWN_CATEGORY.to_string()],
            exclude: true,
            mode: MatchMode::Substring,
        });
        if !bad_categories.is_empty() {
            pipeline = pipeline.then(Step::FilterCategory {
                dimension: dimension.clone(),
                categories: bad_categories.to_vec(),
                exclude: true,
                mode: MatchMode::Exact,
            });
        }
    }

    Ok(pipeline
        .then(Step::Resample {
            dimension: dimension.clone(),
            frequency,
        })
        .then(Step::DeriveMeasure {
            measure: measure.to_string(),
            spec,
            dimension: dimension.clone(),
        }))
}

/// Build the single-step pipeline that extracts the rows of `categories`
/// from an already dimension-piped table.
pub fn build_category_pipeline(dimension: &Dimension, categories: &[String]) -> Pipeline {
    Pipeline::new().then(Step::FilterCategory {
        dimension: dimension.clone(),
        categories: categories.to_vec(),
        exclude: false,
        mode: MatchMode::Exact,
    })
}

/// Build a pipeline keeping only the rows of calendar year `year`.
pub fn build_year_pipeline(year: i32) -> Pipeline {
    Pipeline::new().then(Step::FilterYear(year))
}
