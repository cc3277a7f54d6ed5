//! Data-shaping transforms.
//!
//! This module provides:
//! - Row-level stage functions (fill, collapse, filter, resample, derive)
//! - Pipelines composing them into the preparation sequence used before
//!   detection

pub mod pipeline;
pub mod stage;

pub use pipeline::{
    build_category_pipeline, build_dimension_pipeline, build_year_pipeline, Pipeline, Step,
    UNKNOWN_CATEGORY,
};
pub use stage::{
    collapse, derive_measure, fill_missing, filter_category, filter_category_with, filter_year,
    resample, MatchMode,
};
