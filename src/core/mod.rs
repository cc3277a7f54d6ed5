//! Core data structures: tables, the measure registry and selections.

mod measure;
mod selection;
mod table;

pub use measure::{Aggregation, MeasureKind, MeasureRegistry, MeasureSpec};
pub(crate) use selection::resolve_dimension;
pub use selection::{Dimension, Frequency, Selection};
pub use table::{Column, Table, DEFAULT_DATE_COLUMN};
