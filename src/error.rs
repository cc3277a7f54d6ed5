//! Error types for the weekly-anomaly engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AnomalyError>;

/// What kind of selection was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Measure,
    Dimension,
    Strategy,
}

impl std::fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionKind::Measure => write!(f, "measure"),
            SelectionKind::Dimension => write!(f, "dimension"),
            SelectionKind::Strategy => write!(f, "strategy"),
        }
    }
}

/// Errors that can occur while shaping data or detecting anomalies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnomalyError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A column's length differs from the table's row count.
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// A measure, dimension or strategy name that is not available.
    #[error("invalid {kind} selection: {name}")]
    InvalidSelection { kind: SelectionKind, name: String },

    /// Collapse was asked for a measure missing from the registry.
    #[error("unknown measure: {0}")]
    UnknownMeasure(String),

    /// A measure could not be derived because a source column is absent.
    #[error("cannot derive {measure}: missing source column {column}")]
    MissingSourceColumn { measure: String, column: String },

    /// A column referenced by a transform is absent from the table.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Two tables do not share the same set of columns.
    #[error("schema mismatch: expected columns {expected:?}, got {got:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// No candidate model could be fitted.
    #[error("model search did not converge: {0}")]
    NonConvergent(String),

    /// A series to be scored holds NaN or infinite values.
    #[error("series contains {count} non-finite values")]
    NonFiniteData { count: usize },

    /// The per-category deadline elapsed before any model was fitted.
    #[error("deadline exceeded after {elapsed_ms} ms")]
    DeadlineExceeded { elapsed_ms: u128 },

    /// Invalid external configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AnomalyError {
    /// Whether the error is local to one category and may be skipped by a
    /// detection run instead of aborting it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnomalyError::EmptyData
                | AnomalyError::InsufficientData { .. }
                | AnomalyError::NonFiniteData { .. }
                | AnomalyError::NonConvergent(_)
                | AnomalyError::DeadlineExceeded { .. }
        )
    }
}

impl From<serde_json::Error> for AnomalyError {
    fn from(err: serde_json::Error) -> Self {
        AnomalyError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = AnomalyError::EmptyData;
        assert_eq!(err.to_string(), "empty input data");

        let err = AnomalyError::InsufficientData { needed: 24, got: 5 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 24, got 5"
        );

        let err = AnomalyError::InvalidSelection {
            kind: SelectionKind::Dimension,
            name: "COLOUR".to_string(),
        };
        assert_eq!(err.to_string(), "invalid dimension selection: COLOUR");

        let err = AnomalyError::MissingSourceColumn {
            measure: "CONVERSION_RATE".to_string(),
            column: "SALES_COUNT".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot derive CONVERSION_RATE: missing source column SALES_COUNT"
        );
    }

    #[test]
    fn only_per_category_errors_are_recoverable() {
        assert!(AnomalyError::InsufficientData { needed: 2, got: 1 }.is_recoverable());
        assert!(AnomalyError::NonConvergent("x".into()).is_recoverable());
        assert!(AnomalyError::DeadlineExceeded { elapsed_ms: 5 }.is_recoverable());
        assert!(AnomalyError::NonFiniteData { count: 1 }.is_recoverable());
        assert!(!AnomalyError::InvalidParameter("period".into()).is_recoverable());
        assert!(!AnomalyError::UnknownMeasure("X".into()).is_recoverable());
        assert!(!AnomalyError::InvalidSelection {
            kind: SelectionKind::Measure,
            name: "X".into()
        }
        .is_recoverable());
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = AnomalyError::UnknownMeasure("PROFIT".into());
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
