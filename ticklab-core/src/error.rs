//! Error taxonomy.
//!
//! `ConfigError` (in `config`) and `ConsistencyError` abort a run before any
//! day is processed. `DataError` and `NumericalError` are local to one
//! evaluation day: the walk-forward driver records them as a failed
//! diagnostics row and moves on.

use chrono::NaiveDate;
use thiserror::Error;

/// Missing or unusable data for a single evaluation day.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("training window is empty")]
    EmptyTrainingWindow,

    #[error("no complete rows left after dropping missing values in {columns:?}")]
    NoCompleteRows { columns: Vec<String> },

    #[error("{observations} observations cannot identify {features} coefficients")]
    InsufficientObservations { observations: usize, features: usize },

    #[error("feature '{column}' has no values on the evaluation day")]
    MissingEvaluationFeature { column: String },

    #[error("no finite correlation between any variant of '{feature}' and '{target}'")]
    NoFiniteCorrelation { feature: String, target: String },

    #[error("column '{0}' not found")]
    MissingColumn(String),
}

/// Numerical failure while fitting or preprocessing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    #[error("design matrix is singular (pivot {pivot:e} at column {column})")]
    SingularMatrix { column: usize, pivot: f64 },

    #[error("cannot winsorize: every present value is infinite, no quantile bounds")]
    DegenerateWinsorization,
}

/// A per-day fitting failure. Never crosses the walk-forward driver boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Numerical(#[from] NumericalError),
}

impl FitError {
    /// Short class label recorded in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FitError::Data(_) => "data",
            FitError::Numerical(_) => "numerical",
        }
    }
}

/// Structural problems with the input that make the whole run meaningless.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyError {
    #[error("dates out of order at row {row}: {previous} followed by {current}")]
    DatesOutOfOrder {
        row: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("seconds out of order on {date} at row {row}: {previous} followed by {current}")]
    SecondsOutOfOrder {
        row: usize,
        date: NaiveDate,
        previous: u32,
        current: u32,
    },

    #[error("column '{column}' has {actual} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
}
