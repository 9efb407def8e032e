//! Error types for the exog_search crate

use sarimax_math::MathError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Custom error types for the exog_search crate
#[derive(Debug, Error)]
pub enum SearchError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Exogenous and target timestamps do not line up
    #[error("Data alignment error: {0}")]
    DataAlignment(String),

    /// A model fit did not converge for some training window
    #[error("Convergence error: {0}")]
    Convergence(String),

    /// Error from the model estimator that is neither alignment nor convergence
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A location is not present in the input tables
    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    /// A location search was driven out of order
    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    /// The worker pool could not be started
    #[error("Worker pool error: {0}")]
    PoolStartup(String),

    /// Logging could not be initialised
    #[error("Logging error: {0}")]
    Logging(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV reading or writing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON reading or writing
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, SearchError>;

impl From<MathError> for SearchError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::Convergence(msg) => SearchError::Convergence(msg),
            MathError::DimensionMismatch { .. } => SearchError::DataAlignment(err.to_string()),
            other => SearchError::ModelError(other.to_string()),
        }
    }
}

/// Category of a task-local failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Convergence,
    DataAlignment,
    WorkerCrash,
    Cancelled,
    InvalidInput,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::Convergence => "convergence",
            FailureKind::DataAlignment => "data alignment",
            FailureKind::WorkerCrash => "worker crash",
            FailureKind::Cancelled => "cancelled",
            FailureKind::InvalidInput => "invalid input",
        };
        f.write_str(label)
    }
}

/// Why a single evaluation task produced no error score.
///
/// Unlike [`SearchError`] this is a plain value: it travels from the worker
/// back to the orchestrator and ends up in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "task discarded before it started")
    }

    pub fn worker_crash(message: impl Into<String>) -> Self {
        Self::new(FailureKind::WorkerCrash, message)
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&SearchError> for TaskFailure {
    fn from(err: &SearchError) -> Self {
        let kind = match err {
            SearchError::Convergence(_) => FailureKind::Convergence,
            SearchError::DataAlignment(_) => FailureKind::DataAlignment,
            _ => FailureKind::InvalidInput,
        };
        TaskFailure::new(kind, err.to_string())
    }
}
