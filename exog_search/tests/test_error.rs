use exog_search::error::{FailureKind, SearchError, TaskFailure};
use sarimax_math::MathError;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    assert!(matches!(SearchError::from(io_error), SearchError::IoError(_)));

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(SearchError::from(json_error), SearchError::JsonError(_)));
}

#[test]
fn test_math_error_mapping() {
    let converge = SearchError::from(MathError::Convergence("simplex".to_string()));
    assert!(matches!(converge, SearchError::Convergence(_)));

    let mismatch = SearchError::from(MathError::DimensionMismatch {
        expected: 3,
        got: 2,
    });
    assert!(matches!(mismatch, SearchError::DataAlignment(_)));

    let short = SearchError::from(MathError::InsufficientData { needed: 10, got: 4 });
    assert!(matches!(short, SearchError::ModelError(_)));
}

#[test]
fn test_task_failure_kinds() {
    let failure = TaskFailure::from(&SearchError::Convergence("diverged".to_string()));
    assert_eq!(failure.kind, FailureKind::Convergence);
    assert!(failure.message.contains("diverged"));

    let failure = TaskFailure::from(&SearchError::DataAlignment("gap".to_string()));
    assert_eq!(failure.kind, FailureKind::DataAlignment);

    let failure = TaskFailure::from(&SearchError::InvalidParameter("lag".to_string()));
    assert_eq!(failure.kind, FailureKind::InvalidInput);

    assert_eq!(TaskFailure::cancelled().kind, FailureKind::Cancelled);
}

#[test]
fn test_error_display() {
    let error = SearchError::UnknownLocation("Galle".to_string());
    assert_eq!(error.to_string(), "Unknown location: Galle");

    let failure = TaskFailure::worker_crash("worker panicked: boom");
    assert_eq!(failure.to_string(), "worker crash: worker panicked: boom");
}
