//! # Sarimax Math
//!
//! Numerical building blocks for seasonal ARIMA models with exogenous
//! regressors. This crate provides the model estimator used by the search
//! crate together with the small pieces of numerics it is built from.

use thiserror::Error;

pub mod least_squares;
pub mod optimization;
pub mod polynomial;
pub mod sarimax;

pub use sarimax::{ModelOrder, SeasonalArimax, SeasonalArimaxFit};

/// Errors that can occur while estimating or evaluating a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: need {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Model did not converge: {0}")]
    Convergence(String),
}

/// Result type for model math operations
pub type Result<T> = std::result::Result<T, MathError>;
