//! # Exog Search
//!
//! Finds out whether rainfall at nearby locations improves a seasonal
//! forecasting model for a target location, and which model orders work best.
//!
//! ## Features
//!
//! - Expanding-window one-step-ahead evaluation scored by mean absolute error
//! - Enumeration of exogenous predictor subsets for every target location
//! - Hyperparameter grid search over AR, MA, seasonal AR and seasonal MA orders
//! - A fixed-size worker pool that evaluates candidates in parallel and reports
//!   every task back, failures included
//! - Per-location aggregation that keeps only configurations beating the
//!   baseline, persisted as JSON or CSV
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exog_search::data::{CandidateSet, DataLoader};
//! use exog_search::models::SarimaxModel;
//! use exog_search::orchestrator::SearchPipeline;
//! use exog_search::results::{OutputFormat, ResultStore};
//! use exog_search::SearchConfig;
//! use std::sync::Arc;
//!
//! # fn main() -> exog_search::Result<()> {
//! let table = DataLoader::from_csv("rainfall.csv")?;
//! let candidates = CandidateSet::from_json_file("candidates.json")?;
//!
//! let pipeline = SearchPipeline::new(Arc::new(SarimaxModel::new()), SearchConfig::default())?;
//! let report = pipeline.run(&table, &candidates)?;
//!
//! ResultStore::new(OutputFormat::Csv).write_to_path(&report, "improvements.csv")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod grid;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod results;
pub mod scheduler;
pub mod subsets;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{ExogAlignment, SearchConfig};
pub use crate::data::{CandidateSet, DataLoader, ExogBlock, RainfallTable, TimeSeries};
pub use crate::error::{FailureKind, Result, SearchError, TaskFailure};
pub use crate::evaluator::{WalkForwardEvaluator, WalkForwardScore};
pub use crate::grid::{enumerate_grid, GridSearchOutcome, HyperparamConfig};
pub use crate::models::{FittedModel, ForecastModel, SarimaxModel};
pub use crate::orchestrator::{LocationOrchestrator, LocationSearch, LocationState, SearchPipeline};
pub use crate::results::{
    CandidateKey, LocationReport, OutputFormat, ResultRecord, ResultStore, ResultTable,
    SearchReport,
};
pub use crate::scheduler::{
    BatchOutcome, CancellationToken, EvaluationOutcome, EvaluationResult, EvaluationTask,
    ResultSink, SearchScheduler, TaskIdentity, TaskInputs,
};
pub use crate::subsets::{enumerate_subsets, PredictorSubset};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
