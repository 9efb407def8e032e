//! Search configuration

use crate::error::{Result, SearchError};
use crate::grid::{HyperparamConfig, MAX_GRID_RANGE};
use sarimax_math::ModelOrder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// How exogenous values line up with the target month being forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "lag", rename_all = "snake_case")]
pub enum ExogAlignment {
    /// The regressor for month `t` is the exogenous value observed at `t`
    #[default]
    Concurrent,
    /// The regressor for month `t` is the exogenous value observed at `t - k`
    Lagged(usize),
}

/// Everything a search run needs besides the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Trailing share of each series held out for testing
    pub holdout_fraction: f64,
    /// Trailing share of the training prefix used to score grid points
    pub validation_fraction: f64,
    /// Each grid order ranges over `0..grid_range`
    pub grid_range: usize,
    pub seasonal_period: usize,
    pub difference: usize,
    pub seasonal_difference: usize,
    /// Worker threads; `None` uses the available parallelism
    pub workers: Option<usize>,
    /// Significance level; accepted for compatibility, the search never reads it
    pub alpha: f64,
    pub exog_alignment: ExogAlignment,
    /// Orders used for the subset search when the grid search is off
    pub fixed_config: HyperparamConfig,
    pub run_grid_search: bool,
    /// Restrict the run to these target locations
    pub locations: Option<Vec<String>>,
    /// Fail fits whose optimiser ran out of iterations
    pub strict_convergence: bool,
    /// Cancel outstanding tasks of a batch after this many seconds
    pub deadline_secs: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.2,
            validation_fraction: 0.2,
            grid_range: 5,
            seasonal_period: 12,
            difference: 0,
            seasonal_difference: 0,
            workers: None,
            alpha: 0.05,
            exog_alignment: ExogAlignment::Concurrent,
            fixed_config: HyperparamConfig::default(),
            run_grid_search: false,
            locations: None,
            strict_convergence: false,
            deadline_secs: None,
        }
    }
}

impl SearchConfig {
    /// Load a configuration from a JSON file; absent fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: SearchConfig = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("holdout_fraction", self.holdout_fraction),
            ("validation_fraction", self.validation_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(SearchError::InvalidParameter(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SearchError::InvalidParameter(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.run_grid_search && self.grid_range == 0 {
            return Err(SearchError::InvalidParameter(
                "grid_range must be positive when the grid search is enabled".to_string(),
            ));
        }
        if self.grid_range > MAX_GRID_RANGE {
            return Err(SearchError::InvalidParameter(format!(
                "grid_range must be at most {}, got {}",
                MAX_GRID_RANGE, self.grid_range
            )));
        }
        if self.seasonal_period < 2 {
            return Err(SearchError::InvalidParameter(format!(
                "seasonal_period must be at least 2, got {}",
                self.seasonal_period
            )));
        }
        if self.workers == Some(0) {
            return Err(SearchError::InvalidParameter(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.deadline_secs == Some(0) {
            return Err(SearchError::InvalidParameter(
                "deadline_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured worker count, or the machine's available parallelism
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Full model order for a grid point under this configuration
    pub fn order_for(&self, config: &HyperparamConfig) -> ModelOrder {
        ModelOrder::new(config.ar, self.difference, config.ma).with_seasonal(
            config.seasonal_ar,
            self.seasonal_difference,
            config.seasonal_ma,
            self.seasonal_period,
        )
    }
}
