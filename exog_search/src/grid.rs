//! Hyperparameter grid over the seasonal model's ARMA orders

use crate::error::TaskFailure;
use crate::scheduler::{EvaluationOutcome, EvaluationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// AR, MA, seasonal AR and seasonal MA orders.
///
/// Difference orders and the seasonal period are fixed by the search
/// configuration and are not part of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HyperparamConfig {
    pub ar: usize,
    pub ma: usize,
    pub seasonal_ar: usize,
    pub seasonal_ma: usize,
}

impl HyperparamConfig {
    pub fn new(ar: usize, ma: usize, seasonal_ar: usize, seasonal_ma: usize) -> Self {
        Self {
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
        }
    }
}

impl Default for HyperparamConfig {
    fn default() -> Self {
        Self::new(4, 3, 3, 4)
    }
}

impl fmt::Display for HyperparamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.ar, self.ma, self.seasonal_ar, self.seasonal_ma
        )
    }
}

/// Largest accepted `grid_range`
pub const MAX_GRID_RANGE: usize = 10;

/// All configurations with each order in `0..range`.
///
/// AR varies slowest and seasonal MA fastest.
pub fn enumerate_grid(range: usize) -> Vec<HyperparamConfig> {
    let mut grid = Vec::with_capacity(range.min(MAX_GRID_RANGE).pow(4));
    for ar in 0..range {
        for ma in 0..range {
            for seasonal_ar in 0..range {
                for seasonal_ma in 0..range {
                    grid.push(HyperparamConfig::new(ar, ma, seasonal_ar, seasonal_ma));
                }
            }
        }
    }
    grid
}

/// Score of one grid point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridScore {
    pub config: HyperparamConfig,
    pub mae: f64,
}

/// Outcome of a grid search for one location
#[derive(Debug, Clone, Default, Serialize)]
pub struct GridSearchOutcome {
    /// Winning configuration, if any point completed below the reference
    pub best: Option<GridScore>,
    /// Completed points in enumeration order
    pub scores: Vec<GridScore>,
    /// Points whose evaluation failed, in enumeration order
    pub failures: Vec<(HyperparamConfig, TaskFailure)>,
}

impl GridSearchOutcome {
    /// Collect scheduler results, whatever order they completed in.
    ///
    /// The winner has the strictly smallest MAE below `reference`; among
    /// equal scores the earliest enumerated configuration is kept.
    pub fn from_results(results: &[EvaluationResult], reference: Option<f64>) -> Self {
        let mut ordered: Vec<&EvaluationResult> = results.iter().collect();
        ordered.sort_by_key(|r| r.identity().id);

        let mut outcome = GridSearchOutcome::default();
        let mut best_mae = reference.unwrap_or(f64::INFINITY);
        for result in ordered {
            let config = result.identity().config;
            match result.outcome() {
                EvaluationOutcome::Completed { mae } => {
                    if *mae < best_mae {
                        best_mae = *mae;
                        outcome.best = Some(GridScore { config, mae: *mae });
                    }
                    outcome.scores.push(GridScore { config, mae: *mae });
                }
                EvaluationOutcome::Failed(failure) => {
                    outcome.failures.push((config, failure.clone()));
                }
            }
        }
        outcome
    }

    pub fn best_config(&self) -> Option<HyperparamConfig> {
        self.best.as_ref().map(|s| s.config)
    }
}
