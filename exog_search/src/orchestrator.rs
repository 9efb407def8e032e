//! Per-location search: baseline, subset fan-out and result aggregation

use crate::config::SearchConfig;
use crate::data::{CandidateSet, ExogBlock, RainfallTable, TimeSeries};
use crate::error::{FailureKind, Result, SearchError, TaskFailure};
use crate::grid::{enumerate_grid, GridSearchOutcome, HyperparamConfig};
use crate::models::ForecastModel;
use crate::results::{FailedCandidate, LocationReport, ResultTable, SearchReport, SkippedLocation};
use crate::scheduler::{
    CancellationToken, EvaluationOutcome, EvaluationResult, EvaluationTask, ResultSink,
    SearchScheduler, TaskIdentity, TaskInputs,
};
use crate::subsets::{enumerate_subsets, PredictorSubset, MAX_CANDIDATES};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle of one location's search
#[derive(Debug, Clone)]
pub enum LocationState {
    Idle,
    BaselineComputed {
        baseline_mae: f64,
    },
    SearchDispatched {
        table: ResultTable,
        pending: usize,
    },
    SearchComplete(LocationReport),
}

impl LocationState {
    pub fn name(&self) -> &'static str {
        match self {
            LocationState::Idle => "idle",
            LocationState::BaselineComputed { .. } => "baseline_computed",
            LocationState::SearchDispatched { .. } => "search_dispatched",
            LocationState::SearchComplete(_) => "search_complete",
        }
    }
}

/// Aggregates the results of one location on the orchestrator's thread
#[derive(Debug)]
pub struct LocationSearch {
    location: String,
    config: HyperparamConfig,
    state: LocationState,
    non_improving: usize,
    failures: Vec<FailedCandidate>,
    cancelled: bool,
    grid: Option<GridSearchOutcome>,
}

impl LocationSearch {
    pub fn new(location: impl Into<String>, config: HyperparamConfig) -> Self {
        Self {
            location: location.into(),
            config,
            state: LocationState::Idle,
            non_improving: 0,
            failures: Vec::new(),
            cancelled: false,
            grid: None,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn state(&self) -> &LocationState {
        &self.state
    }

    pub fn set_grid(&mut self, outcome: GridSearchOutcome) {
        self.grid = Some(outcome);
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn record_baseline(&mut self, baseline_mae: f64) -> Result<()> {
        match self.state {
            LocationState::Idle => {
                info!(location = %self.location, baseline_mae, "baseline computed");
                self.state = LocationState::BaselineComputed { baseline_mae };
                Ok(())
            }
            _ => Err(self.invalid("record a baseline")),
        }
    }

    /// Expect `pending` results, one per dispatched candidate
    pub fn dispatch(&mut self, pending: usize) -> Result<()> {
        match self.state {
            LocationState::BaselineComputed { baseline_mae } => {
                info!(location = %self.location, candidates = pending, "search dispatched");
                self.state = LocationState::SearchDispatched {
                    table: ResultTable::new(self.location.clone(), baseline_mae),
                    pending,
                };
                Ok(())
            }
            _ => Err(self.invalid("dispatch")),
        }
    }

    /// Record one result; improvements go into the table
    pub fn accept(&mut self, result: &EvaluationResult) -> Result<()> {
        let LocationState::SearchDispatched { table, pending } = &mut self.state else {
            return Err(self.invalid("accept a result"));
        };
        if *pending == 0 {
            return Err(SearchError::InvalidState(format!(
                "location '{}' received more results than it dispatched",
                self.location
            )));
        }
        let Some(key) = result.identity().subset.clone() else {
            return Err(SearchError::InvalidState(format!(
                "location '{}' received a result with no predictor subset",
                self.location
            )));
        };
        *pending -= 1;

        match result.outcome() {
            EvaluationOutcome::Completed { mae } => {
                if !table.offer(key, *mae) {
                    self.non_improving += 1;
                }
            }
            EvaluationOutcome::Failed(failure) => {
                self.failures.push(FailedCandidate::new(&key, failure));
            }
        }
        Ok(())
    }

    /// Close the search once every dispatched result has arrived
    pub fn complete(&mut self) -> Result<&LocationReport> {
        match std::mem::replace(&mut self.state, LocationState::Idle) {
            LocationState::SearchDispatched { table, pending: 0 } => {
                info!(
                    location = %self.location,
                    improving = table.len(),
                    non_improving = self.non_improving,
                    failed = self.failures.len(),
                    "search complete"
                );
                let report = LocationReport {
                    location: self.location.clone(),
                    baseline_mae: table.baseline_mae(),
                    config: self.config,
                    improvements: table,
                    non_improving: self.non_improving,
                    failures: std::mem::take(&mut self.failures),
                    cancelled: self.cancelled,
                    grid: self.grid.take(),
                };
                self.state = LocationState::SearchComplete(report);
                self.report()
                    .ok_or_else(|| SearchError::InvalidState("report missing".to_string()))
            }
            other => {
                let err = SearchError::InvalidState(format!(
                    "cannot complete location '{}' in state {}",
                    self.location,
                    other.name()
                ));
                self.state = other;
                Err(err)
            }
        }
    }

    pub fn report(&self) -> Option<&LocationReport> {
        match &self.state {
            LocationState::SearchComplete(report) => Some(report),
            _ => None,
        }
    }

    pub fn into_report(self) -> Result<LocationReport> {
        match self.state {
            LocationState::SearchComplete(report) => Ok(report),
            other => Err(SearchError::InvalidState(format!(
                "location '{}' has no report in state {}",
                self.location,
                other.name()
            ))),
        }
    }

    fn invalid(&self, action: &str) -> SearchError {
        SearchError::InvalidState(format!(
            "cannot {} for location '{}' in state {}",
            action,
            self.location,
            self.state.name()
        ))
    }
}

impl ResultSink for LocationSearch {
    fn on_complete(&mut self, result: &EvaluationResult) {
        if let Err(err) = self.accept(result) {
            warn!(location = %self.location, "dropping result: {}", err);
        }
    }

    fn on_failure(&mut self, result: &EvaluationResult, _failure: &TaskFailure) {
        self.on_complete(result);
    }
}

/// Runs baseline, grid and subset searches for single locations
#[derive(Debug)]
pub struct LocationOrchestrator<M> {
    scheduler: SearchScheduler<M>,
    config: SearchConfig,
}

impl<M: ForecastModel + 'static> LocationOrchestrator<M> {
    pub fn new(model: Arc<M>, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = SearchScheduler::new(model, config.worker_count())?
            .with_deadline(config.deadline());
        info!(
            workers = scheduler.workers(),
            alignment = ?config.exog_alignment,
            "worker pool started"
        );
        Ok(Self { scheduler, config })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.scheduler = self.scheduler.with_cancellation(token);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.scheduler.cancellation_token()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Grid search on the training prefix, scored on its validation tail
    pub fn tune(&self, location: &str, series: &TimeSeries) -> Result<GridSearchOutcome> {
        let (train, _) = series.holdout_split(self.config.holdout_fraction)?;
        let (fit, validation) = train.holdout_split(self.config.validation_fraction)?;

        let tasks: Vec<EvaluationTask> = enumerate_grid(self.config.grid_range)
            .into_iter()
            .enumerate()
            .map(|(id, config)| EvaluationTask {
                identity: TaskIdentity {
                    id,
                    location: location.to_string(),
                    subset: None,
                    config,
                },
                inputs: TaskInputs {
                    train: fit.clone(),
                    holdout: validation.clone(),
                    exog: None,
                    order: self.config.order_for(&config),
                    alignment: self.config.exog_alignment,
                },
            })
            .collect();

        info!(location, points = tasks.len(), "grid search dispatched");
        let batch = self.scheduler.run(tasks, &mut ())?;
        let outcome = GridSearchOutcome::from_results(&batch.results, None);
        match &outcome.best {
            Some(best) => info!(location, config = %best.config, mae = best.mae, "grid search complete"),
            None => warn!(location, "no grid point completed"),
        }
        Ok(outcome)
    }

    /// Baseline then one task per predictor subset, using orders `config`
    pub fn search_location(
        &self,
        location: &str,
        table: &RainfallTable,
        candidates: &[String],
        config: HyperparamConfig,
    ) -> Result<LocationReport> {
        let mut search = LocationSearch::new(location, config);
        self.run_search(&mut search, table, candidates)?;
        search.into_report()
    }

    fn run_search(
        &self,
        search: &mut LocationSearch,
        table: &RainfallTable,
        candidates: &[String],
    ) -> Result<()> {
        let location = search.location().to_string();
        if candidates.len() > MAX_CANDIDATES {
            return Err(SearchError::InvalidParameter(format!(
                "location '{}' has {} candidates, at most {} are supported",
                location,
                candidates.len(),
                MAX_CANDIDATES
            )));
        }
        let series = table.series(&location)?;
        let (train, holdout) = series.holdout_split(self.config.holdout_fraction)?;
        let hyper = search.config;
        let order = self.config.order_for(&hyper);

        let inputs = |exog: Option<ExogBlock>| TaskInputs {
            train: train.clone(),
            holdout: holdout.clone(),
            exog,
            order,
            alignment: self.config.exog_alignment,
        };
        let identity = |id: usize, subset: Option<PredictorSubset>| TaskIdentity {
            id,
            location: location.clone(),
            subset,
            config: hyper,
        };

        let baseline_task = EvaluationTask {
            identity: identity(0, None),
            inputs: inputs(None),
        };
        let baseline = self.scheduler.run(vec![baseline_task], &mut ())?;
        let baseline_mae = match baseline.results.first().map(EvaluationResult::outcome) {
            Some(EvaluationOutcome::Completed { mae }) => *mae,
            Some(EvaluationOutcome::Failed(failure)) => {
                return Err(SearchError::ModelError(format!(
                    "baseline for '{}' failed: {}",
                    location, failure
                )))
            }
            None => {
                return Err(SearchError::InvalidState(format!(
                    "baseline for '{}' produced no result",
                    location
                )))
            }
        };
        search.record_baseline(baseline_mae)?;

        let members: HashMap<&str, std::result::Result<TimeSeries, String>> = candidates
            .iter()
            .map(|name| {
                (
                    name.as_str(),
                    table.series(name).map_err(|e| e.to_string()),
                )
            })
            .collect();

        let mut tasks = Vec::new();
        let mut rejected = Vec::new();
        for (id, subset) in enumerate_subsets(candidates).into_iter().enumerate() {
            let block = subset
                .members()
                .iter()
                .map(|name| match members.get(name.as_str()) {
                    Some(Ok(series)) => Ok(series.clone()),
                    Some(Err(reason)) => Err(reason.clone()),
                    None => Err(format!("no series for '{}'", name)),
                })
                .collect::<std::result::Result<Vec<_>, String>>()
                .and_then(|series| ExogBlock::new(series).map_err(|e| e.to_string()));

            match block {
                Ok(block) => tasks.push(EvaluationTask {
                    identity: identity(id, Some(subset)),
                    inputs: inputs(Some(block)),
                }),
                Err(reason) => rejected.push(EvaluationResult::new(
                    identity(id, Some(subset)),
                    EvaluationOutcome::Failed(TaskFailure::new(FailureKind::DataAlignment, reason)),
                )),
            }
        }

        search.dispatch(tasks.len() + rejected.len())?;
        for result in &rejected {
            warn!(
                location = %location,
                task = result.identity().id,
                "candidate rejected before dispatch"
            );
            search.accept(result)?;
        }
        let batch = self.scheduler.run(tasks, search)?;
        if batch.cancelled {
            search.mark_cancelled();
        }
        search.complete()?;
        Ok(())
    }
}

/// Full run over every selected location: optional grid search, then the
/// subset search with the chosen orders
#[derive(Debug)]
pub struct SearchPipeline<M> {
    orchestrator: LocationOrchestrator<M>,
}

impl<M: ForecastModel + 'static> SearchPipeline<M> {
    pub fn new(model: Arc<M>, config: SearchConfig) -> Result<Self> {
        Ok(Self {
            orchestrator: LocationOrchestrator::new(model, config)?,
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.orchestrator = self.orchestrator.with_cancellation(token);
        self
    }

    pub fn orchestrator(&self) -> &LocationOrchestrator<M> {
        &self.orchestrator
    }

    /// Target locations for this run, checked against both inputs
    pub fn targets(&self, table: &RainfallTable, candidates: &CandidateSet) -> Result<Vec<String>> {
        let targets: Vec<String> = match &self.orchestrator.config.locations {
            Some(list) => list.iter().map(|name| name.trim().to_string()).collect(),
            None => candidates.locations().map(str::to_string).collect(),
        };
        for target in &targets {
            if candidates.candidates(target).is_none() || !table.contains(target) {
                return Err(SearchError::UnknownLocation(target.clone()));
            }
        }
        Ok(targets)
    }

    pub fn run(&self, table: &RainfallTable, candidates: &CandidateSet) -> Result<SearchReport> {
        let targets = self.targets(table, candidates)?;
        let config = &self.orchestrator.config;
        let cancel = self.orchestrator.cancellation_token();
        let mut report = SearchReport::default();

        for target in targets {
            if cancel.is_cancelled() {
                report.skipped.push(SkippedLocation {
                    location: target,
                    reason: "run cancelled".to_string(),
                });
                continue;
            }

            let list = candidates.candidates(&target).unwrap_or_default();
            match self.search_one(&target, table, list, config) {
                Ok(location_report) => report.locations.push(location_report),
                Err(err) => {
                    warn!(location = %target, "location skipped: {}", err);
                    report.skipped.push(SkippedLocation {
                        location: target,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn search_one(
        &self,
        target: &str,
        table: &RainfallTable,
        list: &[String],
        config: &SearchConfig,
    ) -> Result<LocationReport> {
        if !config.run_grid_search {
            return self
                .orchestrator
                .search_location(target, table, list, config.fixed_config);
        }

        let series = table.series(target)?;
        let grid = self.orchestrator.tune(target, &series)?;
        let chosen = grid.best_config().unwrap_or_else(|| {
            warn!(location = target, "falling back to the fixed configuration");
            config.fixed_config
        });
        let mut search = LocationSearch::new(target, chosen);
        search.set_grid(grid);
        self.orchestrator.run_search(&mut search, table, list)?;
        search.into_report()
    }
}
