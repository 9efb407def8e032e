//! Bounded worker pool that fans evaluation tasks out and collects results
//!
//! Tasks carry everything they need by value. Workers run one task at a time
//! to completion and send an immutable [`EvaluationResult`] back over a
//! channel; every callback runs on the thread that called
//! [`SearchScheduler::run`].

use crate::config::ExogAlignment;
use crate::data::{ExogBlock, TimeSeries};
use crate::error::{Result, SearchError, TaskFailure};
use crate::evaluator::WalkForwardEvaluator;
use crate::grid::HyperparamConfig;
use crate::models::ForecastModel;
use crate::subsets::PredictorSubset;
use rayon::{ThreadPool, ThreadPoolBuilder};
use sarimax_math::ModelOrder;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What a task evaluates
#[derive(Debug, Clone, PartialEq)]
pub struct TaskIdentity {
    /// Position in the submitted task list
    pub id: usize,
    pub location: String,
    /// Exogenous predictors, `None` for the baseline or a grid point
    pub subset: Option<PredictorSubset>,
    pub config: HyperparamConfig,
}

/// Owned inputs of a task
#[derive(Debug, Clone)]
pub struct TaskInputs {
    pub train: TimeSeries,
    pub holdout: TimeSeries,
    pub exog: Option<ExogBlock>,
    pub order: ModelOrder,
    pub alignment: ExogAlignment,
}

/// One walk-forward evaluation to run on the pool
#[derive(Debug, Clone)]
pub struct EvaluationTask {
    pub identity: TaskIdentity,
    pub inputs: TaskInputs,
}

impl EvaluationTask {
    /// Evaluate on the current thread
    pub fn run<M: ForecastModel>(&self, model: &M) -> EvaluationOutcome {
        let inputs = &self.inputs;
        let evaluation = WalkForwardEvaluator::new(model, inputs.order)
            .with_alignment(inputs.alignment)
            .evaluate(&inputs.train, &inputs.holdout, inputs.exog.as_ref());
        match evaluation {
            Ok(score) => EvaluationOutcome::Completed { mae: score.mae() },
            Err(err) => EvaluationOutcome::Failed(TaskFailure::from(&err)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    Completed { mae: f64 },
    Failed(TaskFailure),
}

/// Result of one task. Built once by the worker and never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    identity: TaskIdentity,
    outcome: EvaluationOutcome,
}

impl EvaluationResult {
    pub fn new(identity: TaskIdentity, outcome: EvaluationOutcome) -> Self {
        Self { identity, outcome }
    }

    pub fn identity(&self) -> &TaskIdentity {
        &self.identity
    }

    pub fn outcome(&self) -> &EvaluationOutcome {
        &self.outcome
    }

    pub fn mae(&self) -> Option<f64> {
        match self.outcome {
            EvaluationOutcome::Completed { mae } => Some(mae),
            EvaluationOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match &self.outcome {
            EvaluationOutcome::Completed { .. } => None,
            EvaluationOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Receives results as they arrive, on the submitting thread
pub trait ResultSink {
    fn on_complete(&mut self, _result: &EvaluationResult) {}

    fn on_failure(&mut self, _result: &EvaluationResult, _failure: &TaskFailure) {}
}

impl ResultSink for () {}

/// Shared flag that stops queued tasks from starting
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Every result of one batch, in completion order
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<EvaluationResult>,
    /// The batch was cut short by cancellation or the deadline
    pub cancelled: bool,
}

impl BatchOutcome {
    /// Results ordered by task id
    pub fn into_sorted(mut self) -> Vec<EvaluationResult> {
        self.results.sort_by_key(|r| r.identity.id);
        self.results
    }
}

/// Fixed-size worker pool for evaluation tasks
pub struct SearchScheduler<M> {
    model: Arc<M>,
    pool: ThreadPool,
    workers: usize,
    cancel: CancellationToken,
    deadline: Option<Duration>,
}

impl<M> std::fmt::Debug for SearchScheduler<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchScheduler")
            .field("workers", &self.workers)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl<M: ForecastModel + 'static> SearchScheduler<M> {
    /// Start a pool of `workers` threads
    pub fn new(model: Arc<M>, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(SearchError::InvalidParameter(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("exog-worker-{}", i))
            .build()
            .map_err(|e| SearchError::PoolStartup(e.to_string()))?;

        Ok(Self {
            model,
            pool,
            workers,
            cancel: CancellationToken::new(),
            deadline: None,
        })
    }

    /// Share an externally controlled cancellation flag
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancel whatever is still queued once a batch has run this long
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every task and block until each one is accounted for.
    ///
    /// Exactly one result comes back per task. Tasks that were still queued
    /// when the batch was cancelled come back as cancelled failures; tasks
    /// already running finish normally.
    pub fn run(
        &self,
        tasks: Vec<EvaluationTask>,
        sink: &mut dyn ResultSink,
    ) -> Result<BatchOutcome> {
        let started = Instant::now();
        let (tx, rx) = mpsc::channel::<EvaluationResult>();
        let mut pending: BTreeMap<usize, TaskIdentity> = BTreeMap::new();

        for task in &tasks {
            if pending
                .insert(task.identity.id, task.identity.clone())
                .is_some()
            {
                return Err(SearchError::InvalidParameter(format!(
                    "duplicate task id {}",
                    task.identity.id
                )));
            }
        }

        // the deadline only stops this batch; the shared token stops every batch
        let expired = CancellationToken::new();
        for task in tasks {
            let tx = tx.clone();
            let model = Arc::clone(&self.model);
            let cancel = self.cancel.clone();
            let expired = expired.clone();
            self.pool.spawn(move || {
                let outcome = if cancel.is_cancelled() || expired.is_cancelled() {
                    EvaluationOutcome::Failed(TaskFailure::cancelled())
                } else {
                    catch_unwind(AssertUnwindSafe(|| task.run(model.as_ref()))).unwrap_or_else(
                        |payload| {
                            EvaluationOutcome::Failed(TaskFailure::worker_crash(panic_message(
                                payload.as_ref(),
                            )))
                        },
                    )
                };
                // the receiver only disappears if the submitting thread gave up
                let _ = tx.send(EvaluationResult::new(task.identity, outcome));
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(pending.len());
        let mut timed_out = false;
        while !pending.is_empty() {
            let received = match self.deadline {
                Some(limit) if !timed_out => {
                    let remaining = limit.saturating_sub(started.elapsed());
                    match rx.recv_timeout(remaining) {
                        Ok(result) => Some(result),
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            warn!(
                                outstanding = pending.len(),
                                "batch deadline reached, cancelling queued tasks"
                            );
                            timed_out = true;
                            expired.cancel();
                            continue;
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => None,
                    }
                }
                _ => rx.recv().ok(),
            };

            let Some(result) = received else {
                break;
            };
            if pending.remove(&result.identity.id).is_none() {
                continue;
            }
            Self::report(&result, sink);
            results.push(result);
        }

        // every sender is gone but some tasks never reported back
        for (_, identity) in std::mem::take(&mut pending) {
            let result = EvaluationResult::new(
                identity,
                EvaluationOutcome::Failed(TaskFailure::worker_crash(
                    "worker exited without reporting a result",
                )),
            );
            Self::report(&result, sink);
            results.push(result);
        }

        Ok(BatchOutcome {
            results,
            cancelled: timed_out || self.cancel.is_cancelled(),
        })
    }

    fn report(result: &EvaluationResult, sink: &mut dyn ResultSink) {
        let identity = &result.identity;
        match &result.outcome {
            EvaluationOutcome::Completed { mae } => {
                debug!(
                    location = %identity.location,
                    task = identity.id,
                    mae,
                    "task completed"
                );
                sink.on_complete(result);
            }
            EvaluationOutcome::Failed(failure) => {
                warn!(
                    location = %identity.location,
                    task = identity.id,
                    kind = %failure.kind,
                    "task failed: {}",
                    failure.message
                );
                sink.on_failure(result, failure);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", msg)
    } else {
        "worker panicked".to_string()
    }
}
