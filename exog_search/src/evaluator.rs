//! Expanding-window one-step-ahead evaluation

use crate::config::ExogAlignment;
use crate::data::{ExogBlock, TimeSeries};
use crate::error::{Result, SearchError};
use crate::metrics::{forecast_accuracy, ErrorMetrics};
use crate::models::{FittedModel, ForecastModel};
use sarimax_math::ModelOrder;
use tracing::trace;

/// Forecasts and actuals from one walk-forward pass
#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardScore {
    pub forecasts: Vec<f64>,
    pub actuals: Vec<f64>,
    pub metrics: ErrorMetrics,
}

impl WalkForwardScore {
    pub fn mae(&self) -> f64 {
        self.metrics.mae
    }
}

/// Walk-forward evaluator for one model order.
///
/// For each holdout month the model is refitted on every observation before
/// it and asked for a single step ahead; the true value is then appended to
/// the training window.
#[derive(Debug)]
pub struct WalkForwardEvaluator<'m, M: ForecastModel> {
    model: &'m M,
    order: ModelOrder,
    alignment: ExogAlignment,
}

impl<'m, M: ForecastModel> WalkForwardEvaluator<'m, M> {
    pub fn new(model: &'m M, order: ModelOrder) -> Self {
        Self {
            model,
            order,
            alignment: ExogAlignment::default(),
        }
    }

    pub fn with_alignment(mut self, alignment: ExogAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Score the model on `holdout`, which must directly follow `train`.
    ///
    /// Any failed fit or forecast fails the whole evaluation.
    pub fn evaluate(
        &self,
        train: &TimeSeries,
        holdout: &TimeSeries,
        exog: Option<&ExogBlock>,
    ) -> Result<WalkForwardScore> {
        if train.is_empty() {
            return Err(SearchError::InvalidParameter(
                "walk-forward evaluation needs a non-empty training window".to_string(),
            ));
        }
        if holdout.is_empty() {
            return Err(SearchError::InvalidParameter(
                "walk-forward evaluation needs a non-empty holdout".to_string(),
            ));
        }
        if let (Some(last), Some(first)) = (train.dates().last(), holdout.dates().first()) {
            if last >= first {
                return Err(SearchError::DataAlignment(format!(
                    "holdout starts at {} but training ends at {}",
                    first, last
                )));
            }
        }

        let n_train = train.len();
        let target: Vec<f64> = train.values().iter().chain(holdout.values()).copied().collect();

        let columns = match exog {
            Some(block) => {
                if let ExogAlignment::Lagged(lag) = self.alignment {
                    if lag >= n_train {
                        return Err(SearchError::InvalidParameter(format!(
                            "lag of {} months leaves no training data out of {}",
                            lag, n_train
                        )));
                    }
                }
                let dates: Vec<_> = train.dates().iter().chain(holdout.dates()).copied().collect();
                Some(block.align_to(&dates)?)
            }
            None => None,
        };

        let mut forecasts = Vec::with_capacity(holdout.len());
        for step in 0..holdout.len() {
            let end = n_train + step;
            let forecast = self.forecast_at(&target[..end], columns.as_deref())?;
            if !forecast.is_finite() {
                return Err(SearchError::Convergence(format!(
                    "{} produced a non-finite forecast at holdout step {}",
                    self.model.name(),
                    step
                )));
            }
            trace!(step, forecast, actual = target[end], "walk-forward step");
            forecasts.push(forecast);
        }

        let actuals = holdout.values().to_vec();
        let metrics = forecast_accuracy(&forecasts, &actuals)?;
        Ok(WalkForwardScore {
            forecasts,
            actuals,
            metrics,
        })
    }

    /// Fit on `history` and forecast the month after it.
    ///
    /// Only exogenous values up to the forecast month are read.
    fn forecast_at(&self, history: &[f64], columns: Option<&[Vec<f64>]>) -> Result<f64> {
        let end = history.len();
        let Some(columns) = columns else {
            let fitted = self.model.fit(history, &self.order, None)?;
            return fitted.forecast_next(None);
        };

        let lag = match self.alignment {
            ExogAlignment::Concurrent => 0,
            ExogAlignment::Lagged(lag) => lag,
        };
        let fit_exog: Vec<Vec<f64>> = columns.iter().map(|c| c[..end - lag].to_vec()).collect();
        let next_row: Vec<f64> = columns.iter().map(|c| c[end - lag]).collect();

        let fitted = self.model.fit(&history[lag..], &self.order, Some(&fit_exog))?;
        fitted.forecast_next(Some(&next_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Forecasts the last training value plus the sum of the exogenous row
    #[derive(Debug)]
    struct Persistence;

    #[derive(Debug)]
    struct LastValue {
        last: f64,
    }

    impl FittedModel for LastValue {
        fn forecast_next(&self, exog_next: Option<&[f64]>) -> Result<f64> {
            Ok(self.last + exog_next.map(|row| row.iter().sum()).unwrap_or(0.0))
        }
    }

    impl ForecastModel for Persistence {
        type Fitted = LastValue;

        fn fit(
            &self,
            train: &[f64],
            _order: &ModelOrder,
            exog: Option<&[Vec<f64>]>,
        ) -> Result<Self::Fitted> {
            if let Some(columns) = exog {
                assert!(columns.iter().all(|c| c.len() == train.len()));
            }
            Ok(LastValue {
                last: *train.last().unwrap(),
            })
        }

        fn name(&self) -> &str {
            "persistence"
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
    }

    #[test]
    fn persistence_errors_are_step_differences() {
        let series = TimeSeries::monthly("A", start(), vec![1.0, 2.0, 4.0, 7.0]).unwrap();
        let (train, holdout) = series.split_at(2).unwrap();
        let score = WalkForwardEvaluator::new(&Persistence, ModelOrder::new(0, 0, 0))
            .evaluate(&train, &holdout, None)
            .unwrap();

        assert_eq!(score.forecasts, vec![2.0, 4.0]);
        assert_eq!(score.mae(), 2.5);
    }

    #[test]
    fn lagged_alignment_reads_earlier_rows() {
        let series = TimeSeries::monthly("A", start(), vec![0.0; 5]).unwrap();
        let exog = TimeSeries::monthly("B", start(), vec![10.0, 20.0, 30.0, 40.0, 50.0]).unwrap();
        let block = ExogBlock::new(vec![exog]).unwrap();
        let (train, holdout) = series.split_at(3).unwrap();

        let concurrent = WalkForwardEvaluator::new(&Persistence, ModelOrder::new(0, 0, 0))
            .evaluate(&train, &holdout, Some(&block))
            .unwrap();
        assert_eq!(concurrent.forecasts, vec![40.0, 50.0]);

        let lagged = WalkForwardEvaluator::new(&Persistence, ModelOrder::new(0, 0, 0))
            .with_alignment(ExogAlignment::Lagged(2))
            .evaluate(&train, &holdout, Some(&block))
            .unwrap();
        assert_eq!(lagged.forecasts, vec![20.0, 30.0]);
    }

    #[test]
    fn lag_longer_than_training_is_rejected() {
        let series = TimeSeries::monthly("A", start(), vec![0.0; 4]).unwrap();
        let exog = TimeSeries::monthly("B", start(), vec![0.0; 4]).unwrap();
        let block = ExogBlock::new(vec![exog]).unwrap();
        let (train, holdout) = series.split_at(2).unwrap();

        let result = WalkForwardEvaluator::new(&Persistence, ModelOrder::new(0, 0, 0))
            .with_alignment(ExogAlignment::Lagged(2))
            .evaluate(&train, &holdout, Some(&block));
        assert!(matches!(result, Err(SearchError::InvalidParameter(_))));
    }

    #[test]
    fn empty_holdout_is_rejected() {
        let series = TimeSeries::monthly("A", start(), vec![1.0, 2.0]).unwrap();
        let (train, holdout) = series.split_at(2).unwrap();
        let result = WalkForwardEvaluator::new(&Persistence, ModelOrder::new(0, 0, 0))
            .evaluate(&train, &holdout, None);
        assert!(result.is_err());
    }
}
