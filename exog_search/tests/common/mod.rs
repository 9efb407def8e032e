#![allow(dead_code)]

use chrono::NaiveDate;
use exog_search::data::TimeSeries;
use exog_search::error::{Result, SearchError};
use exog_search::models::{FittedModel, ForecastModel};
use indexmap::IndexMap;
use sarimax_math::ModelOrder;
use std::sync::Mutex;
use std::time::Duration;

pub fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2001, 1, 1).unwrap()
}

pub fn series(name: &str, values: Vec<f64>) -> TimeSeries {
    TimeSeries::monthly(name, start(), values).unwrap()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn columns(list: &[(&str, Vec<f64>)]) -> IndexMap<String, Vec<Option<f64>>> {
    list.iter()
        .map(|(name, values)| (name.to_string(), values.iter().copied().map(Some).collect()))
        .collect()
}

pub fn months(count: usize) -> Vec<NaiveDate> {
    (0..count)
        .map(|i| start().checked_add_months(chrono::Months::new(i as u32)).unwrap())
        .collect()
}

/// Fitted model that always forecasts the same value
#[derive(Debug, Clone)]
pub struct Constant(pub f64);

impl FittedModel for Constant {
    fn forecast_next(&self, _exog_next: Option<&[f64]>) -> Result<f64> {
        Ok(self.0)
    }
}

/// Forecasts a fixed value per exogenous row, so that on an all-zero target
/// the MAE of a subset is exactly its scripted value.
#[derive(Debug)]
pub struct ScriptedModel {
    pub baseline: f64,
    pub responses: Vec<(Vec<f64>, f64)>,
}

#[derive(Debug)]
pub struct ScriptedFit {
    baseline: f64,
    responses: Vec<(Vec<f64>, f64)>,
}

impl ForecastModel for ScriptedModel {
    type Fitted = ScriptedFit;

    fn fit(&self, _train: &[f64], _order: &ModelOrder, _exog: Option<&[Vec<f64>]>) -> Result<ScriptedFit> {
        Ok(ScriptedFit {
            baseline: self.baseline,
            responses: self.responses.clone(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl FittedModel for ScriptedFit {
    fn forecast_next(&self, exog_next: Option<&[f64]>) -> Result<f64> {
        match exog_next {
            None => Ok(self.baseline),
            Some(row) => self
                .responses
                .iter()
                .find(|(key, _)| key.as_slice() == row)
                .map(|(_, value)| *value)
                .ok_or_else(|| SearchError::ModelError(format!("no response for {:?}", row))),
        }
    }
}

/// Behaviour keyed on the AR order: `p % 3 == 0` succeeds, `1` fails to
/// converge, `2` panics inside the worker.
#[derive(Debug, Default)]
pub struct FlakyModel {
    pub delay: Option<Duration>,
}

impl ForecastModel for FlakyModel {
    type Fitted = Constant;

    fn fit(&self, _train: &[f64], order: &ModelOrder, _exog: Option<&[Vec<f64>]>) -> Result<Constant> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match order.p % 3 {
            0 => Ok(Constant(order.p as f64)),
            1 => Err(SearchError::Convergence(format!("order {} diverged", order.p))),
            _ => panic!("estimator blew up for order {}", order.p),
        }
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Forecast error determined by the AR and MA orders: 1.0 when either is one,
/// 2.0 otherwise.
#[derive(Debug, Default)]
pub struct OrderScoredModel;

impl ForecastModel for OrderScoredModel {
    type Fitted = Constant;

    fn fit(&self, _train: &[f64], order: &ModelOrder, _exog: Option<&[Vec<f64>]>) -> Result<Constant> {
        Ok(Constant(if order.p == 1 || order.q == 1 { 1.0 } else { 2.0 }))
    }

    fn name(&self) -> &str {
        "order-scored"
    }
}

/// Fails to converge below a minimum AR order and forecasts a constant
/// above it.
#[derive(Debug)]
pub struct MinimumOrderModel {
    pub min_ar: usize,
    pub forecast: f64,
}

impl ForecastModel for MinimumOrderModel {
    type Fitted = Constant;

    fn fit(&self, _train: &[f64], order: &ModelOrder, _exog: Option<&[Vec<f64>]>) -> Result<Constant> {
        if order.p < self.min_ar {
            return Err(SearchError::Convergence(format!("order {} too small", order.p)));
        }
        Ok(Constant(self.forecast))
    }

    fn name(&self) -> &str {
        "minimum-order"
    }
}

/// What one `fit` call saw
#[derive(Debug, Clone, PartialEq)]
pub struct FitCall {
    pub train: Vec<f64>,
    pub exog: Option<Vec<Vec<f64>>>,
}

/// Forecasts the training mean plus the exogenous row sum and records every
/// fit it performs.
#[derive(Debug, Default)]
pub struct RecordingModel {
    pub calls: Mutex<Vec<FitCall>>,
}

#[derive(Debug)]
pub struct MeanFit(f64);

impl FittedModel for MeanFit {
    fn forecast_next(&self, exog_next: Option<&[f64]>) -> Result<f64> {
        Ok(self.0 + exog_next.map(|row| row.iter().sum::<f64>()).unwrap_or(0.0))
    }
}

impl ForecastModel for RecordingModel {
    type Fitted = MeanFit;

    fn fit(&self, train: &[f64], _order: &ModelOrder, exog: Option<&[Vec<f64>]>) -> Result<MeanFit> {
        self.calls.lock().unwrap().push(FitCall {
            train: train.to_vec(),
            exog: exog.map(|c| c.to_vec()),
        });
        Ok(MeanFit(train.iter().sum::<f64>() / train.len() as f64))
    }

    fn name(&self) -> &str {
        "recording"
    }
}
