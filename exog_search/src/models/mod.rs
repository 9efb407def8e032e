//! Forecasting model contract used by the walk-forward evaluator

use crate::error::Result;
use sarimax_math::ModelOrder;
use std::fmt::Debug;

/// A model fitted on one training window
pub trait FittedModel: Debug {
    /// Forecast the month right after the training window.
    ///
    /// `exog_next` carries one value per exogenous column when the model was
    /// fitted with regressors.
    fn forecast_next(&self, exog_next: Option<&[f64]>) -> Result<f64>;
}

/// Forecast model that can be fitted on a training window.
///
/// Implementations are shared by every worker of the search pool, so fitting
/// must not mutate the model.
pub trait ForecastModel: Debug + Send + Sync {
    /// The type of fitted model produced
    type Fitted: FittedModel;

    /// Fit on `train`, with one exogenous column per regressor, each as long as `train`
    fn fit(
        &self,
        train: &[f64],
        order: &ModelOrder,
        exog: Option<&[Vec<f64>]>,
    ) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod sarimax;

pub use sarimax::SarimaxModel;
