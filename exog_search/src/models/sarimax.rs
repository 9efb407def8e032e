//! Seasonal ARIMAX model backed by `sarimax_math`

use crate::error::Result;
use crate::models::{FittedModel, ForecastModel};
use sarimax_math::{ModelOrder, SeasonalArimax, SeasonalArimaxFit};

/// Seasonal ARIMA with exogenous regressors
#[derive(Debug, Clone, Default)]
pub struct SarimaxModel {
    strict_convergence: bool,
}

impl SarimaxModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report fits that exhaust the optimiser's iteration budget as convergence failures
    pub fn with_strict_convergence(mut self, strict: bool) -> Self {
        self.strict_convergence = strict;
        self
    }
}

/// A fitted seasonal ARIMAX model
#[derive(Debug, Clone)]
pub struct FittedSarimax {
    fit: SeasonalArimaxFit,
}

impl ForecastModel for SarimaxModel {
    type Fitted = FittedSarimax;

    fn fit(
        &self,
        train: &[f64],
        order: &ModelOrder,
        exog: Option<&[Vec<f64>]>,
    ) -> Result<Self::Fitted> {
        let estimator =
            SeasonalArimax::new(*order).with_strict_convergence(self.strict_convergence);
        let fit = estimator.fit(train, exog.unwrap_or(&[]))?;
        Ok(FittedSarimax { fit })
    }

    fn name(&self) -> &str {
        "SARIMAX"
    }
}

impl FittedModel for FittedSarimax {
    fn forecast_next(&self, exog_next: Option<&[f64]>) -> Result<f64> {
        Ok(self.fit.forecast_next(exog_next.unwrap_or(&[]))?)
    }
}
