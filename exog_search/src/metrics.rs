//! Metrics for evaluating forecast performance

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};

/// Forecast error metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
}

/// Mean absolute error between paired forecasts and observations
pub fn mean_absolute_error(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(forecast, actual)?;
    let sum: f64 = forecast
        .iter()
        .zip(actual)
        .map(|(f, a)| (f - a).abs())
        .sum();
    Ok(sum / forecast.len() as f64)
}

/// Calculate accuracy metrics for a forecast vs actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ErrorMetrics> {
    let mae = mean_absolute_error(forecast, actual)?;
    let mse = forecast
        .iter()
        .zip(actual)
        .map(|(f, a)| (f - a).powi(2))
        .sum::<f64>()
        / forecast.len() as f64;

    Ok(ErrorMetrics {
        mae,
        mse,
        rmse: mse.sqrt(),
    })
}

fn check_lengths(forecast: &[f64], actual: &[f64]) -> Result<()> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(SearchError::InvalidParameter(format!(
            "Forecast and actual values must have the same non-zero length ({} vs {})",
            forecast.len(),
            actual.len()
        )));
    }
    Ok(())
}

impl std::fmt::Display for ErrorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MAE {:.4}  MSE {:.4}  RMSE {:.4}",
            self.mae, self.mse, self.rmse
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn accuracy_metrics() {
        let metrics = forecast_accuracy(&[1.0, 2.0, 3.0], &[2.0, 2.0, 5.0]).unwrap();
        assert_abs_diff_eq!(metrics.mae, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.mse, 5.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.rmse, (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn mismatched_or_empty_inputs_fail() {
        assert!(mean_absolute_error(&[1.0], &[1.0, 2.0]).is_err());
        assert!(mean_absolute_error(&[], &[]).is_err());
    }
}
