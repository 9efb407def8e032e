//! Seasonal ARIMA with exogenous regressors
//!
//! The model is a regression with seasonal ARMA errors on the differenced
//! scale:
//!
//! ```text
//! w_t = c + b' x_t + u_t
//! phi(L) PHI(L^m) u_t = theta(L) THETA(L^m) e_t
//! ```
//!
//! where `w` and `x` are the target and regressors after applying
//! `(1 - L)^d (1 - L^m)^D`. Parameters are estimated by conditional sum of
//! squares, minimised with a bounded Nelder-Mead simplex.

use crate::least_squares::ols_with_intercept;
use crate::optimization::{nelder_mead, SimplexConfig};
use crate::polynomial::{apply, differencing, lag_polynomial, multiply};
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Non-seasonal and seasonal orders of a SARIMAX model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl ModelOrder {
    /// Non-seasonal ARIMA(p, d, q)
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 0,
        }
    }

    /// Attach a seasonal (P, D, Q, m) component
    pub fn with_seasonal(mut self, p: usize, d: usize, q: usize, period: usize) -> Self {
        self.seasonal_p = p;
        self.seasonal_d = d;
        self.seasonal_q = q;
        self.period = period;
        self
    }

    fn seasonal_step(&self) -> usize {
        self.period.max(1)
    }

    /// Highest autoregressive lag after expanding the seasonal product
    pub fn ar_span(&self) -> usize {
        self.p + self.seasonal_p * self.seasonal_step()
    }

    /// Highest moving-average lag after expanding the seasonal product
    pub fn ma_span(&self) -> usize {
        self.q + self.seasonal_q * self.seasonal_step()
    }

    /// Observations consumed by differencing
    pub fn difference_span(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    /// Number of ARMA coefficients
    pub fn arma_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// Smallest training window that leaves at least one residual per
    /// estimated parameter
    pub fn min_observations(&self, exog_columns: usize) -> usize {
        let params = 1 + exog_columns + self.arma_params();
        self.difference_span() + self.ar_span() + params + 1
    }

    fn validate(&self) -> Result<()> {
        if (self.seasonal_p > 0 || self.seasonal_q > 0 || self.seasonal_d > 0) && self.period < 2
        {
            return Err(MathError::InvalidInput(format!(
                "seasonal terms need a period of at least 2, got {}",
                self.period
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SARIMAX({},{},{})({},{},{},{})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

/// Unfitted seasonal ARIMAX estimator
#[derive(Debug, Clone)]
pub struct SeasonalArimax {
    order: ModelOrder,
    simplex: SimplexConfig,
    strict_convergence: bool,
}

/// Estimated model, holding the state needed for a one-step forecast
#[derive(Debug, Clone)]
pub struct SeasonalArimaxFit {
    order: ModelOrder,
    intercept: f64,
    exog_coefficients: Vec<f64>,
    /// `a_k` in `u_t = sum a_k u_{t-k} + ...`, index 0 is lag 1
    ar_lags: Vec<f64>,
    /// `b_k` in `... + sum b_k e_{t-k}`, index 0 is lag 1
    ma_lags: Vec<f64>,
    differencing: Vec<f64>,
    target_tail: Vec<f64>,
    exog_tails: Vec<Vec<f64>>,
    errors: Vec<f64>,
    disturbances: Vec<f64>,
    sigma2: f64,
    converged: bool,
    iterations: usize,
}

struct Layout {
    exog: usize,
    p: usize,
    q: usize,
    seasonal_p: usize,
    seasonal_q: usize,
    period: usize,
}

impl Layout {
    fn len(&self) -> usize {
        1 + self.exog + self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// Expanded AR and MA lag coefficients for a parameter vector
    fn lag_coefficients(&self, params: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut at = 1 + self.exog;
        let phi = &params[at..at + self.p];
        at += self.p;
        let theta = &params[at..at + self.q];
        at += self.q;
        let seasonal_phi = &params[at..at + self.seasonal_p];
        at += self.seasonal_p;
        let seasonal_theta = &params[at..at + self.seasonal_q];

        let step = self.period.max(1);
        let ar = multiply(
            &lag_polynomial(phi, 1, -1.0),
            &lag_polynomial(seasonal_phi, step, -1.0),
        );
        let ma = multiply(
            &lag_polynomial(theta, 1, 1.0),
            &lag_polynomial(seasonal_theta, step, 1.0),
        );

        (
            ar.iter().skip(1).map(|c| -c).collect(),
            ma.iter().skip(1).copied().collect(),
        )
    }
}

/// Run the conditional residual recursion; returns (disturbances u, errors e, css, count).
fn residuals(
    w: &[f64],
    xs: &[Vec<f64>],
    intercept: f64,
    beta: &[f64],
    ar: &[f64],
    ma: &[f64],
) -> (Vec<f64>, Vec<f64>, f64, usize) {
    let n = w.len();
    let u: Vec<f64> = (0..n)
        .map(|t| {
            let regression: f64 = beta.iter().zip(xs).map(|(b, x)| b * x[t]).sum();
            w[t] - intercept - regression
        })
        .collect();

    let start = ar.len();
    let mut e = vec![0.0; n];
    let mut css = 0.0;
    for t in start..n {
        let mut predicted = 0.0;
        for (k, a) in ar.iter().enumerate() {
            predicted += a * u[t - 1 - k];
        }
        for (k, b) in ma.iter().enumerate() {
            if t > k {
                predicted += b * e[t - 1 - k];
            }
        }
        e[t] = u[t] - predicted;
        css += e[t] * e[t];
    }
    (u, e, css, n.saturating_sub(start))
}

impl SeasonalArimax {
    pub fn new(order: ModelOrder) -> Self {
        Self {
            order,
            simplex: SimplexConfig::default(),
            strict_convergence: false,
        }
    }

    /// Treat an exhausted simplex budget as a failed fit
    pub fn with_strict_convergence(mut self, strict: bool) -> Self {
        self.strict_convergence = strict;
        self
    }

    /// Estimate the model on `target` with regressor `columns` (each the same
    /// length as `target`).
    pub fn fit(&self, target: &[f64], columns: &[Vec<f64>]) -> Result<SeasonalArimaxFit> {
        let order = self.order;
        order.validate()?;

        for column in columns {
            if column.len() != target.len() {
                return Err(MathError::DimensionMismatch {
                    expected: target.len(),
                    got: column.len(),
                });
            }
        }

        let needed = order.min_observations(columns.len());
        if target.len() < needed {
            return Err(MathError::InsufficientData {
                needed,
                got: target.len(),
            });
        }
        if target.iter().chain(columns.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "training data contains non-finite values".to_string(),
            ));
        }

        let delta = differencing(order.d, order.seasonal_d, order.period);
        let w = apply(&delta, target);
        let xs: Vec<Vec<f64>> = columns.iter().map(|c| apply(&delta, c)).collect();

        let layout = Layout {
            exog: xs.len(),
            p: order.p,
            q: order.q,
            seasonal_p: order.seasonal_p,
            seasonal_q: order.seasonal_q,
            period: order.period,
        };

        let mut initial = ols_with_intercept(&w, &xs)?;
        let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY); initial.len()];
        for blocks in [order.p, order.q, order.seasonal_p, order.seasonal_q] {
            for i in 0..blocks {
                initial.push(0.1 / (i + 1) as f64);
                bounds.push((-0.99, 0.99));
            }
        }
        debug_assert_eq!(initial.len(), layout.len());

        let exog = layout.exog;
        let objective = |params: &[f64]| {
            let (ar, ma) = layout.lag_coefficients(params);
            let (_, _, css, _) = residuals(&w, &xs, params[0], &params[1..1 + exog], &ar, &ma);
            if css.is_finite() {
                css
            } else {
                f64::INFINITY
            }
        };

        let result = nelder_mead(objective, &initial, Some(&bounds), self.simplex);
        if !result.value.is_finite() {
            return Err(MathError::Convergence(format!(
                "{} conditional sum of squares is not finite",
                order
            )));
        }
        if !result.converged && self.strict_convergence {
            return Err(MathError::Convergence(format!(
                "{} simplex exhausted {} iterations",
                order, result.iterations
            )));
        }

        let params = result.point;
        let (ar_lags, ma_lags) = layout.lag_coefficients(&params);
        let intercept = params[0];
        let exog_coefficients = params[1..1 + exog].to_vec();
        let (disturbances, errors, css, count) =
            residuals(&w, &xs, intercept, &exog_coefficients, &ar_lags, &ma_lags);

        let span = delta.len() - 1;
        Ok(SeasonalArimaxFit {
            order,
            intercept,
            exog_coefficients,
            ar_lags,
            ma_lags,
            target_tail: target[target.len() - span..].to_vec(),
            exog_tails: columns
                .iter()
                .map(|c| c[c.len() - span..].to_vec())
                .collect(),
            differencing: delta,
            errors,
            disturbances,
            sigma2: if count > 0 { css / count as f64 } else { 0.0 },
            converged: result.converged,
            iterations: result.iterations,
        })
    }
}

impl SeasonalArimaxFit {
    /// Forecast the observation that follows the training window.
    ///
    /// `exog_next` holds one value per regressor for the forecast month and
    /// must be empty when the model was fitted without regressors.
    pub fn forecast_next(&self, exog_next: &[f64]) -> Result<f64> {
        if exog_next.len() != self.exog_coefficients.len() {
            return Err(MathError::DimensionMismatch {
                expected: self.exog_coefficients.len(),
                got: exog_next.len(),
            });
        }

        let t = self.disturbances.len();
        let mut disturbance = 0.0;
        for (k, a) in self.ar_lags.iter().enumerate() {
            if t > k {
                disturbance += a * self.disturbances[t - 1 - k];
            }
        }
        for (k, b) in self.ma_lags.iter().enumerate() {
            if t > k {
                disturbance += b * self.errors[t - 1 - k];
            }
        }

        let regression: f64 = self
            .exog_coefficients
            .iter()
            .zip(exog_next)
            .zip(&self.exog_tails)
            .map(|((beta, next), tail)| beta * self.difference_next(*next, tail))
            .sum();

        let differenced = self.intercept + regression + disturbance;
        let forecast = self.integrate_next(differenced);
        if !forecast.is_finite() {
            return Err(MathError::Convergence(format!(
                "{} produced a non-finite forecast",
                self.order
            )));
        }
        Ok(forecast)
    }

    /// Differenced value at `T + 1` given the raw value and the raw tail.
    fn difference_next(&self, next: f64, tail: &[f64]) -> f64 {
        let span = tail.len();
        self.differencing
            .iter()
            .enumerate()
            .map(|(lag, c)| if lag == 0 { c * next } else { c * tail[span - lag] })
            .sum()
    }

    /// Undo differencing: `y_{T+1} = w_{T+1} - sum_{l>=1} delta_l y_{T+1-l}`.
    fn integrate_next(&self, differenced: f64) -> f64 {
        let span = self.target_tail.len();
        let history: f64 = self
            .differencing
            .iter()
            .enumerate()
            .skip(1)
            .map(|(lag, c)| c * self.target_tail[span - lag])
            .sum();
        differenced - history
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn exog_coefficients(&self) -> &[f64] {
        &self.exog_coefficients
    }

    /// Residual variance of the conditional fit
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn seasonal_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| 4.0 + 2.0 * ((t % 12) as f64 * std::f64::consts::PI / 6.0).sin())
            .collect()
    }

    #[test]
    fn white_noise_order_forecasts_the_mean() {
        let target = vec![1.0, 3.0, 1.0, 3.0, 1.0, 3.0, 1.0, 3.0];
        let fit = SeasonalArimax::new(ModelOrder::new(0, 0, 0))
            .fit(&target, &[])
            .unwrap();

        assert_abs_diff_eq!(fit.forecast_next(&[]).unwrap(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn exogenous_regressor_drives_forecast() {
        let x: Vec<f64> = (0..40).map(|t| (t % 7) as f64).collect();
        let target: Vec<f64> = x.iter().map(|v| 1.0 + 2.0 * v).collect();
        let fit = SeasonalArimax::new(ModelOrder::new(0, 0, 0))
            .fit(&target, &[x])
            .unwrap();

        assert_abs_diff_eq!(fit.forecast_next(&[10.0]).unwrap(), 21.0, epsilon = 1e-3);
    }

    #[test]
    fn seasonal_ar_tracks_the_annual_cycle() {
        let target = seasonal_series(120);
        let order = ModelOrder::new(0, 0, 0).with_seasonal(1, 0, 0, 12);
        let fit = SeasonalArimax::new(order).fit(&target, &[]).unwrap();

        let expected = seasonal_series(121)[120];
        assert!((fit.forecast_next(&[]).unwrap() - expected).abs() < 0.5);
    }

    #[test]
    fn first_difference_extends_a_trend() {
        let target: Vec<f64> = (0..30).map(|t| 2.0 * t as f64).collect();
        let fit = SeasonalArimax::new(ModelOrder::new(0, 1, 0))
            .fit(&target, &[])
            .unwrap();

        assert_abs_diff_eq!(fit.forecast_next(&[]).unwrap(), 60.0, epsilon = 1e-4);
    }

    #[test]
    fn short_window_is_rejected() {
        let order = ModelOrder::new(1, 0, 1).with_seasonal(1, 0, 1, 12);
        let err = SeasonalArimax::new(order).fit(&[1.0; 10], &[]).unwrap_err();
        assert!(matches!(err, MathError::InsufficientData { .. }));
    }

    #[test]
    fn regressor_count_must_match_at_forecast_time() {
        let x: Vec<f64> = (0..20).map(|t| t as f64).collect();
        let fit = SeasonalArimax::new(ModelOrder::new(0, 0, 0))
            .fit(&x.clone(), &[x])
            .unwrap();
        assert!(fit.forecast_next(&[]).is_err());
    }

    #[test]
    fn seasonal_terms_need_a_period() {
        let order = ModelOrder::new(0, 0, 0).with_seasonal(1, 0, 0, 0);
        let err = SeasonalArimax::new(order).fit(&[1.0; 40], &[]).unwrap_err();
        assert!(matches!(err, MathError::InvalidInput(_)));
    }
}
