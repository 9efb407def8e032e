//! Lag polynomial helpers
//!
//! Polynomials are stored as coefficient vectors indexed by lag, so
//! `[1.0, -0.5]` is `1 - 0.5L`.

/// Multiply two lag polynomials.
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Build `1 + sign * (c1 L^step + c2 L^(2 step) + ...)`.
pub fn lag_polynomial(coefficients: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

/// The differencing operator `(1 - L)^d (1 - L^m)^D`.
pub fn differencing(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    if period > 0 {
        for _ in 0..seasonal_d {
            poly = multiply(&poly, &lag_polynomial(&[1.0], period, -1.0));
        }
    }
    poly
}

/// Apply a lag polynomial to a series; the first `poly.len() - 1` values
/// have no complete history and are dropped.
pub fn apply(poly: &[f64], series: &[f64]) -> Vec<f64> {
    let span = poly.len().saturating_sub(1);
    if series.len() <= span {
        return Vec::new();
    }
    (span..series.len())
        .map(|t| {
            poly.iter()
                .enumerate()
                .map(|(lag, c)| c * series[t - lag])
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seasonal_and_regular_differencing_combine() {
        let poly = differencing(1, 1, 4);
        // (1 - L)(1 - L^4) = 1 - L - L^4 + L^5
        assert_eq!(poly, vec![1.0, -1.0, 0.0, 0.0, -1.0, 1.0]);
    }

    #[test]
    fn first_difference_of_a_line_is_constant() {
        let series = [1.0, 3.0, 5.0, 7.0];
        assert_eq!(apply(&differencing(1, 0, 12), &series), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn identity_operator_keeps_series() {
        let series = [4.0, 2.0];
        assert_eq!(apply(&differencing(0, 0, 12), &series), series.to_vec());
    }

    #[test]
    fn seasonal_polynomial_places_coefficients_on_multiples() {
        assert_eq!(lag_polynomial(&[0.5, 0.25], 2, -1.0), vec![1.0, 0.0, -0.5, 0.0, -0.25]);
    }
}
