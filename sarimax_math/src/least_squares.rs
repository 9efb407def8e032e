//! Ordinary least squares with an intercept, solved through the normal equations

use crate::{MathError, Result};

/// Fit `y = b0 + b1 * x1 + ... + bk * xk` and return `[b0, b1, ..., bk]`.
///
/// `columns` holds one regressor per entry, each of the same length as `y`.
/// With no regressors the result is the mean of `y`.
pub fn ols_with_intercept(y: &[f64], columns: &[Vec<f64>]) -> Result<Vec<f64>> {
    let n = y.len();
    if n == 0 {
        return Err(MathError::InsufficientData { needed: 1, got: 0 });
    }
    for column in columns {
        if column.len() != n {
            return Err(MathError::DimensionMismatch {
                expected: n,
                got: column.len(),
            });
        }
    }

    let k = columns.len() + 1;
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    let mut row = vec![1.0; k];

    for t in 0..n {
        for (j, column) in columns.iter().enumerate() {
            row[j + 1] = column[t];
        }
        for i in 0..k {
            xty[i] += row[i] * y[t];
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    // Ridge term keeps collinear regressor sets solvable.
    for (i, r) in xtx.iter_mut().enumerate() {
        r[i] += 1e-8;
    }

    cholesky_solve(&xtx, &xty).ok_or_else(|| {
        MathError::InvalidInput("normal equations are not positive definite".to_string())
    })
}

/// Solve `a * x = b` for symmetric positive definite `a`.
pub fn cholesky_solve(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * z[j];
        }
        z[i] = sum / l[i][i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}
