//! Ordinary least squares with coefficient standard errors.
//!
//! Used by the augmented Dickey-Fuller regression, which needs the t-ratio of
//! a single coefficient and the log-likelihood for lag selection.

use crate::error::{AnomalyError, Result};

/// Fitted OLS regression.
#[derive(Debug, Clone)]
pub struct OLSResult {
    /// One coefficient per design-matrix column.
    pub coefficients: Vec<f64>,
    /// Standard error of each coefficient.
    pub std_errors: Vec<f64>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Number of observations.
    pub nobs: usize,
}

impl OLSResult {
    /// t-ratio of coefficient `i`.
    pub fn t_stat(&self, i: usize) -> f64 {
        self.coefficients[i] / self.std_errors[i]
    }

    /// Gaussian log-likelihood at the fitted coefficients.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -0.5 * n * ((2.0 * std::f64::consts::PI * self.rss / n).ln() + 1.0)
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.coefficients.len() as f64
    }
}

/// Fit `y = X β` where `rows[i]` is the i-th row of `X`.
///
/// Include a column of ones in `rows` for an intercept.
pub fn ols_fit(y: &[f64], rows: &[Vec<f64>]) -> Result<OLSResult> {
    let n = y.len();
    if rows.len() != n {
        return Err(AnomalyError::LengthMismatch {
            expected: n,
            got: rows.len(),
        });
    }
    let k = rows.first().map(|r| r.len()).unwrap_or(0);
    if k == 0 {
        return Err(AnomalyError::InvalidParameter(
            "design matrix has no columns".into(),
        ));
    }
    if n <= k {
        return Err(AnomalyError::InsufficientData {
            needed: k + 1,
            got: n,
        });
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in rows.iter().zip(y.iter()) {
        if row.len() != k {
            return Err(AnomalyError::LengthMismatch {
                expected: k,
                got: row.len(),
            });
        }
        for i in 0..k {
            xty[i] += row[i] * yi;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let chol = cholesky(&xtx).ok_or_else(|| {
        AnomalyError::InvalidParameter("OLS design matrix is singular".into())
    })?;
    let beta = chol_solve(&chol, &xty);

    let rss: f64 = rows
        .iter()
        .zip(y.iter())
        .map(|(row, &yi)| {
            let fitted: f64 = row.iter().zip(beta.iter()).map(|(x, b)| x * b).sum();
            (yi - fitted).powi(2)
        })
        .sum();
    let sigma_sq = rss / (n - k) as f64;

    // diag((X'X)^-1) column by column
    let std_errors = (0..k)
        .map(|i| {
            let mut e = vec![0.0; k];
            e[i] = 1.0;
            let col = chol_solve(&chol, &e);
            (sigma_sq * col[i]).max(0.0).sqrt()
        })
        .collect();

    Ok(OLSResult {
        coefficients: beta,
        std_errors,
        rss,
        nobs: n,
    })
}

/// Lower-triangular Cholesky factor, or `None` if not positive definite.
fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 1e-12 * a[i][i].abs().max(1.0) {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

/// Solve `L Lᵀ x = b`.
fn chol_solve(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i][k] * z[k];
        }
        z[i] = sum / l[i][i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[k][i] * x[k];
        }
        x[i] = sum / l[i][i];
    }
    x
}
