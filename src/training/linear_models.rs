//! Linear model implementations

use super::models::Classifier;
use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Returns None when the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// L2-regularized logistic regression fitted by Newton iterations.
///
/// Minimizes `0.5 * alpha * |w|^2 + sum(log_loss)`; the intercept is not
/// penalized. Failing to reach `tol` within `max_iter` steps is an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// Regularization strength (L2), the inverse of C
    pub alpha: f64,
    pub max_iter: usize,
    /// Convergence tolerance on the Newton step
    pub tol: f64,
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 1.0,
            max_iter: 100,
            tol: 1e-6,
            n_iter: 0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Newton steps taken by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Linear predictor `x . w + b`
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self.coefficients.as_ref().ok_or(AnalysisError::ModelNotFitted)?;
        if x.ncols() != coef.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} features", coef.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coef) + self.intercept.unwrap_or(0.0))
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.alpha < 0.0 {
            return Err(AnalysisError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }

        // Parameters are [w_0 .. w_{d-1}, b]
        let dim = n_features + 1;
        let mut theta = Array1::<f64>::zeros(dim);

        for iter in 0..self.max_iter {
            let w = theta.slice(ndarray::s![..n_features]);
            let b = theta[n_features];
            let p = (x.dot(&w) + b).mapv(sigmoid);
            let err = &p - y;

            let mut grad = Array1::<f64>::zeros(dim);
            grad.slice_mut(ndarray::s![..n_features])
                .assign(&(x.t().dot(&err) + &(self.alpha * &w)));
            grad[n_features] = err.sum();

            let mut hess = Array2::<f64>::zeros((dim, dim));
            for (row, &pi) in x.rows().into_iter().zip(p.iter()) {
                let s = (pi * (1.0 - pi)).max(1e-12);
                for a in 0..n_features {
                    let ra = s * row[a];
                    for c in 0..=a {
                        hess[[a, c]] += ra * row[c];
                    }
                    hess[[n_features, a]] += ra;
                }
                hess[[n_features, n_features]] += s;
            }
            for a in 0..dim {
                for c in 0..a {
                    hess[[c, a]] = hess[[a, c]];
                }
            }
            for a in 0..n_features {
                hess[[a, a]] += self.alpha;
            }

            let step = cholesky_solve(&hess, &grad).ok_or_else(|| {
                AnalysisError::TrainingError(
                    "Logistic regression Hessian is not positive definite".to_string(),
                )
            })?;
            theta -= &step;

            let step_norm = step.dot(&step).sqrt();
            if !step_norm.is_finite() {
                return Err(AnalysisError::TrainingError(
                    "Logistic regression diverged".to_string(),
                ));
            }
            if step_norm < self.tol {
                self.n_iter = iter + 1;
                self.coefficients = Some(theta.slice(ndarray::s![..n_features]).to_owned());
                self.intercept = Some(theta[n_features]);
                debug!(iterations = self.n_iter, "Logistic regression converged");
                return Ok(());
            }
        }

        Err(AnalysisError::ConvergenceError {
            model: "Logistic Regression".to_string(),
            iterations: self.max_iter,
        })
    }

    /// Predicted stroke probability
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Absolute coefficients, normalized to sum to one
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let abs = self.coefficients.as_ref()?.mapv(f64::abs);
        let total = abs.sum();
        Some(if total > 0.0 { abs / total } else { abs })
    }
}
