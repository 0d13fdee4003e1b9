//! Support Vector Machine classifier
//!
//! Binary soft-margin SVM trained with SMO (maximal violating pair) over a precomputed
//! kernel matrix. Scores are decision margins; the natural cut-off is 0.

use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::Classifier;

/// Kernel function type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum KernelType {
    Linear,
    /// `None` picks `1 / (n_features * var(X))` at fit time
    RBF { gamma: Option<f64> },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: None }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub kernel: KernelType,
    /// Stop once the KKT gap is within this tolerance
    pub tol: f64,
    /// Maximum number of SMO pair updates
    pub max_iter: usize,
    /// Rows kept for the kernel matrix; larger inputs are subsampled
    pub max_samples: usize,
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 200_000,
            max_samples: 2500,
            random_state: 42,
        }
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    gamma: f64,
    support_vectors: Option<Array2<f64>>,
    /// alpha_i * y_i per support vector
    dual_coef: Option<Array1<f64>>,
    bias: f64,
}

impl Default for SVMClassifier {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            gamma: 1.0,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
        }
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }

    fn kernel(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self.config.kernel {
            KernelType::Linear => a.dot(&b),
            KernelType::RBF { .. } => {
                let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-self.gamma * sq).exp()
            }
        }
    }

    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut k = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let v = self.kernel(x.row(i), x.row(j));
                k[[i, j]] = v;
                k[[j, i]] = v;
            }
        }
        k
    }

    /// Seeded subsample keeping the class ratio
    fn subsample(&self, y: &Array1<f64>, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let n = y.len();
        if n <= self.config.max_samples {
            return (0..n).collect();
        }
        let mut pos: Vec<usize> = (0..n).filter(|&i| y[i] > 0.5).collect();
        let mut neg: Vec<usize> = (0..n).filter(|&i| y[i] <= 0.5).collect();
        let keep_pos = ((pos.len() * self.config.max_samples) as f64 / n as f64).round() as usize;
        let keep_pos = keep_pos.clamp(1, pos.len().max(1));
        let keep_neg = self.config.max_samples.saturating_sub(keep_pos).min(neg.len());

        pos.shuffle(rng);
        neg.shuffle(rng);
        pos.truncate(keep_pos);
        neg.truncate(keep_neg);
        let mut rows: Vec<usize> = pos.into_iter().chain(neg).collect();
        rows.sort_unstable();
        rows
    }

    /// SMO over labels in {-1, +1}; returns (alphas, bias).
    ///
    /// Each step updates the maximal violating pair and the run stops once
    /// the KKT gap `max_{I_up} -y G - min_{I_low} -y G` is within `tol`.
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>) -> Result<(Array1<f64>, f64)> {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = Array1::<f64>::zeros(n);
        // gradient of 1/2 a'Qa - e'a with Q_ij = y_i y_j K_ij
        let mut grad = Array1::<f64>::from_elem(n, -1.0);

        let in_up = |a: f64, yt: f64| (yt > 0.0 && a < c) || (yt < 0.0 && a > 0.0);
        let in_low = |a: f64, yt: f64| (yt < 0.0 && a < c) || (yt > 0.0 && a > 0.0);

        let mut iter = 0;
        loop {
            let mut i = None;
            let mut j = None;
            let mut g_max = f64::NEG_INFINITY;
            let mut g_min = f64::INFINITY;
            for t in 0..n {
                let v = -y[t] * grad[t];
                if in_up(alphas[t], y[t]) && v > g_max {
                    g_max = v;
                    i = Some(t);
                }
                if in_low(alphas[t], y[t]) && v < g_min {
                    g_min = v;
                    j = Some(t);
                }
            }

            let (i, j) = match (i, j) {
                (Some(i), Some(j)) if g_max - g_min > tol => (i, j),
                _ => break,
            };
            if iter >= self.config.max_iter {
                return Err(AnalysisError::ConvergenceError {
                    model: "SVM".to_string(),
                    iterations: iter,
                });
            }

            // move a_i by y_i * step and a_j by -y_j * step
            let quad = (k[[i, i]] + k[[j, j]] - 2.0 * k[[i, j]]).max(1e-12);
            let room_i = if y[i] > 0.0 { c - alphas[i] } else { alphas[i] };
            let room_j = if y[j] > 0.0 { alphas[j] } else { c - alphas[j] };
            let step = ((g_max - g_min) / quad).min(room_i).min(room_j);

            alphas[i] = (alphas[i] + y[i] * step).clamp(0.0, c);
            alphas[j] = (alphas[j] - y[j] * step).clamp(0.0, c);
            for t in 0..n {
                grad[t] += y[t] * step * (k[[t, i]] - k[[t, j]]);
            }
            iter += 1;
        }

        // free vectors satisfy b = -y_t G_t
        let free: Vec<f64> = (0..n)
            .filter(|&t| alphas[t] > 1e-8 && alphas[t] < c - 1e-8)
            .map(|t| -y[t] * grad[t])
            .collect();
        let bias = if free.is_empty() {
            let upper = (0..n)
                .filter(|&t| in_up(alphas[t], y[t]))
                .map(|t| -y[t] * grad[t])
                .fold(f64::NEG_INFINITY, f64::max);
            let lower = (0..n)
                .filter(|&t| in_low(alphas[t], y[t]))
                .map(|t| -y[t] * grad[t])
                .fold(f64::INFINITY, f64::min);
            if upper.is_finite() && lower.is_finite() {
                (upper + lower) / 2.0
            } else {
                0.0
            }
        } else {
            free.iter().sum::<f64>() / free.len() as f64
        };

        debug!(iterations = iter, "SMO converged");
        Ok((alphas, bias))
    }

    /// Signed distance-like margin per row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(AnalysisError::ModelNotFitted),
        };
        if x.ncols() != sv.ncols() {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            sv.rows()
                .into_iter()
                .zip(coef.iter())
                .map(|(s, &c)| c * self.kernel(row, s))
                .sum::<f64>()
                + self.bias
        })))
    }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        let n_pos = y.iter().filter(|&&v| v > 0.5).count();
        if n_pos == 0 || n_pos == y.len() {
            return Err(AnalysisError::TrainingError(
                "SVM requires both classes in the training data".to_string(),
            ));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let rows = self.subsample(y, &mut rng);
        let x_fit = x.select(Axis(0), &rows);
        let y_fit: Array1<f64> = rows.iter().map(|&i| if y[i] > 0.5 { 1.0 } else { -1.0 }).collect();

        self.gamma = match self.config.kernel {
            KernelType::RBF { gamma: Some(g) } => g,
            KernelType::RBF { gamma: None } => {
                let var = x_fit.var(0.0);
                let denom = x_fit.ncols() as f64 * var;
                if denom > 0.0 {
                    1.0 / denom
                } else {
                    1.0
                }
            }
            KernelType::Linear => 0.0,
        };

        let k = self.compute_kernel_matrix(&x_fit);
        let (alphas, bias) = self.smo_train(&k, &y_fit)?;

        let support: Vec<usize> = (0..alphas.len()).filter(|&i| alphas[i] > 1e-8).collect();
        self.support_vectors = Some(x_fit.select(Axis(0), &support));
        self.dual_coef = Some(support.iter().map(|&i| alphas[i] * y_fit[i]).collect());
        self.bias = bias;

        debug!(
            n_rows = rows.len(),
            n_support = support.len(),
            gamma = self.gamma,
            "SVM fitted"
        );
        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.decision_function(x)
    }

    fn decision_threshold(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_svm_separable() {
        let x = array![
            [-2.0, -2.0],
            [-1.5, -2.5],
            [-2.5, -1.0],
            [-1.0, -1.5],
            [2.0, 2.0],
            [1.5, 2.5],
            [2.5, 1.0],
            [1.0, 1.5],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let mut svm = SVMClassifier::default();
        svm.fit(&x, &y).unwrap();
        assert!(svm.n_support_vectors() > 0);

        assert_eq!(svm.predict(&x).unwrap(), y);
        let margins = svm.score_samples(&array![[-3.0, -3.0], [3.0, 3.0]]).unwrap();
        assert!(margins[0] < 0.0 && margins[1] > 0.0);
    }

    #[test]
    fn test_svm_converges_on_overlapping_classes() {
        let n = 1500;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let y = Array1::from_iter((0..n).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }));
        let x = Array2::from_shape_fn((n, 16), |(i, _)| y[i] * 0.3 + rng.gen_range(-1.0..1.0));

        let mut svm = SVMClassifier::default();
        svm.fit(&x, &y).unwrap();

        let predictions = svm.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / n as f64 > 0.75);
        assert!(svm.n_support_vectors() > 0 && svm.n_support_vectors() < n);
    }

    #[test]
    fn test_hitting_step_budget_is_a_convergence_error() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let y = Array1::from_iter((0..200).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }));
        let x = Array2::from_shape_fn((200, 4), |_| rng.gen_range(-1.0..1.0));

        let mut svm = SVMClassifier::new(SVMConfig {
            max_iter: 2,
            ..Default::default()
        });
        assert!(matches!(
            svm.fit(&x, &y),
            Err(AnalysisError::ConvergenceError { iterations: 2, .. })
        ));
    }

    #[test]
    fn test_subsample_keeps_both_classes() {
        let svm = SVMClassifier::new(SVMConfig {
            max_samples: 10,
            ..Default::default()
        });
        let y = Array1::from_iter((0..100).map(|i| if i % 10 == 0 { 1.0 } else { 0.0 }));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let rows = svm.subsample(&y, &mut rng);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows.iter().filter(|&&i| y[i] > 0.5).count(), 1);
    }

    #[test]
    fn test_single_class_rejected() {
        let mut svm = SVMClassifier::default();
        assert!(svm.fit(&array![[0.0], [1.0]], &array![1.0, 1.0]).is_err());
        assert!(matches!(svm.decision_function(&array![[0.0]]), Err(AnalysisError::ModelNotFitted)));
    }
}
