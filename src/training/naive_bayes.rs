//! Gaussian Naive Bayes classifier

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

use super::models::Classifier;
use crate::error::{AnalysisError, Result};

/// Per-class Gaussian parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassStats {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Keyed by integer class label, iterated in ascending order
    classes: BTreeMap<i64, ClassStats>,
    /// Fraction of the largest feature variance added to every variance
    var_smoothing: f64,
    epsilon: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            classes: BTreeMap::new(),
            var_smoothing: 1e-9,
            epsilon: 0.0,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Class labels seen during fit
    pub fn classes(&self) -> Vec<i64> {
        self.classes.keys().copied().collect()
    }

    /// Normalized log posteriors, one column per class
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n_features = self
            .classes
            .values()
            .next()
            .map(|s| s.means.len())
            .ok_or(AnalysisError::ModelNotFitted)?;
        if x.ncols() != n_features {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} features", n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut log_probs = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (j, stats) in self.classes.values().enumerate() {
                let log_likelihood: f64 = row
                    .iter()
                    .zip(&stats.means)
                    .zip(&stats.variances)
                    .map(|((&xi, &mean), &var)| {
                        -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln())
                    })
                    .sum();
                log_probs[[i, j]] = stats.log_prior + log_likelihood;
            }
        }

        // log-sum-exp
        for mut row in log_probs.rows_mut() {
            let max_val = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let log_sum = row.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln();
            row.mapv_inplace(|v| v - max_val - log_sum);
        }

        Ok(log_probs)
    }

    /// Posterior probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_log_proba(x)?.mapv(f64::exp))
    }
}

impl Classifier for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AnalysisError::TrainingError(
                "Naive Bayes needs training rows".to_string(),
            ));
        }

        let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            by_class.entry(label.round() as i64).or_default().push(i);
        }

        let max_var = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .copied()
            .fold(0.0, f64::max);
        self.epsilon = self.var_smoothing * max_var;

        self.classes.clear();
        for (class, rows) in by_class {
            let subset = x.select(Axis(0), &rows);
            let means = subset
                .mean_axis(Axis(0))
                .ok_or_else(|| AnalysisError::TrainingError("empty class".to_string()))?;
            let variances = subset.var_axis(Axis(0), 0.0).mapv(|v| v + self.epsilon);
            if variances.iter().any(|&v| v <= 0.0) {
                return Err(AnalysisError::TrainingError(format!(
                    "Naive Bayes found zero variance in class {}",
                    class
                )));
            }

            self.classes.insert(
                class,
                ClassStats {
                    log_prior: (rows.len() as f64 / n_samples as f64).ln(),
                    means: means.to_vec(),
                    variances: variances.to_vec(),
                },
            );
        }

        Ok(())
    }

    /// Posterior probability of stroke (class 1)
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        match self.classes.keys().position(|&c| c == 1) {
            Some(col) => Ok(proba.column(col).to_owned()),
            None => Ok(Array1::zeros(x.nrows())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_gaussian_nb() {
        let x = array![
            [1.0, 2.0],
            [1.2, 1.8],
            [0.8, 2.2],
            [5.0, 6.0],
            [5.2, 5.8],
            [4.8, 6.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        assert_eq!(nb.classes(), vec![0, 1]);

        assert_eq!(nb.predict(&x).unwrap(), y);

        let proba = nb.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_priors_shift_scores() {
        // identical feature distributions, so the prior decides
        let x = array![[0.0], [1.0], [0.0], [1.0], [0.0], [1.0]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        let score = nb.score_samples(&array![[0.5]]).unwrap()[0];
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unfitted() {
        let nb = GaussianNaiveBayes::new();
        assert!(matches!(nb.score_samples(&array![[0.0]]), Err(AnalysisError::ModelNotFitted)));
    }
}
