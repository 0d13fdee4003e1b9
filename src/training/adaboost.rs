//! AdaBoost (Adaptive Boosting) implementation
//!
//! Binary SAMME over weighted decision stumps. Misclassified samples gain
//! weight each round; the score of a row is the alpha-weighted share of
//! stumps voting stroke.

use super::decision_tree::DecisionTree;
use super::models::Classifier;
use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// AdaBoost Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Number of boosting rounds actually kept
    pub fn n_rounds(&self) -> usize {
        self.stumps.len()
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.learning_rate <= 0.0 {
            return Err(AnalysisError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples.max(1) as f64);
        self.stumps.clear();
        self.alphas.clear();

        for round in 0..self.n_estimators {
            let mut stump = DecisionTree::new_classifier().with_max_depth(1);
            stump.fit_weighted(x, y, &weights)?;
            let predictions = stump.predict(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });

            let missed: Vec<bool> = predictions
                .iter()
                .zip(y.iter())
                .map(|(p, t)| (p - t).abs() > 0.5)
                .collect();
            let error: f64 = weights
                .iter()
                .zip(&missed)
                .filter(|(_, &m)| m)
                .map(|(w, _)| w)
                .sum::<f64>()
                / weights.sum();

            if error <= 1e-12 {
                // A perfect stump decides alone
                self.stumps.push(stump);
                self.alphas.push(1.0);
                debug!(round, "AdaBoost found a perfect stump");
                break;
            }
            if error >= 0.5 {
                if self.stumps.is_empty() {
                    return Err(AnalysisError::TrainingError(
                        "AdaBoost weak learner is no better than chance".to_string(),
                    ));
                }
                debug!(round, error, "AdaBoost stopped early");
                break;
            }

            let alpha = self.learning_rate * ((1.0 - error) / error).ln();
            for (w, &m) in weights.iter_mut().zip(&missed) {
                if m {
                    *w *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            weights /= w_sum;

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.stumps.is_empty() {
            return Err(AnalysisError::ModelNotFitted);
        }

        let total_alpha: f64 = self.alphas.iter().sum();
        let mut positive = Array1::zeros(x.nrows());
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            let votes = stump.predict(x)?;
            positive.zip_mut_with(&votes, |acc: &mut f64, &v| {
                if v >= 0.5 {
                    *acc += alpha;
                }
            });
        }
        Ok(positive / total_alpha)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        let first = self.stumps.first()?.feature_importances()?;
        let mut total = Array1::<f64>::zeros(first.len());
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            if let Some(imp) = stump.feature_importances() {
                total.scaled_add(alpha, imp);
            }
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_adaboost_interval_problem() {
        // No single stump separates the middle band
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0], [9.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];

        let mut ada = AdaBoostClassifier::new(30, 1.0);
        ada.fit(&x, &y).unwrap();
        assert!(ada.n_rounds() > 1);

        let pred = ada.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 8, "only {} correct", correct);
    }

    #[test]
    fn test_perfect_stump_stops() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut ada = AdaBoostClassifier::default();
        ada.fit(&x, &y).unwrap();
        assert_eq!(ada.n_rounds(), 1);
        assert_eq!(ada.score_samples(&x).unwrap(), y);
    }

    #[test]
    fn test_unfitted() {
        let ada = AdaBoostClassifier::default();
        assert!(matches!(ada.score_samples(&array![[0.0]]), Err(AnalysisError::ModelNotFitted)));
    }
}
