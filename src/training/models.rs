//! Classifier trait, model kinds and evaluation metrics

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary confusion matrix, positive class = stroke
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    /// `[[tn, fp], [fn, tp]]`
    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }
}

/// Metrics for one model on one split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// F-beta with beta = 2, weighting recall
    pub f2_score: f64,
    /// None when only one class is present
    pub auc_roc: Option<f64>,
    pub confusion: ConfusionMatrix,
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute classification metrics from hard predictions and optional scores
    pub fn compute_classification(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        y_score: Option<&Array1<f64>>,
    ) -> Self {
        let confusion = ConfusionMatrix::from_predictions(y_true, y_pred);
        let n = confusion.total();
        let (tp, fp, fn_) = (confusion.tp as f64, confusion.fp as f64, confusion.fn_ as f64);

        let accuracy = if n > 0 {
            (confusion.tp + confusion.tn) as f64 / n as f64
        } else {
            0.0
        };
        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };

        Self {
            accuracy,
            precision,
            recall,
            f1_score: f_beta(precision, recall, 1.0),
            f2_score: f_beta(precision, recall, 2.0),
            auc_roc: y_score.and_then(|s| roc_auc(y_true, s)),
            confusion,
            n_samples: n,
        }
    }

    /// Threshold scores, then compute metrics
    pub fn evaluate(y_true: &Array1<f64>, scores: &Array1<f64>, threshold: f64) -> Self {
        let y_pred = apply_threshold(scores, threshold);
        Self::compute_classification(y_true, &y_pred, Some(scores))
    }
}

/// F-beta score from precision and recall
pub fn f_beta(precision: f64, recall: f64, beta: f64) -> f64 {
    let b2 = beta * beta;
    let denom = b2 * precision + recall;
    if denom > 0.0 {
        (1.0 + b2) * precision * recall / denom
    } else {
        0.0
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] > 0.5 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Positive iff `score > threshold`
pub fn apply_threshold(scores: &Array1<f64>, threshold: f64) -> Array1<f64> {
    scores.mapv(|s| if s > threshold { 1.0 } else { 0.0 })
}

/// Binary classifier producing a continuous score where higher means stroke
pub trait Classifier: fmt::Debug + Send + Sync {
    /// Fit the model to training data with 0/1 labels
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Positive-class probability or decision margin
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Natural cut-off for `score_samples`
    fn decision_threshold(&self) -> f64 {
        0.5
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.score_samples(x)?;
        Ok(apply_threshold(&scores, self.decision_threshold()))
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Classifier families compared by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Knn,
    Svm,
    DecisionTree,
    RandomForest,
    AdaBoost,
    GradientBoosting,
    LogisticRegression,
    NaiveBayes,
}

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::Knn,
        ModelKind::Svm,
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::AdaBoost,
        ModelKind::GradientBoosting,
        ModelKind::LogisticRegression,
        ModelKind::NaiveBayes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Knn => "KNN",
            ModelKind::Svm => "SVM",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::AdaBoost => "AdaBoost",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::NaiveBayes => "Gaussian NB",
        }
    }

    /// Parse a CLI/config spelling
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace(['-', ' '], "_").as_str() {
            "knn" => Some(ModelKind::Knn),
            "svm" => Some(ModelKind::Svm),
            "decision_tree" | "tree" => Some(ModelKind::DecisionTree),
            "random_forest" | "forest" => Some(ModelKind::RandomForest),
            "adaboost" | "ada_boost" => Some(ModelKind::AdaBoost),
            "gradient_boosting" | "gbm" => Some(ModelKind::GradientBoosting),
            "logistic_regression" | "logistic" => Some(ModelKind::LogisticRegression),
            "naive_bayes" | "gaussian_nb" | "nb" => Some(ModelKind::NaiveBayes),
            _ => None,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let metrics = ModelMetrics::compute_classification(&y_true, &y_pred, None);

        assert_eq!(metrics.confusion.as_array(), [[3, 1], [1, 3]]);
        assert!((metrics.accuracy - 0.75).abs() < 1e-12);
        assert!((metrics.precision - 0.75).abs() < 1e-12);
        assert!((metrics.recall - 0.75).abs() < 1e-12);
        assert!((metrics.f1_score - 0.75).abs() < 1e-12);
        assert!(metrics.auc_roc.is_none());
    }

    #[test]
    fn test_f_beta_weights_recall() {
        // precision 0.2, recall 0.8
        let f1 = f_beta(0.2, 0.8, 1.0);
        let f2 = f_beta(0.2, 0.8, 2.0);
        assert!((f1 - 0.32).abs() < 1e-12);
        assert!((f2 - 0.5).abs() < 1e-12);
        assert_eq!(f_beta(0.0, 0.0, 2.0), 0.0);
    }

    #[test]
    fn test_roc_auc() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.1, 0.4, 0.35, 0.8]), Some(0.75));
        assert_eq!(roc_auc(&y, &array![0.1, 0.2, 0.3, 0.4]), Some(1.0));
        assert_eq!(roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&array![1.0, 1.0], &array![0.2, 0.3]), None);
    }

    #[test]
    fn test_evaluate_with_threshold() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let scores = array![0.1, 0.6, 0.7, 0.9];
        let strict = ModelMetrics::evaluate(&y, &scores, 0.65);
        assert_eq!(strict.confusion.fp, 0);
        let loose = ModelMetrics::evaluate(&y, &scores, 0.5);
        assert_eq!(loose.confusion.fp, 1);
        assert_eq!(loose.recall, 1.0);
    }

    #[test]
    fn test_score_at_threshold_is_negative() {
        let scores = array![0.545455, 0.545456, 0.2];
        assert_eq!(apply_threshold(&scores, 0.545455), array![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_model_kind_names() {
        assert_eq!(ModelKind::from_name("random-forest"), Some(ModelKind::RandomForest));
        assert_eq!(ModelKind::from_name("Gaussian NB"), Some(ModelKind::NaiveBayes));
        assert_eq!(ModelKind::from_name("perceptron"), None);
        assert_eq!(ModelKind::ALL.len(), 8);
    }
}
