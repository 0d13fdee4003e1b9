//! K-Nearest Neighbors classifier

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::models::Classifier;
use crate::error::{AnalysisError, Result};
use crate::imputation::{DistanceMetric, WeightScheme};

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier. Scores are the (weighted) share of
/// positive neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k.max(1),
            ..Default::default()
        })
    }

    /// Predict class probabilities `[P(0), P(1)]` per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let positive = self.score_samples(x)?;
        Ok(Array2::from_shape_fn((x.nrows(), 2), |(i, c)| {
            if c == 1 {
                positive[i]
            } else {
                1.0 - positive[i]
            }
        }))
    }
}

impl Classifier for KNNClassifier {
    /// Fit the classifier (stores training data)
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(AnalysisError::TrainingError("KNN needs training rows".to_string()));
        }
        self.x_train = Some(x.as_standard_layout().to_owned());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(AnalysisError::ModelNotFitted),
        };
        let k = self.config.n_neighbors.min(x_train.nrows());

        let mut scores = Vec::with_capacity(x.nrows());
        let mut buf = Vec::with_capacity(x.ncols());
        for row in x.rows() {
            buf.clear();
            buf.extend(row.iter().copied());
            let neighbors = find_k_nearest(&buf, x_train, y_train, k, self.config.metric);
            scores.push(positive_share(&neighbors, self.config.weights));
        }
        Ok(Array1::from_vec(scores))
    }
}

/// Max-heap entry keeping the k smallest (distance, index) pairs
#[derive(Debug, Clone, Copy)]
struct DistLabel(f64, usize, f64);

impl PartialEq for DistLabel {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then_with(|| self.1.cmp(&other.1))
    }
}

/// k nearest training rows as (distance, label)
fn find_k_nearest(
    point: &[f64],
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let dist = compute_distance(point, row.iter().copied(), metric);
        let candidate = DistLabel(dist, i, y_train[i]);
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    heap.into_sorted_vec().into_iter().map(|d| (d.0, d.2)).collect()
}

fn compute_distance(a: &[f64], b: impl Iterator<Item = f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
    }
}

fn positive_share(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let mut total = 0.0;
    let mut positive = 0.0;
    for &(dist, label) in neighbors {
        let w = match weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => 1.0 / (dist + 1e-10),
        };
        total += w;
        if label > 0.5 {
            positive += w;
        }
    }
    if total > 0.0 {
        positive / total
    } else {
        0.0
    }
}
