//! Decision tree implementation
//!
//! Binary classification trees (leaf value = weighted share of positives)
//! and regression trees (leaf value = weighted mean) built by a sorted sweep
//! over each candidate feature. Sample weights let AdaBoost reuse the same
//! splitter for its stumps.

use super::models::Classifier;
use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Weighted running sums for one side of a split
#[derive(Debug, Clone, Copy, Default)]
struct NodeStats {
    weight: f64,
    sum: f64,
    sq_sum: f64,
    count: usize,
}

impl NodeStats {
    fn add(&mut self, w: f64, y: f64) {
        self.weight += w;
        self.sum += w * y;
        self.sq_sum += w * y * y;
        self.count += 1;
    }

    fn remove(&mut self, w: f64, y: f64) {
        self.weight -= w;
        self.sum -= w * y;
        self.sq_sum -= w * y * y;
        self.count -= 1;
    }

    fn mean(&self) -> f64 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            0.0
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let p = self.mean();
        match criterion {
            Criterion::Gini => 2.0 * p * (1.0 - p),
            Criterion::Entropy => {
                let term = |q: f64| if q > 0.0 { -q * q.ln() } else { 0.0 };
                term(p) + term(1.0 - p)
            }
            Criterion::MSE => (self.sq_sum / self.weight - p * p).max(0.0),
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random per split; None considers all
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub seed: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            seed: 42,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Fit with uniform sample weights
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let weights = Array1::ones(y.len());
        self.fit_weighted(x, y, &weights)
    }

    /// Fit with per-sample weights
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &Array1<f64>,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() || n_samples != weights.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("y and weights of length {}", n_samples),
                actual: format!("y length {}, weights length {}", y.len(), weights.len()),
            });
        }
        if n_samples == 0 {
            return Err(AnalysisError::ValidationError(
                "Cannot fit a tree on zero samples".to_string(),
            ));
        }
        if self.is_classification && y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(AnalysisError::ValidationError(
                "Classification trees expect 0/1 labels".to_string(),
            ));
        }
        if (self.criterion == Criterion::MSE) == self.is_classification {
            return Err(AnalysisError::InvalidParameter {
                name: "criterion".to_string(),
                value: format!("{:?}", self.criterion),
                reason: "criterion does not match the tree task".to_string(),
            });
        }

        self.n_features = n_features;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, weights, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let mut stats = NodeStats::default();
        for &i in indices {
            stats.add(w[i], y[i]);
        }
        let n_samples = indices.len();
        let impurity = stats.impurity(self.criterion);
        let leaf = TreeNode::Leaf {
            value: stats.mean(),
            n_samples,
        };

        if n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12
        {
            return leaf;
        }

        let Some((feature_idx, threshold, gain)) = self.find_best_split(x, y, w, indices, &stats, rng)
        else {
            return leaf;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature_idx]] <= threshold);

        importances[feature_idx] += stats.weight * gain;

        let left = Box::new(self.build_tree(x, y, w, &left_idx, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, w, &right_idx, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Best (feature, threshold, impurity decrease) over the candidate features
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
        indices: &[usize],
        parent: &NodeStats,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let n_features = x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        if let Some(m) = self.max_features {
            if m < n_features {
                features.shuffle(rng);
                features.truncate(m);
                features.sort_unstable();
            }
        }

        let parent_impurity = parent.impurity(self.criterion);
        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted = indices.to_vec();

        for feature_idx in features {
            sorted.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            let mut left = NodeStats::default();
            let mut right = *parent;

            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                left.add(w[i], y[i]);
                right.remove(w[i], y[i]);

                let here = x[[i, feature_idx]];
                let next = x[[sorted[pos + 1], feature_idx]];
                if next <= here {
                    continue;
                }
                if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                    continue;
                }
                if left.weight <= 0.0 || right.weight <= 0.0 {
                    continue;
                }

                let child = (left.weight * left.impurity(self.criterion)
                    + right.weight * right.impurity(self.criterion))
                    / parent.weight;
                let gain = parent_impurity - child;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, (here + next) / 2.0, gain));
                }
            }
        }

        best
    }

    /// Leaf values for each row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(AnalysisError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(Array1::from_iter(
            x.rows().into_iter().map(|row| predict_sample(root, |j| row[j])),
        ))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, count_leaves)
    }
}

fn predict_sample(node: &TreeNode, value: impl Fn(usize) -> f64) -> f64 {
    let mut node = node;
    loop {
        match node {
            TreeNode::Leaf { value, .. } => return *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                node = if value(*feature_idx) <= *threshold { left } else { right };
            }
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 0,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTree::fit(self, x, y).map(|_| ())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_leaf_scores_are_fractions() {
        let x = array![[0.0], [0.0], [0.0], [1.0]];
        let y = array![0.0, 1.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        let scores = Classifier::score_samples(&tree, &array![[0.0], [1.0]]).unwrap();
        assert!((scores[0] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(scores[1], 1.0);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_weights_move_the_stump() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let weights = array![1.0, 10.0, 1.0, 1.0];
        let mut stump = DecisionTree::new_classifier().with_max_depth(1);
        stump.fit_weighted(&x, &y, &weights).unwrap();
        let pred = stump.predict(&array![[2.0]]).unwrap();
        assert!(pred[0] > 0.5);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let x = array![[1.0], [2.0]];
        let mut tree = DecisionTree::new_classifier();
        assert!(tree.fit(&x, &array![0.0, 2.0]).is_err());
        assert!(matches!(tree.predict(&x), Err(AnalysisError::ModelNotFitted)));
    }
}
