//! Cross-validation splits and thresholded cross-validation of classifiers

use super::models::{ModelKind, ModelMetrics};
use crate::error::{AnalysisError, Result};
use crate::synthetic::{labels_to_f64, labels_to_i64, Sampler, SMOTE};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold {
            n_splits: 5,
            shuffle: true,
        }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match *self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => {
                n_splits
            }
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate train/test splits
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(AnalysisError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(AnalysisError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        match self.strategy {
            CVStrategy::KFold { shuffle, .. } => Ok(self.k_fold_split(n_samples, n_splits, shuffle)),
            CVStrategy::StratifiedKFold { shuffle, .. } => {
                Ok(self.stratified_k_fold_split(y, n_splits, shuffle))
            }
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        splits
    }

    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round-robin, continuing where the last class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        (0..n_splits)
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].clone(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect()
    }
}

/// Fold-averaged metrics for one classifier at a fixed threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvSummary {
    pub model: ModelKind,
    pub threshold: f64,
    pub folds: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Mean of the per-fold `[[tn, fp], [fn, tp]]` matrices
    pub mean_confusion: [[f64; 2]; 2],
}

/// Options for [`cross_val_thresholds`]
#[derive(Debug, Clone)]
pub struct CvOptions {
    pub strategy: CVStrategy,
    pub smote_k: usize,
    pub sampling_strategy: f64,
    pub seed: u64,
    pub iteration_budget: Option<usize>,
}

/// K-fold evaluation of each classifier at its chosen threshold.
///
/// SMOTE is fitted on each training fold only; the held-out fold keeps its
/// natural class ratio. A model that fails on any fold is left out of the
/// result with a warning.
pub fn cross_val_thresholds(
    x: &Array2<f64>,
    y: &Array1<f64>,
    thresholds: &BTreeMap<ModelKind, f64>,
    options: &CvOptions,
) -> Result<Vec<CvSummary>> {
    let splits = CrossValidator::new(options.strategy)
        .with_random_state(options.seed)
        .split(y)?;

    let mut summaries = Vec::new();
    'models: for (&kind, &threshold) in thresholds {
        let mut fold_metrics: Vec<ModelMetrics> = Vec::with_capacity(splits.len());

        for split in &splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = labels_to_i64(&y.select(Axis(0), &split.train_indices));
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let fold = SMOTE::new()
                .with_k_neighbors(options.smote_k)
                .with_sampling_strategy(options.sampling_strategy)
                .with_seed(options.seed.wrapping_add(split.fold_idx as u64))
                .fit_resample(&x_train, &y_train)
                .and_then(|resampled| {
                    let mut model = kind.build_with_budget(options.seed, options.iteration_budget);
                    model.fit(&resampled.x, &labels_to_f64(&resampled.y))?;
                    model.score_samples(&x_test)
                });

            match fold {
                Ok(scores) => fold_metrics.push(ModelMetrics::evaluate(&y_test, &scores, threshold)),
                Err(e) => {
                    warn!(model = %kind, fold = split.fold_idx, error = %e, "Cross-validation skipped model");
                    continue 'models;
                }
            }
        }

        let n = fold_metrics.len() as f64;
        let mean = |f: fn(&ModelMetrics) -> f64| fold_metrics.iter().map(f).sum::<f64>() / n;
        let mut mean_confusion = [[0.0; 2]; 2];
        for m in &fold_metrics {
            for (r, row) in m.confusion.as_array().iter().enumerate() {
                for (c, &v) in row.iter().enumerate() {
                    mean_confusion[r][c] += v as f64 / n;
                }
            }
        }

        let summary = CvSummary {
            model: kind,
            threshold,
            folds: fold_metrics.len(),
            accuracy: mean(|m| m.accuracy),
            precision: mean(|m| m.precision),
            recall: mean(|m| m.recall),
            f1_score: mean(|m| m.f1_score),
            mean_confusion,
        };
        debug!(model = %kind, f1 = summary.f1_score, "Cross-validation finished");
        summaries.push(summary);
    }

    Ok(summaries)
}
