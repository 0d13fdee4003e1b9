//! Training engine: split, oversample, fit, tune and rank classifiers

use super::cross_validation::{cross_val_thresholds, CvOptions, CvSummary};
use super::models::{Classifier, ModelKind, ModelMetrics};
use super::TrainingConfig;
use crate::error::{AnalysisError, Result};
use crate::features::FeatureMatrix;
use crate::preprocessing::Scaler;
use crate::synthetic::{labels_to_f64, labels_to_i64, Sampler, SMOTE};
use ndarray::{concatenate, Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sizes and class ratios of the three splits
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub n_train: usize,
    pub n_validation: usize,
    pub n_test: usize,
    /// Training rows after oversampling
    pub n_train_resampled: usize,
    pub n_synthetic: usize,
    pub train_positive_rate: f64,
    pub train_positive_rate_resampled: f64,
    pub validation_positive_rate: f64,
    pub test_positive_rate: f64,
}

/// A classifier left out of the comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedModel {
    pub model: ModelKind,
    pub reason: String,
}

/// How one classifier did on every split
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEvaluation {
    pub model: ModelKind,
    pub threshold: f64,
    /// Whether the threshold came from validation tuning
    pub threshold_tuned: bool,
    pub train_f1: f64,
    pub validation: ModelMetrics,
    pub test: ModelMetrics,
    /// Feature name and normalized importance, largest first
    pub feature_importances: Option<Vec<(String, f64)>>,
    pub fit_seconds: f64,
}

/// The selected classifier with everything needed to score new rows
#[derive(Debug)]
pub struct ModelArtifact {
    pub evaluation: ModelEvaluation,
    pub feature_names: Vec<String>,
    pub scaler: Scaler,
    pub model: Box<dyn Classifier>,
}

impl ModelArtifact {
    /// Scores for unscaled feature rows
    pub fn score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.score_samples(&self.scaler.transform(x)?)
    }

    /// 0/1 predictions at the selected threshold
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(super::apply_threshold(&self.score(x)?, self.evaluation.threshold))
    }
}

/// Outcome of a training run
#[derive(Debug, Serialize)]
pub struct TrainingReport {
    pub split: SplitSummary,
    /// Sorted best first
    pub comparisons: Vec<ModelEvaluation>,
    pub excluded: Vec<ExcludedModel>,
    pub cv: Vec<CvSummary>,
    #[serde(skip)]
    pub best: Option<ModelArtifact>,
}

impl TrainingReport {
    pub fn best_model(&self) -> Option<ModelKind> {
        self.comparisons.first().map(|e| e.model)
    }

    pub fn evaluation(&self, kind: ModelKind) -> Option<&ModelEvaluation> {
        self.comparisons.iter().find(|e| e.model == kind)
    }
}

/// Row indices of each split
struct SplitIndices {
    train: Vec<usize>,
    validation: Vec<usize>,
    test: Vec<usize>,
}

fn positive_rate(y: &Array1<f64>) -> f64 {
    if y.is_empty() {
        0.0
    } else {
        y.iter().filter(|&&v| v > 0.5).count() as f64 / y.len() as f64
    }
}

/// Threshold maximizing F1 on held-out scores; ties go to the lower value.
///
/// Candidates are midpoints between consecutive distinct scores plus one
/// point half a gap below the smallest score, so that every row can be
/// called positive. Returns None when every score is identical.
pub fn tune_threshold(y_true: &Array1<f64>, scores: &Array1<f64>) -> Option<f64> {
    let mut distinct: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() < 2 {
        return None;
    }

    let below_min = distinct[0] - (distinct[1] - distinct[0]) / 2.0;
    let candidates = std::iter::once(below_min)
        .chain(distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0));

    let mut best: Option<(f64, f64)> = None;
    for t in candidates {
        let f1 = ModelMetrics::evaluate(y_true, scores, t).f1_score;
        if best.map_or(true, |(_, best_f1)| f1 > best_f1) {
            best = Some((t, f1));
        }
    }
    best.map(|(t, _)| t)
}

/// Ranking: validation F1, then validation recall, then model order
fn compare_evaluations(a: &ModelEvaluation, b: &ModelEvaluation) -> Ordering {
    b.validation
        .f1_score
        .total_cmp(&a.validation.f1_score)
        .then_with(|| b.validation.recall.total_cmp(&a.validation.recall))
        .then_with(|| a.model.cmp(&b.model))
}

/// Main training engine
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
}

impl TrainEngine {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Seeded stratified train/validation/test split
    fn stratified_split(&self, y: &Array1<f64>) -> Result<SplitIndices> {
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            class_indices.entry(label.round() as i64).or_default().push(i);
        }
        if class_indices.len() < 2 {
            return Err(AnalysisError::TrainingError(
                "training data needs both stroke and non-stroke records".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut split = SplitIndices {
            train: Vec::new(),
            validation: Vec::new(),
            test: Vec::new(),
        };

        for (class, indices) in class_indices.iter_mut() {
            let n = indices.len();
            if n < 4 {
                return Err(AnalysisError::TrainingError(format!(
                    "class {} has {} records; at least 4 are needed to split",
                    class, n
                )));
            }
            indices.shuffle(&mut rng);

            let n_test = ((n as f64 * self.config.test_split).round() as usize).max(1);
            let n_val = ((n as f64 * self.config.validation_split).round() as usize).max(1);
            let n_test = n_test.min(n - 2);
            let n_val = n_val.min(n - n_test - 2);

            split.test.extend_from_slice(&indices[..n_test]);
            split.validation.extend_from_slice(&indices[n_test..n_test + n_val]);
            split.train.extend_from_slice(&indices[n_test + n_val..]);
        }

        split.train.sort_unstable();
        split.validation.sort_unstable();
        split.test.sort_unstable();
        Ok(split)
    }

    /// Run the full comparison on a feature matrix
    pub fn run(&self, data: &FeatureMatrix) -> Result<TrainingReport> {
        self.config.validate()?;
        let start = Instant::now();

        let split = self.stratified_split(&data.y)?;
        let x_train_raw = data.x.select(Axis(0), &split.train);
        let y_train = data.y.select(Axis(0), &split.train);
        let x_val_raw = data.x.select(Axis(0), &split.validation);
        let y_val = data.y.select(Axis(0), &split.validation);
        let x_test_raw = data.x.select(Axis(0), &split.test);
        let y_test = data.y.select(Axis(0), &split.test);

        let mut scaler = Scaler::new(self.config.scaler);
        let x_train = scaler.fit_transform(&x_train_raw)?;
        let x_val = scaler.transform(&x_val_raw)?;
        let x_test = scaler.transform(&x_test_raw)?;

        // Oversample the training split only
        let resampled = SMOTE::new()
            .with_k_neighbors(self.config.smote_k)
            .with_sampling_strategy(self.config.sampling_strategy)
            .with_seed(self.config.seed)
            .fit_resample(&x_train, &labels_to_i64(&y_train))?;
        let x_fit = resampled.x;
        let y_fit = labels_to_f64(&resampled.y);

        let split_summary = SplitSummary {
            n_train: split.train.len(),
            n_validation: split.validation.len(),
            n_test: split.test.len(),
            n_train_resampled: x_fit.nrows(),
            n_synthetic: resampled.n_synthetic.values().sum(),
            train_positive_rate: positive_rate(&y_train),
            train_positive_rate_resampled: positive_rate(&y_fit),
            validation_positive_rate: positive_rate(&y_val),
            test_positive_rate: positive_rate(&y_test),
        };
        info!(
            train = split_summary.n_train,
            validation = split_summary.n_validation,
            test = split_summary.n_test,
            synthetic = split_summary.n_synthetic,
            "Split and oversampled data"
        );

        let mut evaluations = Vec::new();
        let mut excluded = Vec::new();
        let mut fitted: BTreeMap<ModelKind, Box<dyn Classifier>> = BTreeMap::new();

        for &kind in &self.config.models {
            let fit_start = Instant::now();
            let mut model = kind.build_with_budget(self.config.seed, self.config.iteration_budget);

            let outcome = model.fit(&x_fit, &y_fit).and_then(|_| {
                Ok((
                    model.score_samples(&x_fit)?,
                    model.score_samples(&x_val)?,
                    model.score_samples(&x_test)?,
                ))
            });
            let (train_scores, val_scores, test_scores) = match outcome {
                Ok(scores) => scores,
                Err(e) => {
                    warn!(model = %kind, error = %e, "Excluding model from comparison");
                    excluded.push(ExcludedModel {
                        model: kind,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let fit_seconds = fit_start.elapsed().as_secs_f64();

            let (threshold, threshold_tuned) = match self.config.threshold_overrides.get(&kind) {
                Some(&t) => (t, false),
                None if self.config.tune_thresholds => match tune_threshold(&y_val, &val_scores) {
                    Some(t) => (t, true),
                    None => (model.decision_threshold(), false),
                },
                None => (model.decision_threshold(), false),
            };

            let feature_importances = model.feature_importances().map(|imp| {
                let mut pairs: Vec<(String, f64)> = data
                    .feature_names
                    .iter()
                    .cloned()
                    .zip(imp.iter().copied())
                    .collect();
                pairs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                pairs
            });

            let evaluation = ModelEvaluation {
                model: kind,
                threshold,
                threshold_tuned,
                train_f1: ModelMetrics::evaluate(&y_fit, &train_scores, threshold).f1_score,
                validation: ModelMetrics::evaluate(&y_val, &val_scores, threshold),
                test: ModelMetrics::evaluate(&y_test, &test_scores, threshold),
                feature_importances,
                fit_seconds,
            };
            info!(
                model = %kind,
                threshold,
                val_f1 = evaluation.validation.f1_score,
                test_f1 = evaluation.test.f1_score,
                secs = fit_seconds,
                "Evaluated model"
            );

            evaluations.push(evaluation);
            fitted.insert(kind, model);
        }

        evaluations.sort_by(compare_evaluations);

        let best = match evaluations.first() {
            Some(top) => fitted.remove(&top.model).map(|model| ModelArtifact {
                evaluation: top.clone(),
                feature_names: data.feature_names.clone(),
                scaler: scaler.clone(),
                model,
            }),
            None => {
                warn!("Every model was excluded; no best model");
                None
            }
        };

        let cv = if self.config.cv_folds >= 2 && !evaluations.is_empty() {
            let x_cv = concatenate(Axis(0), &[x_train.view(), x_val.view()])?;
            let y_cv = concatenate(Axis(0), &[y_train.view(), y_val.view()])?;
            let thresholds: BTreeMap<ModelKind, f64> =
                evaluations.iter().map(|e| (e.model, e.threshold)).collect();
            let options = CvOptions {
                strategy: self.config.cv_strategy(),
                smote_k: self.config.smote_k,
                sampling_strategy: self.config.sampling_strategy,
                seed: self.config.seed,
                iteration_budget: self.config.iteration_budget,
            };
            match cross_val_thresholds(&x_cv, &y_cv, &thresholds, &options) {
                Ok(summaries) => summaries,
                Err(e) => {
                    warn!(error = %e, "Cross-validation failed");
                    Vec::new()
                }
            }
        } else {
            debug!("Cross-validation disabled");
            Vec::new()
        };

        info!(
            best = ?best.as_ref().map(|b| b.evaluation.model.name()),
            excluded = excluded.len(),
            secs = start.elapsed().as_secs_f64(),
            "Training finished"
        );

        Ok(TrainingReport {
            split: split_summary,
            comparisons: evaluations,
            excluded,
            cv,
            best,
        })
    }
}
