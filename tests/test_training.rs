//! Integration test: classifiers, threshold tuning and the training engine

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use stroke_analysis::features::FeatureMatrix;
use stroke_analysis::training::{
    cross_val_thresholds, tune_threshold, Classifier, CvOptions, CVStrategy, ModelKind,
    ModelMetrics, TrainEngine, TrainingConfig,
};

/// Two blobs separable on every feature; every `positive_every`-th row is positive
fn blobs(n: usize, n_features: usize, positive_every: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(n * n_features);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let positive = i % positive_every == 0;
        let center = if positive { 3.0 } else { 0.0 };
        for _ in 0..n_features {
            data.push(center + rng.gen_range(-1.0..1.0));
        }
        labels.push(if positive { 1.0 } else { 0.0 });
    }
    (
        Array2::from_shape_vec((n, n_features), data).unwrap(),
        Array1::from_vec(labels),
    )
}

fn feature_matrix(n: usize, positive_every: usize) -> FeatureMatrix {
    let (x, y) = blobs(n, 4, positive_every, 11);
    FeatureMatrix {
        feature_names: (0..4).map(|i| format!("f{}", i)).collect(),
        x,
        y,
        ids: (0..n as i64).collect(),
    }
}

#[test]
fn test_every_model_separates_blobs() {
    let (x, y) = blobs(120, 4, 2, 5);
    for kind in ModelKind::ALL {
        let mut model = kind.build(42);
        if let Err(e) = model.fit(&x, &y) {
            panic!("{} failed: {}", kind, e);
        }
        let scores = model.score_samples(&x).unwrap();
        assert_eq!(scores.len(), 120);

        let metrics = ModelMetrics::evaluate(&y, &scores, model.decision_threshold());
        assert!(metrics.accuracy >= 0.95, "{} accuracy {}", kind, metrics.accuracy);
        assert_eq!(model.predict(&x).unwrap().len(), 120);
    }
}

#[test]
fn test_tree_models_report_importances() {
    let (x, y) = blobs(80, 4, 2, 6);
    for kind in [ModelKind::DecisionTree, ModelKind::RandomForest, ModelKind::GradientBoosting] {
        let mut model = kind.build(1);
        model.fit(&x, &y).unwrap();
        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 4);
        assert!((importances.sum() - 1.0).abs() < 1e-9, "{}", kind);
    }
    let mut knn = ModelKind::Knn.build(1);
    knn.fit(&x, &y).unwrap();
    assert!(knn.feature_importances().is_none());
}

#[test]
fn test_unfitted_models_refuse_to_score() {
    let (x, _) = blobs(10, 4, 2, 7);
    for kind in ModelKind::ALL {
        assert!(kind.build(0).score_samples(&x).is_err(), "{}", kind);
    }
}

#[test]
fn test_tuned_threshold_beats_default_on_skewed_scores() {
    // every positive scores in [0.3, 0.45], below the default cut
    let y = Array1::from_iter((0..40).map(|i| if i % 4 == 0 { 1.0 } else { 0.0 }));
    let scores = Array1::from_iter((0..40).map(|i| {
        if i % 4 == 0 {
            0.3 + (i as f64) * 0.003
        } else {
            0.2 * (i as f64) / 40.0
        }
    }));
    let default = ModelMetrics::evaluate(&y, &scores, 0.5);
    let t = tune_threshold(&y, &scores).unwrap();
    let tuned = ModelMetrics::evaluate(&y, &scores, t);

    assert_eq!(default.f1_score, 0.0);
    assert_eq!(tuned.f1_score, 1.0);
    assert!(t > 0.2 && t < 0.3);
}

#[test]
fn test_engine_compares_all_models() {
    let data = feature_matrix(300, 10);
    let config = TrainingConfig::default().with_cv_folds(3);
    let report = TrainEngine::new(config).run(&data).unwrap();

    assert_eq!(report.comparisons.len() + report.excluded.len(), ModelKind::ALL.len());
    assert!(report.cv.len() <= report.comparisons.len());

    for pair in report.comparisons.windows(2) {
        assert!(pair[0].validation.f1_score >= pair[1].validation.f1_score);
    }
    let best = report.best.as_ref().unwrap();
    assert_eq!(best.evaluation.model, report.comparisons[0].model);
    assert!(best.evaluation.test.f1_score > 0.9);

    let predictions = best.predict(&data.x).unwrap();
    let accuracy = predictions
        .iter()
        .zip(data.y.iter())
        .filter(|(p, t)| p == t)
        .count() as f64
        / data.n_samples() as f64;
    assert!(accuracy > 0.95);
}

#[test]
fn test_engine_keeps_held_out_ratios() {
    let data = feature_matrix(300, 10);
    let config = TrainingConfig::default()
        .with_models(vec![ModelKind::NaiveBayes])
        .with_cv_folds(0);
    let report = TrainEngine::new(config).run(&data).unwrap();

    // 30 positives: 6 test, 6 validation, 18 train; 270 negatives: 54, 54, 162
    let split = &report.split;
    assert_eq!((split.n_train, split.n_validation, split.n_test), (180, 60, 60));
    assert!((split.validation_positive_rate - 0.1).abs() < 1e-12);
    assert!((split.test_positive_rate - 0.1).abs() < 1e-12);
    assert!((split.train_positive_rate - 0.1).abs() < 1e-12);
    assert!((split.train_positive_rate_resampled - 0.5).abs() < 1e-12);
    assert_eq!(split.n_synthetic, 144);
}

#[test]
fn test_engine_is_deterministic() {
    let data = feature_matrix(200, 8);
    let config = TrainingConfig::default()
        .with_models(vec![ModelKind::RandomForest, ModelKind::GradientBoosting, ModelKind::Svm])
        .with_cv_folds(0);
    let a = TrainEngine::new(config.clone()).run(&data).unwrap();
    let b = TrainEngine::new(config).run(&data).unwrap();

    let summary = |r: &stroke_analysis::training::TrainingReport| {
        r.comparisons
            .iter()
            .map(|e| (e.model, e.threshold, e.validation.clone(), e.test.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&a), summary(&b));
}

#[test]
fn test_cross_val_thresholds() {
    let (x, y) = blobs(150, 3, 5, 9);
    let thresholds: BTreeMap<ModelKind, f64> =
        [(ModelKind::NaiveBayes, 0.5), (ModelKind::Knn, 0.5)].into_iter().collect();
    let options = CvOptions {
        strategy: CVStrategy::StratifiedKFold {
            n_splits: 5,
            shuffle: true,
        },
        smote_k: 5,
        sampling_strategy: 1.0,
        seed: 42,
        iteration_budget: None,
    };
    let summaries = cross_val_thresholds(&x, &y, &thresholds, &options).unwrap();

    assert_eq!(summaries.len(), 2);
    // ascending model order
    assert_eq!(summaries[0].model, ModelKind::Knn);
    for s in &summaries {
        assert_eq!(s.folds, 5);
        assert!(s.f1_score > 0.9);
        let total: f64 = s.mean_confusion.iter().flatten().sum();
        assert!((total - 30.0).abs() < 1e-9);
    }
}
