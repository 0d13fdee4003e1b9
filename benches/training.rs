use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use stroke_analysis::features::FeatureMatrix;
use stroke_analysis::synthetic::{Sampler, SMOTE};
use stroke_analysis::training::{ModelKind, TrainEngine, TrainingConfig};

/// Imbalanced data with roughly the stroke prevalence of the real dataset
fn create_imbalanced_data(n_rows: usize, n_features: usize) -> FeatureMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let y: Vec<f64> = (0..n_rows)
        .map(|_| if rng.gen_bool(0.05) { 1.0 } else { 0.0 })
        .collect();
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, _)| {
        y[i] * 1.5 + rng.gen::<f64>() * 2.0
    });

    FeatureMatrix {
        feature_names: (0..n_features).map(|i| format!("feature_{}", i)).collect(),
        x,
        y: Array1::from_vec(y),
        ids: (0..n_rows as i64).collect(),
    }
}

fn bench_smote(c: &mut Criterion) {
    let mut group = c.benchmark_group("smote");

    for n_rows in [1000, 4000].iter() {
        let data = create_imbalanced_data(*n_rows, 16);
        let labels = data.y.mapv(|v| v as i64);

        group.bench_with_input(BenchmarkId::new("fit_resample", n_rows), &data, |b, data| {
            b.iter(|| {
                SMOTE::new()
                    .with_seed(42)
                    .fit_resample(black_box(&data.x), &labels)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    let data = create_imbalanced_data(2000, 16);
    for kind in ModelKind::ALL {
        group.bench_with_input(BenchmarkId::new("model", kind.name()), &data, |b, data| {
            b.iter(|| {
                let mut model = kind.build(42);
                // SVM may stop on its step budget
                let _ = model.fit(black_box(&data.x), &data.y);
            })
        });
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.sample_size(10);

    let data = create_imbalanced_data(2000, 16);
    group.bench_function("run_without_cv", |b| {
        b.iter(|| {
            let config = TrainingConfig::default()
                .with_models(vec![
                    ModelKind::LogisticRegression,
                    ModelKind::NaiveBayes,
                    ModelKind::DecisionTree,
                ])
                .with_cv_folds(0);
            TrainEngine::new(config).run(black_box(&data)).unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_smote, bench_models, bench_engine);
criterion_main!(benches);
