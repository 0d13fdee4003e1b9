//! Model training module
//!
//! Provides the classifier families compared on the stroke data:
//! - K-Nearest Neighbors
//! - Support Vector Machines (RBF kernel, SMO)
//! - Decision trees, Random Forests and AdaBoost stumps
//! - Gradient boosting
//! - Logistic regression
//! - Gaussian Naive Bayes
//!
//! plus the split / oversample / tune / rank engine and thresholded
//! cross-validation.

mod config;
mod engine;
mod models;
pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod naive_bayes;
pub mod random_forest;
pub mod svm;

pub use adaboost::AdaBoostClassifier;
pub use config::TrainingConfig;
pub use cross_validation::{cross_val_thresholds, CVSplit, CVStrategy, CrossValidator, CvOptions, CvSummary};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{
    tune_threshold, ExcludedModel, ModelArtifact, ModelEvaluation, SplitSummary, TrainEngine,
    TrainingReport,
};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use knn::{KNNClassifier, KNNConfig};
pub use linear_models::LogisticRegression;
pub use models::{
    apply_threshold, f_beta, roc_auc, Classifier, ConfusionMatrix, ModelKind, ModelMetrics,
};
pub use naive_bayes::GaussianNaiveBayes;
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::{KernelType, SVMClassifier, SVMConfig};

impl ModelKind {
    /// Unfitted classifier with its default hyperparameters
    pub fn build(&self, seed: u64) -> Box<dyn Classifier> {
        self.build_with_budget(seed, None)
    }

    /// Like [`ModelKind::build`], with the iterative models capped at `budget`
    pub fn build_with_budget(&self, seed: u64, budget: Option<usize>) -> Box<dyn Classifier> {
        match self {
            ModelKind::Knn => Box::new(KNNClassifier::new(KNNConfig::default())),
            ModelKind::Svm => {
                let defaults = SVMConfig::default();
                Box::new(SVMClassifier::new(SVMConfig {
                    random_state: seed,
                    max_iter: budget.unwrap_or(defaults.max_iter),
                    ..defaults
                }))
            }
            ModelKind::DecisionTree => Box::new(DecisionTree::new_classifier().with_seed(seed)),
            ModelKind::RandomForest => Box::new(RandomForest::new(100).with_random_state(seed)),
            ModelKind::AdaBoost => Box::new(AdaBoostClassifier::default()),
            ModelKind::GradientBoosting => {
                Box::new(GradientBoostingClassifier::new(GradientBoostingConfig {
                    random_state: seed,
                    ..Default::default()
                }))
            }
            ModelKind::LogisticRegression => match budget {
                Some(n) => Box::new(LogisticRegression::new().with_max_iter(n)),
                None => Box::new(LogisticRegression::new()),
            },
            ModelKind::NaiveBayes => Box::new(GaussianNaiveBayes::new()),
        }
    }
}
