//! Training configuration

use super::cross_validation::CVStrategy;
use super::models::ModelKind;
use crate::error::{AnalysisError, Result};
use crate::preprocessing::ScalerType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for the model comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of rows held out for threshold tuning and model selection
    pub validation_split: f64,
    /// Share of rows held out for the final comparison
    pub test_split: f64,
    /// Folds for thresholded cross-validation; below 2 disables it
    pub cv_folds: usize,
    pub smote_k: usize,
    /// Minority size relative to the majority after SMOTE
    pub sampling_strategy: f64,
    /// Tune each model's threshold on the validation split
    pub tune_thresholds: bool,
    /// Fixed thresholds that win over tuning
    pub threshold_overrides: BTreeMap<ModelKind, f64>,
    /// Classifiers to compare, in tie-break order
    pub models: Vec<ModelKind>,
    pub scaler: ScalerType,
    pub seed: u64,
    /// Iteration cap for logistic regression and SMO steps for the SVM;
    /// `None` keeps each model's default
    pub iteration_budget: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            validation_split: 0.2,
            test_split: 0.2,
            cv_folds: 5,
            smote_k: 5,
            sampling_strategy: 1.0,
            tune_thresholds: true,
            threshold_overrides: BTreeMap::new(),
            models: ModelKind::ALL.to_vec(),
            scaler: ScalerType::Standard,
            seed: 42,
            iteration_budget: None,
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_splits(mut self, validation: f64, test: f64) -> Self {
        self.validation_split = validation;
        self.test_split = test;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_smote_k(mut self, k: usize) -> Self {
        self.smote_k = k;
        self
    }

    pub fn with_tune_thresholds(mut self, tune: bool) -> Self {
        self.tune_thresholds = tune;
        self
    }

    pub fn with_threshold(mut self, model: ModelKind, threshold: f64) -> Self {
        self.threshold_overrides.insert(model, threshold);
        self
    }

    pub fn with_models(mut self, models: Vec<ModelKind>) -> Self {
        self.models = models;
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_iteration_budget(mut self, budget: usize) -> Self {
        self.iteration_budget = Some(budget);
        self
    }

    /// Stratified folds over train+validation, seeded like the split
    pub fn cv_strategy(&self) -> CVStrategy {
        CVStrategy::StratifiedKFold {
            n_splits: self.cv_folds,
            shuffle: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let valid_share = |v: f64| v > 0.0 && v < 1.0;
        if !valid_share(self.validation_split) || !valid_share(self.test_split) {
            return Err(AnalysisError::ConfigError(format!(
                "split shares must be in (0, 1), got validation {} and test {}",
                self.validation_split, self.test_split
            )));
        }
        if self.validation_split + self.test_split >= 1.0 {
            return Err(AnalysisError::ConfigError(
                "validation and test shares leave no training data".to_string(),
            ));
        }
        if self.smote_k == 0 {
            return Err(AnalysisError::ConfigError("smote_k must be at least 1".to_string()));
        }
        if !(self.sampling_strategy > 0.0 && self.sampling_strategy <= 1.0) {
            return Err(AnalysisError::ConfigError(format!(
                "sampling_strategy must be in (0, 1], got {}",
                self.sampling_strategy
            )));
        }
        if self.iteration_budget == Some(0) {
            return Err(AnalysisError::ConfigError(
                "iteration_budget must be at least 1".to_string(),
            ));
        }
        if self.models.is_empty() {
            return Err(AnalysisError::ConfigError("no models selected".to_string()));
        }
        if let Some((kind, t)) = self.threshold_overrides.iter().find(|(_, t)| !t.is_finite()) {
            return Err(AnalysisError::ConfigError(format!(
                "threshold for {} must be finite, got {}",
                kind, t
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.models.len(), 8);
        assert_eq!(config.cv_strategy().n_splits(), 5);
    }

    #[test]
    fn test_rejects_bad_splits() {
        assert!(TrainingConfig::new().with_splits(0.5, 0.5).validate().is_err());
        assert!(TrainingConfig::new().with_splits(0.0, 0.2).validate().is_err());
        assert!(TrainingConfig::new().with_models(vec![]).validate().is_err());
        assert!(TrainingConfig::new().with_iteration_budget(0).validate().is_err());
        assert!(TrainingConfig::new().with_iteration_budget(50).validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"cv_folds": 3, "threshold_overrides": {"naive_bayes": 0.545455}}"#)
                .unwrap();
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.threshold_overrides[&ModelKind::NaiveBayes], 0.545455);
        assert_eq!(config.test_split, 0.2);
    }
}
