//! Run configuration shared by every pipeline stage

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cleaning::CleaningConfig;
use crate::error::{AnalysisError, Result};
use crate::imputation::ImputationConfig;
use crate::stats::StatsConfig;
use crate::training::TrainingConfig;

/// Top-level configuration of an analysis run.
///
/// Every section falls back to its defaults, so a JSON file only needs the
/// keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Seed for every random choice in the run
    pub seed: u64,
    pub cleaning: CleaningConfig,
    pub imputation: ImputationConfig,
    pub stats: StatsConfig,
    pub training: TrainingConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            cleaning: CleaningConfig::default(),
            imputation: ImputationConfig::default(),
            stats: StatsConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run seed; it is also handed to the training stage
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.training.seed = seed;
        self
    }

    pub fn with_cleaning(mut self, cleaning: CleaningConfig) -> Self {
        self.cleaning = cleaning;
        self
    }

    pub fn with_imputation(mut self, imputation: ImputationConfig) -> Self {
        self.imputation = imputation;
        self
    }

    pub fn with_stats(mut self, stats: StatsConfig) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            AnalysisError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.cleaning.validate()?;
        self.imputation.validate()?;
        self.stats.validate()?;
        self.training.validate()
    }

    /// Training configuration seeded with the run seed
    pub fn seeded_training(&self) -> TrainingConfig {
        self.training.clone().with_seed(self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_with_seed_propagates() {
        let config = AnalysisConfig::new().with_seed(7);
        assert_eq!(config.training.seed, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_seed_wins_over_training_seed() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.seeded_training().seed, 7);
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"training": {{"cv_folds": 3}}}}"#).unwrap();

        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.training.cv_folds, 3);
        assert_eq!(config.seed, 42);
        assert_eq!(config.cleaning, CleaningConfig::default());
    }

    #[test]
    fn test_from_json_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(file.path()),
            Err(AnalysisError::ConfigError(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = AnalysisConfig::new().with_seed(11);
        let back: AnalysisConfig = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
