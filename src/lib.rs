//! Stroke Analysis - analysis pipeline for the stroke prediction dataset
//!
//! The run is a single forward pass:
//! load → clean → impute → engineer features → test hypotheses → train →
//! evaluate → report.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - CSV loading, schema validation, typed records, profiling
//! - [`cleaning`] - Adult-only filter and extreme value flags
//! - [`imputation`] - Nearest-neighbour BMI / smoking status imputation
//! - [`features`] - Dummy encoding and the model matrix
//! - [`preprocessing`] - Feature scaling
//!
//! ## Analysis
//! - [`stats`] - Correlations, chi-square and t-tests, confidence intervals
//! - [`synthetic`] - SMOTE oversampling
//! - [`training`] - Classifiers, thresholds, cross-validation and selection
//!
//! ## Orchestration
//! - [`config`] - Run configuration
//! - [`pipeline`] - End-to-end runner
//! - [`report`] - Text and JSON reports
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod cleaning;
pub mod data;
pub mod features;
pub mod imputation;
pub mod preprocessing;

// Analysis
pub mod stats;
pub mod synthetic;
pub mod training;

// Orchestration
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod report;

pub use error::{AnalysisError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::AnalysisConfig;
    pub use crate::data::{DataLoader, Dataset, PatientRecord};
    pub use crate::error::{AnalysisError, Result};
    pub use crate::features::{FeatureEngineer, FeatureMatrix};
    pub use crate::pipeline::AnalysisPipeline;
    pub use crate::report::AnalysisReport;
    pub use crate::training::{Classifier, ModelKind, TrainEngine, TrainingConfig};
}
