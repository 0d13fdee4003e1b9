//! Error types for the stroke analysis pipeline

use thiserror::Error;

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Main error type for the analysis pipeline.
///
/// Variants fall into three families. Data-format problems abort the run.
/// Imputation problems degrade to a fallback value. Convergence and training
/// problems exclude the affected classifier from comparison.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid value in column '{column}' at row {row}: {value}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Duplicate patient id: {0}")]
    DuplicateId(i64),

    #[error("Imputation error: {0}")]
    Imputation(String),

    #[error("{model} failed to converge after {iterations} iterations")]
    ConvergenceError { model: String, iterations: usize },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Statistics error: {0}")]
    Statistics(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl AnalysisError {
    /// Whether the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::DataFormat(_)
                | AnalysisError::MissingColumn(_)
                | AnalysisError::InvalidValue { .. }
                | AnalysisError::DuplicateId(_)
                | AnalysisError::IoError(_)
                | AnalysisError::ConfigError(_)
        )
    }
}

impl From<polars::error::PolarsError> for AnalysisError {
    fn from(err: polars::error::PolarsError) -> Self {
        AnalysisError::DataFormat(err.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AnalysisError {
    fn from(err: ndarray::ShapeError) -> Self {
        AnalysisError::ShapeError {
            expected: "compatible shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::MissingColumn("bmi".to_string());
        assert_eq!(err.to_string(), "Missing required column: bmi");

        let err = AnalysisError::ConvergenceError {
            model: "Logistic Regression".to_string(),
            iterations: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Logistic Regression failed to converge after 1000 iterations"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AnalysisError = io_err.into();
        assert!(matches!(err, AnalysisError::IoError(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_taxonomy() {
        assert!(AnalysisError::DataFormat("bad".into()).is_fatal());
        assert!(AnalysisError::DuplicateId(7).is_fatal());
        assert!(!AnalysisError::Imputation("few donors".into()).is_fatal());
        assert!(!AnalysisError::ConvergenceError {
            model: "SVM".into(),
            iterations: 10
        }
        .is_fatal());
    }
}
