//! Confidence intervals for a sample mean

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use super::hypothesis::mean_var;
use crate::error::{AnalysisError, Result};

/// Selects the critical value used for the interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataKind {
    /// Normal critical value
    Continuous,
    /// Student-t critical value with n - 1 degrees of freedom
    Discrete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    pub level: f64,
    pub n: usize,
}

impl ConfidenceInterval {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Interval of the mean using the sample standard deviation (ddof = 1)
pub fn confidence_interval(data: &[f64], kind: DataKind, level: f64) -> Result<ConfidenceInterval> {
    if !(0.0 < level && level < 1.0) {
        return Err(AnalysisError::InvalidParameter {
            name: "level".to_string(),
            value: level.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }
    if data.len() < 2 {
        return Err(AnalysisError::Statistics(format!(
            "confidence interval needs at least two observations, got {}",
            data.len()
        )));
    }

    let n = data.len();
    let (mean, var) = mean_var(data);
    let std_err = var.sqrt() / (n as f64).sqrt();
    let q = 1.0 - (1.0 - level) / 2.0;

    let critical = match kind {
        DataKind::Continuous => Normal::new(0.0, 1.0)
            .map_err(|e| AnalysisError::Statistics(e.to_string()))?
            .inverse_cdf(q),
        DataKind::Discrete => StudentsT::new(0.0, 1.0, (n - 1) as f64)
            .map_err(|e| AnalysisError::Statistics(e.to_string()))?
            .inverse_cdf(q),
    };

    let margin = critical * std_err;
    Ok(ConfidenceInterval {
        mean,
        lower: mean - margin,
        upper: mean + margin,
        margin,
        level,
        n,
    })
}
