//! Missing value imputation
//!
//! BMI and smoking status are estimated from similar patients with a
//! nearest-neighbour imputer. Cells lacking enough donors fall back to the
//! column median (BMI) or mode (smoking status), and every fallback is
//! recorded so the report can surface it.

mod knn;

pub use knn::{
    median, mode, CellFallback, ColumnKind, DistanceMetric, FallbackStrategy, KNNImputer,
    WeightScheme,
};

use crate::data::{Dataset, Gender, PatientRecord, ResidenceType, SmokingStatus, WorkType};
use crate::error::{AnalysisError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Trait for imputers
pub trait Imputer: Send + Sync {
    /// Fit the imputer on data with missing values
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Transform data by imputing missing values
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Check if value is missing (NaN)
#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}

/// Imputation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationConfig {
    pub n_neighbors: usize,
    /// Fewer donors than this triggers the median/mode fallback
    pub min_neighbors: usize,
    pub weights: WeightScheme,
    pub metric: DistanceMetric,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            min_neighbors: 3,
            weights: WeightScheme::Uniform,
            metric: DistanceMetric::Euclidean,
        }
    }
}

impl ImputationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_neighbors(mut self, n: usize) -> Self {
        self.n_neighbors = n;
        self
    }

    pub fn with_min_neighbors(mut self, n: usize) -> Self {
        self.min_neighbors = n;
        self
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_neighbors == 0 {
            return Err(AnalysisError::ConfigError(
                "n_neighbors must be at least 1".to_string(),
            ));
        }
        if self.min_neighbors == 0 || self.min_neighbors > self.n_neighbors {
            return Err(AnalysisError::ConfigError(format!(
                "min_neighbors must be in 1..={}, got {}",
                self.n_neighbors, self.min_neighbors
            )));
        }
        Ok(())
    }
}

/// Record-level fallback entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationFallback {
    pub record_id: i64,
    pub field: String,
    pub strategy: FallbackStrategy,
    pub value: f64,
    pub donors: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationSummary {
    pub bmi_imputed: usize,
    pub smoking_imputed: usize,
    pub fallbacks: Vec<ImputationFallback>,
}

/// Predictor columns shared by both targets. The stroke label is excluded.
pub const PREDICTOR_COLUMNS: [&str; 11] = [
    "age",
    "gender_female",
    "hypertension",
    "heart_disease",
    "ever_married",
    "residence_urban",
    "avg_glucose_level",
    "work_private",
    "work_self_employed",
    "work_govt_job",
    "work_children",
];

const BMI_COL: usize = PREDICTOR_COLUMNS.len();
const SMOKING_COL: usize = PREDICTOR_COLUMNS.len() + 1;

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn imputation_row(r: &PatientRecord) -> [f64; SMOKING_COL + 1] {
    [
        r.age,
        flag(r.gender == Gender::Female),
        flag(r.hypertension),
        flag(r.heart_disease),
        flag(r.ever_married),
        flag(r.residence == ResidenceType::Urban),
        r.avg_glucose_level,
        flag(r.work_type == WorkType::Private),
        flag(r.work_type == WorkType::SelfEmployed),
        flag(r.work_type == WorkType::GovtJob),
        flag(r.work_type == WorkType::Children),
        r.bmi.unwrap_or(f64::NAN),
        r.smoking_status.map(|s| s.code()).unwrap_or(f64::NAN),
    ]
}

/// Fills `bmi` and `smoking_status` on every record
pub struct PatientImputer {
    config: ImputationConfig,
}

impl PatientImputer {
    pub fn new(config: ImputationConfig) -> Self {
        Self { config }
    }

    pub fn impute(&self, mut dataset: Dataset) -> Result<(Dataset, ImputationSummary)> {
        let mut summary = ImputationSummary::default();
        if dataset.missing_bmi() == 0 && dataset.missing_smoking() == 0 {
            return Ok((dataset, summary));
        }

        // a target with no observed value has no donors and no median/mode
        for (field, missing) in [
            ("bmi", dataset.missing_bmi()),
            ("smoking_status", dataset.missing_smoking()),
        ] {
            if missing == dataset.len() {
                return Err(AnalysisError::DataFormat(format!(
                    "column {} has no observed values to impute from",
                    field
                )));
            }
        }

        let n_cols = SMOKING_COL + 1;
        let mut data = Vec::with_capacity(dataset.len() * n_cols);
        for record in dataset.iter() {
            data.extend_from_slice(&imputation_row(record));
        }
        let x = Array2::from_shape_vec((dataset.len(), n_cols), data)?;

        let mut kinds = vec![ColumnKind::Continuous; n_cols];
        kinds[SMOKING_COL] = ColumnKind::Categorical;

        let mut imputer = KNNImputer::new(self.config.n_neighbors)
            .with_min_neighbors(self.config.min_neighbors)
            .with_metric(self.config.metric)
            .with_weights(self.config.weights)
            .with_column_kinds(kinds);
        imputer.fit(&x)?;
        let (filled, cell_fallbacks) = imputer.transform_with_report(&x)?;

        for (i, record) in dataset.records_mut().iter_mut().enumerate() {
            if record.bmi.is_none() {
                record.bmi = Some(filled[[i, BMI_COL]]);
                summary.bmi_imputed += 1;
            }
            if record.smoking_status.is_none() {
                let code = filled[[i, SMOKING_COL]];
                let status = SmokingStatus::from_code(code).ok_or_else(|| {
                    AnalysisError::Imputation(format!(
                        "record {} received invalid smoking code {}",
                        record.id, code
                    ))
                })?;
                record.smoking_status = Some(status);
                summary.smoking_imputed += 1;
            }
        }

        for cell in cell_fallbacks {
            let record = &dataset.records()[cell.row];
            let field = if cell.column == BMI_COL { "bmi" } else { "smoking_status" };
            let reason = AnalysisError::Imputation(format!(
                "record {} has {} donor(s) for {}, {} required",
                record.id, cell.donors, field, self.config.min_neighbors
            ));
            warn!(
                record_id = record.id,
                field,
                strategy = ?cell.strategy,
                value = cell.value,
                "{}",
                reason
            );
            summary.fallbacks.push(ImputationFallback {
                record_id: record.id,
                field: field.to_string(),
                strategy: cell.strategy,
                value: cell.value,
                donors: cell.donors,
                reason: reason.to_string(),
            });
        }

        if let Some(record) = dataset.iter().find(|r| !r.is_complete()) {
            return Err(AnalysisError::Imputation(format!(
                "record {} still has missing values after imputation",
                record.id
            )));
        }

        info!(
            bmi = summary.bmi_imputed,
            smoking = summary.smoking_imputed,
            fallbacks = summary.fallbacks.len(),
            "Imputed missing values"
        );

        Ok((dataset, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RecordFlags;

    fn record(id: i64, age: f64, bmi: Option<f64>, smoking: Option<SmokingStatus>) -> PatientRecord {
        PatientRecord {
            id,
            gender: if id % 2 == 0 { Gender::Female } else { Gender::Male },
            age,
            hypertension: false,
            heart_disease: false,
            ever_married: age > 30.0,
            work_type: WorkType::Private,
            residence: ResidenceType::Urban,
            avg_glucose_level: 80.0 + age,
            bmi,
            smoking_status: smoking,
            stroke: false,
            flags: RecordFlags {
                bmi_was_missing: bmi.is_none(),
                smoking_was_missing: smoking.is_none(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_impute_fills_every_field() {
        let mut records = Vec::new();
        for i in 0..20 {
            let age = 20.0 + i as f64 * 3.0;
            let bmi = if i % 5 == 0 { None } else { Some(20.0 + i as f64 * 0.5) };
            let smoking = if i % 4 == 0 { None } else { Some(SmokingStatus::NeverSmoked) };
            records.push(record(i, age, bmi, smoking));
        }
        let ds = Dataset::new(records).unwrap();

        let (filled, summary) = PatientImputer::new(ImputationConfig::default())
            .impute(ds)
            .unwrap();

        assert!(filled.iter().all(|r| r.is_complete()));
        assert_eq!(summary.bmi_imputed, 4);
        assert_eq!(summary.smoking_imputed, 5);
        assert!(summary.fallbacks.is_empty());
        // every donor never smoked
        assert!(filled
            .iter()
            .all(|r| r.smoking_status == Some(SmokingStatus::NeverSmoked)));
        // missingness flags survive
        assert!(filled.records()[0].flags.bmi_was_missing);
    }

    #[test]
    fn test_unobserved_target_is_a_data_format_error() {
        let records = (0..10)
            .map(|i| record(i, 25.0 + i as f64, None, Some(SmokingStatus::Smokes)))
            .collect();
        let err = PatientImputer::new(ImputationConfig::default())
            .impute(Dataset::new(records).unwrap())
            .unwrap_err();

        assert!(matches!(err, AnalysisError::DataFormat(ref m) if m.contains("bmi")));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_fallback_is_recorded() {
        let records = vec![
            record(1, 30.0, Some(22.0), Some(SmokingStatus::Smokes)),
            record(2, 40.0, Some(26.0), Some(SmokingStatus::Smokes)),
            record(3, 50.0, None, Some(SmokingStatus::NeverSmoked)),
        ];
        let ds = Dataset::new(records).unwrap();

        let (filled, summary) = PatientImputer::new(ImputationConfig::default())
            .impute(ds)
            .unwrap();

        assert_eq!(filled.records()[2].bmi, Some(24.0));
        assert_eq!(summary.fallbacks.len(), 1);
        let fallback = &summary.fallbacks[0];
        assert_eq!(fallback.record_id, 3);
        assert_eq!(fallback.field, "bmi");
        assert_eq!(fallback.strategy, FallbackStrategy::Median);
        assert!(fallback.reason.contains("Imputation error"));
    }

    #[test]
    fn test_config_validation() {
        assert!(ImputationConfig::new().validate().is_ok());
        assert!(ImputationConfig::new().with_min_neighbors(9).validate().is_err());
        assert!(ImputationConfig::new().with_n_neighbors(0).validate().is_err());
    }
}
