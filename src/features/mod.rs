//! Feature engineering: dummy encoding, missingness flags and the model matrix

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::data::{Dataset, SmokingStatus};
use crate::error::{AnalysisError, Result};

/// Model features, in column order
pub const FEATURE_NAMES: [&str; 16] = [
    "Age",
    "Hypertension",
    "Heart_disease",
    "Avg_glucose_level",
    "Bmi",
    "Gender_Female",
    "Ever_married",
    "Residence_Urban",
    "Smoking_status_was_missing",
    "Bmi_was_missing",
    "Work_type_Govt_job",
    "Work_type_Private",
    "Work_type_Self_employed",
    "Smoking_status_formerly_smoked",
    "Smoking_status_never_smoked",
    "Smoking_status_smokes",
];

pub const TARGET_NAME: &str = "Stroke";

/// Categorical columns expanded into dummies
pub const CATEGORICAL_COLUMNS: [&str; 5] = [
    "Gender",
    "Ever_married",
    "Residence",
    "Work_type",
    "Smoking_status",
];

/// Numeric matrix handed to the classifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
    /// 1.0 for stroke, 0.0 otherwise
    pub y: Array1<f64>,
    pub ids: Vec<i64>,
}

impl FeatureMatrix {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn positive_rate(&self) -> f64 {
        if self.y.is_empty() {
            return 0.0;
        }
        self.y.sum() / self.y.len() as f64
    }
}

/// One-hot encode string columns.
///
/// Each column `C` with value `v` becomes an Int32 column `C_v`. Columns
/// ending in `_No` are dropped and a `_Yes` suffix is stripped, so yes/no
/// answers collapse into a single indicator named after the question.
pub fn dummy_columns(df: &DataFrame, features: &[&str]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(df.width() * 2);

    for col in df.get_columns() {
        if !features.contains(&col.name().as_str()) {
            columns.push(col.clone());
        }
    }

    for feature in features {
        let series = df
            .column(feature)
            .map_err(|_| AnalysisError::MissingColumn(feature.to_string()))?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let values: Vec<Option<String>> = series
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect();
        let levels: BTreeSet<&str> = values.iter().flatten().map(|s| s.as_str()).collect();

        for level in levels {
            let name = format!("{}_{}", feature, level);
            if name.ends_with("_No") {
                continue;
            }
            let name = name.strip_suffix("_Yes").unwrap_or(&name).to_string();
            let indicator: Vec<i32> = values
                .iter()
                .map(|v| i32::from(v.as_deref() == Some(level)))
                .collect();
            columns.push(Series::new(name.as_str().into(), indicator).into());
        }
    }

    Ok(DataFrame::new(columns)?)
}

/// Builds the model matrix from an imputed dataset
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Capitalized frame with one column per attribute, before encoding
    pub fn to_frame(&self, dataset: &Dataset) -> Result<DataFrame> {
        let records = dataset.records();
        let mut smoking = Vec::with_capacity(records.len());
        for r in records {
            let status = r.smoking_status.ok_or_else(|| {
                AnalysisError::ValidationError(format!(
                    "record {} has no smoking status; impute before building features",
                    r.id
                ))
            })?;
            smoking.push(status.feature_label());
        }
        let mut bmi = Vec::with_capacity(records.len());
        for r in records {
            bmi.push(r.bmi.ok_or_else(|| {
                AnalysisError::ValidationError(format!(
                    "record {} has no BMI; impute before building features",
                    r.id
                ))
            })?);
        }

        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let age: Vec<f64> = records.iter().map(|r| r.age).collect();
        let hypertension: Vec<i32> = records.iter().map(|r| i32::from(r.hypertension)).collect();
        let heart: Vec<i32> = records.iter().map(|r| i32::from(r.heart_disease)).collect();
        let glucose: Vec<f64> = records.iter().map(|r| r.avg_glucose_level).collect();
        let gender: Vec<&str> = records.iter().map(|r| r.gender.as_str()).collect();
        let married: Vec<&str> = records
            .iter()
            .map(|r| if r.ever_married { "Yes" } else { "No" })
            .collect();
        let residence: Vec<&str> = records.iter().map(|r| r.residence.as_str()).collect();
        let work: Vec<&str> = records.iter().map(|r| r.work_type.feature_label()).collect();
        let smoking_missing: Vec<i32> = records
            .iter()
            .map(|r| i32::from(r.flags.smoking_was_missing))
            .collect();
        let bmi_missing: Vec<i32> = records
            .iter()
            .map(|r| i32::from(r.flags.bmi_was_missing))
            .collect();
        let stroke: Vec<i32> = records.iter().map(|r| i32::from(r.stroke)).collect();

        Ok(DataFrame::new(vec![
            Series::new("Id".into(), ids).into(),
            Series::new("Age".into(), age).into(),
            Series::new("Hypertension".into(), hypertension).into(),
            Series::new("Heart_disease".into(), heart).into(),
            Series::new("Avg_glucose_level".into(), glucose).into(),
            Series::new("Bmi".into(), bmi).into(),
            Series::new("Gender".into(), gender).into(),
            Series::new("Ever_married".into(), married).into(),
            Series::new("Residence".into(), residence).into(),
            Series::new("Work_type".into(), work).into(),
            Series::new("Smoking_status".into(), smoking).into(),
            Series::new("Smoking_status_was_missing".into(), smoking_missing).into(),
            Series::new("Bmi_was_missing".into(), bmi_missing).into(),
            Series::new(TARGET_NAME.into(), stroke).into(),
        ])?)
    }

    /// Encode and assemble the fixed feature set
    pub fn build(&self, dataset: &Dataset) -> Result<FeatureMatrix> {
        if dataset.is_empty() {
            return Err(AnalysisError::ValidationError(
                "cannot build features from an empty dataset".to_string(),
            ));
        }

        let frame = self.to_frame(dataset)?;
        let encoded = dummy_columns(&frame, &CATEGORICAL_COLUMNS)?;
        debug!(columns = encoded.width(), "Encoded categorical columns");

        let feature_names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let x = columns_to_array2(&encoded, &feature_names)?;
        let y = Array1::from_iter(
            columns_to_array2(&encoded, &[TARGET_NAME.to_string()])?
                .column(0)
                .iter()
                .copied(),
        );
        let ids = dataset.iter().map(|r| r.id).collect();

        Ok(FeatureMatrix { feature_names, x, y, ids })
    }
}

/// Collect columns into a row-major matrix. Dummy levels absent from the
/// data become all-zero columns.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| match df.column(name) {
            Ok(col) => {
                let cast = col.as_materialized_series().cast(&DataType::Float64)?;
                Ok(cast.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
            }
            Err(_) => Ok(vec![0.0; n_rows]),
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

/// Dummy column name for a smoking level
pub fn smoking_feature_name(status: SmokingStatus) -> String {
    format!("Smoking_status_{}", status.feature_label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::*;

    #[test]
    fn test_dummy_columns_yes_no() {
        let df = df! {
            "Ever_married" => &["Yes", "No", "Yes"],
            "Work_type" => &["Private", "Govt_job", "Private"],
            "Age" => &[30.0, 40.0, 50.0],
        }
        .unwrap();

        let encoded = dummy_columns(&df, &["Ever_married", "Work_type"]).unwrap();
        let names: Vec<String> = encoded
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        assert!(names.contains(&"Ever_married".to_string()));
        assert!(!names.iter().any(|n| n.ends_with("_No")));
        assert!(names.contains(&"Work_type_Private".to_string()));
        assert!(names.contains(&"Work_type_Govt_job".to_string()));
        assert!(names.contains(&"Age".to_string()));

        let married = encoded.column("Ever_married").unwrap();
        let values: Vec<Option<i32>> = married.as_materialized_series().i32().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1), Some(0), Some(1)]);
    }

    fn record(id: i64, work_type: WorkType, smoking: SmokingStatus, stroke: bool) -> PatientRecord {
        PatientRecord {
            id,
            gender: Gender::Female,
            age: 45.0 + id as f64,
            hypertension: id % 2 == 0,
            heart_disease: false,
            ever_married: true,
            work_type,
            residence: ResidenceType::Urban,
            avg_glucose_level: 100.0,
            bmi: Some(27.5),
            smoking_status: Some(smoking),
            stroke,
            flags: RecordFlags {
                bmi_was_missing: id == 2,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_build_feature_matrix() {
        let ds = Dataset::new(vec![
            record(1, WorkType::Private, SmokingStatus::Smokes, true),
            record(2, WorkType::SelfEmployed, SmokingStatus::NeverSmoked, false),
            record(3, WorkType::Children, SmokingStatus::FormerlySmoked, false),
        ])
        .unwrap();

        let fm = FeatureEngineer::new().build(&ds).unwrap();
        assert_eq!(fm.n_samples(), 3);
        assert_eq!(fm.n_features(), FEATURE_NAMES.len());
        assert_eq!(fm.y.to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(fm.ids, vec![1, 2, 3]);

        let col = |name: &str| FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        assert_eq!(fm.x[[0, col("Work_type_Private")]], 1.0);
        assert_eq!(fm.x[[1, col("Work_type_Self_employed")]], 1.0);
        // no Govt_job rows: column exists and is zero
        assert!(fm.x.column(col("Work_type_Govt_job")).iter().all(|&v| v == 0.0));
        // children is the reference level and has no column
        assert_eq!(fm.x.row(2).iter().skip(10).take(3).sum::<f64>(), 0.0);
        assert_eq!(fm.x[[1, col("Bmi_was_missing")]], 1.0);
        assert_eq!(fm.x[[2, col(&smoking_feature_name(SmokingStatus::FormerlySmoked))]], 1.0);
        assert_eq!(fm.x[[0, col("Gender_Female")]], 1.0);
        assert_eq!(fm.x[[0, col("Residence_Urban")]], 1.0);
        assert!((fm.positive_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_requires_imputed_dataset() {
        let mut r = record(1, WorkType::Private, SmokingStatus::Smokes, false);
        r.bmi = None;
        let ds = Dataset::new(vec![r]).unwrap();
        assert!(FeatureEngineer::new().build(&ds).is_err());
    }
}
