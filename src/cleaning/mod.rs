//! Adult-only filtering and extreme value flagging

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::Dataset;
use crate::error::{AnalysisError, Result};

/// Cleaning thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Records younger than this are out of scope
    pub min_age: f64,
    /// Glucose above this (mg/dL) is flagged, not removed
    pub glucose_flag_above: f64,
    /// BMI above this is flagged, not removed
    pub bmi_flag_above: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            min_age: 18.0,
            glucose_flag_above: 250.0,
            bmi_flag_above: 60.0,
        }
    }
}

impl CleaningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_age(mut self, age: f64) -> Self {
        self.min_age = age;
        self
    }

    pub fn with_glucose_flag_above(mut self, value: f64) -> Self {
        self.glucose_flag_above = value;
        self
    }

    pub fn with_bmi_flag_above(mut self, value: f64) -> Self {
        self.bmi_flag_above = value;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_age.is_finite() || self.min_age < 0.0 {
            return Err(AnalysisError::ConfigError(format!(
                "min_age must be a non-negative number, got {}",
                self.min_age
            )));
        }
        if self.glucose_flag_above <= 0.0 || self.bmi_flag_above <= 0.0 {
            return Err(AnalysisError::ConfigError(
                "extreme value thresholds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the cleaner did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningSummary {
    pub input_records: usize,
    pub removed_non_adults: usize,
    pub retained: usize,
    pub extreme_glucose: usize,
    pub extreme_bmi: usize,
    /// Ids of records carrying any extreme value flag
    pub flagged_ids: Vec<i64>,
}

pub struct Cleaner {
    config: CleaningConfig,
}

impl Cleaner {
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    /// Drop non-adults and flag extreme glucose/BMI readings in place
    pub fn clean(&self, mut dataset: Dataset) -> Result<(Dataset, CleaningSummary)> {
        let input_records = dataset.len();
        let min_age = self.config.min_age;
        dataset.retain(|r| r.age >= min_age);

        let mut summary = CleaningSummary {
            input_records,
            removed_non_adults: input_records - dataset.len(),
            retained: dataset.len(),
            ..Default::default()
        };

        for record in dataset.records_mut() {
            record.flags.extreme_glucose = record.avg_glucose_level > self.config.glucose_flag_above;
            record.flags.extreme_bmi = record
                .bmi
                .map(|b| b > self.config.bmi_flag_above)
                .unwrap_or(false);

            if record.flags.extreme_glucose {
                summary.extreme_glucose += 1;
            }
            if record.flags.extreme_bmi {
                summary.extreme_bmi += 1;
            }
            if record.flags.extreme_glucose || record.flags.extreme_bmi {
                summary.flagged_ids.push(record.id);
            }
        }

        info!(
            input = summary.input_records,
            removed = summary.removed_non_adults,
            retained = summary.retained,
            extreme_glucose = summary.extreme_glucose,
            extreme_bmi = summary.extreme_bmi,
            "Cleaned dataset"
        );

        Ok((dataset, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::*;

    fn record(id: i64, age: f64, glucose: f64, bmi: Option<f64>) -> PatientRecord {
        PatientRecord {
            id,
            gender: Gender::Male,
            age,
            hypertension: false,
            heart_disease: false,
            ever_married: false,
            work_type: WorkType::Private,
            residence: ResidenceType::Rural,
            avg_glucose_level: glucose,
            bmi,
            smoking_status: None,
            stroke: false,
            flags: RecordFlags::default(),
        }
    }

    #[test]
    fn test_removes_minors_and_keeps_adults() {
        let ds = Dataset::new(vec![
            record(1, 3.0, 90.0, Some(18.0)),
            record(2, 17.9, 90.0, Some(22.0)),
            record(3, 18.0, 90.0, Some(24.0)),
            record(4, 80.0, 90.0, None),
        ])
        .unwrap();

        let (cleaned, summary) = Cleaner::new(CleaningConfig::default()).clean(ds).unwrap();
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned.iter().all(|r| r.age >= 18.0));
        assert_eq!(summary.removed_non_adults, 2);
        assert_eq!(summary.retained, 2);
    }

    #[test]
    fn test_extreme_values_flagged_not_removed() {
        let ds = Dataset::new(vec![
            record(1, 50.0, 265.0, Some(30.0)),
            record(2, 60.0, 100.0, Some(72.5)),
            record(3, 70.0, 100.0, None),
        ])
        .unwrap();

        let (cleaned, summary) = Cleaner::new(CleaningConfig::default()).clean(ds).unwrap();
        assert_eq!(cleaned.len(), 3);
        assert_eq!(summary.extreme_glucose, 1);
        assert_eq!(summary.extreme_bmi, 1);
        assert_eq!(summary.flagged_ids, vec![1, 2]);
        assert!(cleaned.records()[0].flags.extreme_glucose);
        assert!(!cleaned.records()[2].flags.extreme_bmi);
    }

    #[test]
    fn test_invalid_config() {
        assert!(CleaningConfig::new().with_min_age(-1.0).validate().is_err());
        assert!(CleaningConfig::new().validate().is_ok());
    }
}
