//! Ordered collection of patient records

use std::collections::BTreeSet;

use super::record::PatientRecord;
use crate::error::{AnalysisError, Result};

/// Patient records sharing one schema, with unique ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<PatientRecord>,
}

impl Dataset {
    /// Build a dataset, rejecting duplicate patient ids
    pub fn new(records: Vec<PatientRecord>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for record in &records {
            if !seen.insert(record.id) {
                return Err(AnalysisError::DuplicateId(record.id));
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [PatientRecord] {
        &mut self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatientRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<PatientRecord> {
        self.records
    }

    /// Keep records matching the predicate, preserving order
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&PatientRecord) -> bool,
    {
        self.records.retain(keep);
    }

    pub fn stroke_count(&self) -> usize {
        self.records.iter().filter(|r| r.stroke).count()
    }

    pub fn missing_bmi(&self) -> usize {
        self.records.iter().filter(|r| r.bmi.is_none()).count()
    }

    pub fn missing_smoking(&self) -> usize {
        self.records.iter().filter(|r| r.smoking_status.is_none()).count()
    }

    /// Extract one numeric attribute, skipping records where it is missing
    pub fn values<F>(&self, field: F) -> Vec<f64>
    where
        F: Fn(&PatientRecord) -> Option<f64>,
    {
        self.records.iter().filter_map(field).collect()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a PatientRecord;
    type IntoIter = std::slice::Iter<'a, PatientRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::*;

    fn record(id: i64, age: f64, stroke: bool) -> PatientRecord {
        PatientRecord {
            id,
            gender: Gender::Female,
            age,
            hypertension: false,
            heart_disease: false,
            ever_married: true,
            work_type: WorkType::Private,
            residence: ResidenceType::Urban,
            avg_glucose_level: 90.0,
            bmi: None,
            smoking_status: Some(SmokingStatus::NeverSmoked),
            stroke,
            flags: RecordFlags::default(),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Dataset::new(vec![record(1, 40.0, false), record(1, 50.0, true)]);
        assert!(matches!(result, Err(AnalysisError::DuplicateId(1))));
    }

    #[test]
    fn test_counts() {
        let ds = Dataset::new(vec![record(1, 40.0, false), record(2, 70.0, true)]).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.stroke_count(), 1);
        assert_eq!(ds.missing_bmi(), 2);
        assert_eq!(ds.missing_smoking(), 0);
        assert_eq!(ds.values(|r| Some(r.age)), vec![40.0, 70.0]);
    }
}
