//! CSV loading and schema validation

use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use super::dataset::Dataset;
use super::record::*;
use crate::error::{AnalysisError, Result};

/// Columns the stroke dataset must provide
pub const REQUIRED_COLUMNS: [&str; 12] = [
    "id",
    "gender",
    "age",
    "hypertension",
    "heart_disease",
    "ever_married",
    "work_type",
    "Residence_type",
    "avg_glucose_level",
    "bmi",
    "smoking_status",
    "stroke",
];

/// Literal used by the source file for a missing BMI
pub const NULL_MARKER: &str = "N/A";

/// Reads the raw file and turns it into typed records
#[derive(Debug, Clone)]
pub struct DataLoader {
    separator: u8,
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            separator: b',',
            infer_schema_length: 1000,
        }
    }

    /// Set field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Load a CSV file, reading `N/A` as null
    pub fn load_csv<P: AsRef<Path>>(&self, path: P) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let parse_opts = CsvParseOptions::default()
            .with_separator(self.separator)
            .with_null_values(Some(NullValues::AllColumnsSingle(NULL_MARKER.into())));

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| AnalysisError::DataFormat(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }

    /// Check that every required column is present
    pub fn validate_schema(&self, df: &DataFrame) -> Result<()> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        for required in REQUIRED_COLUMNS {
            if !names.iter().any(|n| n == required) {
                return Err(AnalysisError::MissingColumn(required.to_string()));
            }
        }
        Ok(())
    }

    /// Convert a validated frame into typed records
    pub fn to_dataset(&self, df: &DataFrame) -> Result<Dataset> {
        self.validate_schema(df)?;

        let ids = numeric_column(df, "id")?;
        let genders = string_column(df, "gender")?;
        let ages = numeric_column(df, "age")?;
        let hypertension = numeric_column(df, "hypertension")?;
        let heart_disease = numeric_column(df, "heart_disease")?;
        let ever_married = string_column(df, "ever_married")?;
        let work_types = string_column(df, "work_type")?;
        let residences = string_column(df, "Residence_type")?;
        let glucose = numeric_column(df, "avg_glucose_level")?;
        let bmi = numeric_column(df, "bmi")?;
        let smoking = string_column(df, "smoking_status")?;
        let stroke = numeric_column(df, "stroke")?;

        let mut records = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let id = required_value("id", row, ids[row])?;
            if id.fract() != 0.0 {
                return Err(invalid("id", row, id));
            }

            let bmi_value = bmi[row];
            let smoking_status = match smoking[row].as_deref() {
                Some(label) => SmokingStatus::parse_label(label)
                    .map_err(|_| invalid("smoking_status", row, label))?,
                None => None,
            };

            let record = PatientRecord {
                id: id as i64,
                gender: parse_category("gender", row, &genders[row])?,
                age: required_value("age", row, ages[row])?,
                hypertension: binary_value("hypertension", row, hypertension[row])?,
                heart_disease: binary_value("heart_disease", row, heart_disease[row])?,
                ever_married: yes_no("ever_married", row, &ever_married[row])?,
                work_type: parse_category("work_type", row, &work_types[row])?,
                residence: parse_category("Residence_type", row, &residences[row])?,
                avg_glucose_level: required_value("avg_glucose_level", row, glucose[row])?,
                bmi: bmi_value,
                smoking_status,
                stroke: binary_value("stroke", row, stroke[row])?,
                flags: RecordFlags {
                    bmi_was_missing: bmi_value.is_none(),
                    smoking_was_missing: smoking_status.is_none(),
                    ..RecordFlags::default()
                },
            };
            records.push(record);
        }

        let dataset = Dataset::new(records)?;
        debug!(
            records = dataset.len(),
            missing_bmi = dataset.missing_bmi(),
            missing_smoking = dataset.missing_smoking(),
            "Built typed dataset"
        );
        Ok(dataset)
    }

    /// Load, validate and convert in one step
    pub fn load_dataset<P: AsRef<Path>>(&self, path: P) -> Result<(DataFrame, Dataset)> {
        let df = self.load_csv(path)?;
        let dataset = self.to_dataset(&df)?;
        Ok((df, dataset))
    }
}

fn invalid(column: &str, row: usize, value: impl ToString) -> AnalysisError {
    AnalysisError::InvalidValue {
        column: column.to_string(),
        row,
        value: value.to_string(),
    }
}

/// Read a column as optional floats. String columns must parse cleanly.
pub(crate) fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.as_materialized_series();

    if series.dtype() == &DataType::Null {
        return Ok(vec![None; series.len()]);
    }
    if series.dtype() == &DataType::String {
        let ca = series.str()?;
        return ca
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| invalid(name, row, raw)),
                None => Ok(None),
            })
            .collect();
    }

    if !series.dtype().is_primitive_numeric() && series.dtype() != &DataType::Boolean {
        return Err(AnalysisError::DataFormat(format!(
            "column '{}' has non-numeric type {:?}",
            name,
            series.dtype()
        )));
    }

    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.as_materialized_series();
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

fn required_value(column: &str, row: usize, value: Option<f64>) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(invalid(column, row, v)),
        None => Err(invalid(column, row, "null")),
    }
}

fn binary_value(column: &str, row: usize, value: Option<f64>) -> Result<bool> {
    match required_value(column, row, value)? {
        v if v == 0.0 => Ok(false),
        v if v == 1.0 => Ok(true),
        v => Err(invalid(column, row, v)),
    }
}

fn yes_no(column: &str, row: usize, value: &Option<String>) -> Result<bool> {
    match value.as_deref().map(str::trim) {
        Some("Yes") => Ok(true),
        Some("No") => Ok(false),
        Some(other) => Err(invalid(column, row, other)),
        None => Err(invalid(column, row, "null")),
    }
}

fn parse_category<T: FromStr>(column: &str, row: usize, value: &Option<String>) -> Result<T> {
    match value.as_deref() {
        Some(raw) => raw.parse::<T>().map_err(|_| invalid(column, row, raw)),
        None => Err(invalid(column, row, "null")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "id,gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status,stroke";

    fn write_csv(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_csv_with_missing_markers() {
        let file = write_csv(&[
            "9046,Male,67,0,1,Yes,Private,Urban,228.69,36.6,formerly smoked,1",
            "51676,Female,61,0,0,Yes,Self-employed,Rural,202.21,N/A,never smoked,1",
            "60182,Female,49,0,0,Yes,Private,Urban,171.23,34.4,Unknown,0",
        ]);

        let loader = DataLoader::new();
        let (df, dataset) = loader.load_dataset(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(dataset.len(), 3);

        let records = dataset.records();
        assert_eq!(records[0].work_type, WorkType::Private);
        assert_eq!(records[1].bmi, None);
        assert!(records[1].flags.bmi_was_missing);
        assert_eq!(records[2].smoking_status, None);
        assert!(records[2].flags.smoking_was_missing);
        assert!(records[0].stroke);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let df = df! {
            "id" => &[1i64, 2],
            "age" => &[30.0, 40.0],
        }
        .unwrap();

        let err = DataLoader::new().to_dataset(&df).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_value_is_rejected() {
        let file = write_csv(&[
            "1,Male,67,0,1,Yes,Private,Urban,228.69,36.6,formerly smoked,1",
            "2,Female,61,0,0,Maybe,Private,Rural,202.21,30.1,never smoked,0",
        ]);

        let err = DataLoader::new().load_dataset(file.path()).unwrap_err();
        match err {
            AnalysisError::InvalidValue { column, row, .. } => {
                assert_eq!(column, "ever_married");
                assert_eq!(row, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let file = write_csv(&[
            "1,Male,67,0,1,Yes,Private,Urban,228.69,36.6,formerly smoked,1",
            "1,Female,61,0,0,Yes,Private,Rural,202.21,30.1,never smoked,0",
        ]);
        let err = DataLoader::new().load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::DuplicateId(1)));
    }
}
