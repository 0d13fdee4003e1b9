//! First-look profile of a raw frame

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-column summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub unique_count: usize,
}

/// Shape, dtypes, null columns and duplicate rows of a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnProfile>,
    pub null_columns: Vec<String>,
    pub duplicate_rows: usize,
}

impl DatasetProfile {
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        let mut null_columns = Vec::new();

        for col in df.get_columns() {
            let null_count = col.null_count();
            if null_count > 0 {
                null_columns.push(col.name().to_string());
            }
            columns.push(ColumnProfile {
                name: col.name().to_string(),
                dtype: format!("{:?}", col.dtype()),
                null_count,
                unique_count: col.n_unique()?,
            });
        }

        Ok(Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
            null_columns,
            duplicate_rows: count_duplicate_rows(df)?,
        })
    }

    pub fn total_nulls(&self) -> usize {
        self.columns.iter().map(|c| c.null_count).sum()
    }
}

/// Rows identical to an earlier row in every column
fn count_duplicate_rows(df: &DataFrame) -> Result<usize> {
    let unique = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
    Ok(df.height() - unique.height())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_counts() {
        let df = df! {
            "id" => &[1i64, 2, 2, 3],
            "bmi" => &[Some(20.5), None, None, Some(31.0)],
            "gender" => &["Male", "Female", "Female", "Male"],
        }
        .unwrap();

        let profile = DatasetProfile::from_frame(&df).unwrap();
        assert_eq!(profile.n_rows, 4);
        assert_eq!(profile.n_cols, 3);
        assert_eq!(profile.null_columns, vec!["bmi".to_string()]);
        assert_eq!(profile.total_nulls(), 2);
        assert_eq!(profile.duplicate_rows, 1);
        assert_eq!(profile.columns[2].unique_count, 2);
    }

    #[test]
    fn test_duplicates_count_repeats_only() {
        let df = df! {
            "id" => &[7i64, 7, 7, 8],
            "bmi" => &[None::<f64>, None, None, Some(25.0)],
        }
        .unwrap();
        // the first of three identical rows is not a duplicate
        assert_eq!(DatasetProfile::from_frame(&df).unwrap().duplicate_rows, 2);
    }
}
