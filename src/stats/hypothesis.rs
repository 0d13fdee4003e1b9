//! Hypothesis tests: chi-square independence and Welch's t-test

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AnalysisError, Result};

/// Observed counts for two categorical variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub counts: Array2<f64>,
}

impl ContingencyTable {
    pub fn new(row_labels: Vec<String>, col_labels: Vec<String>, counts: Array2<f64>) -> Result<Self> {
        if counts.dim() != (row_labels.len(), col_labels.len()) {
            return Err(AnalysisError::ShapeError {
                expected: format!("{}x{}", row_labels.len(), col_labels.len()),
                actual: format!("{}x{}", counts.nrows(), counts.ncols()),
            });
        }
        Ok(Self {
            row_labels,
            col_labels,
            counts,
        })
    }

    /// Tabulate paired observations. Rows and columns follow the key ordering.
    pub fn from_observations<R, C, I>(pairs: I) -> Self
    where
        R: Ord + Clone + ToString,
        C: Ord + Clone + ToString,
        I: IntoIterator<Item = (R, C)>,
    {
        let mut cells: BTreeMap<(R, C), f64> = BTreeMap::new();
        let mut rows: BTreeSet<R> = BTreeSet::new();
        let mut cols: BTreeSet<C> = BTreeSet::new();

        for (r, c) in pairs {
            rows.insert(r.clone());
            cols.insert(c.clone());
            *cells.entry((r, c)).or_insert(0.0) += 1.0;
        }

        let mut counts = Array2::zeros((rows.len(), cols.len()));
        for (i, r) in rows.iter().enumerate() {
            for (j, c) in cols.iter().enumerate() {
                counts[[i, j]] = cells.get(&(r.clone(), c.clone())).copied().unwrap_or(0.0);
            }
        }

        Self {
            row_labels: rows.iter().map(|r| r.to_string()).collect(),
            col_labels: cols.iter().map(|c| c.to_string()).collect(),
            counts,
        }
    }

    pub fn total(&self) -> f64 {
        self.counts.sum()
    }

    /// Expected counts under independence
    pub fn expected(&self) -> Array2<f64> {
        let total = self.total();
        let row_totals = self.counts.sum_axis(Axis(1));
        let col_totals = self.counts.sum_axis(Axis(0));
        Array2::from_shape_fn(self.counts.dim(), |(i, j)| {
            row_totals[i] * col_totals[j] / total
        })
    }
}

/// Outcome of a chi-square test of independence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareResult {
    pub name: String,
    pub statistic: f64,
    pub dof: usize,
    pub p_value: f64,
    pub alpha: f64,
    pub reject_null: bool,
    /// Cells whose expected count is below 5
    pub low_expected_cells: usize,
    pub table: ContingencyTable,
}

/// Outcome of Welch's two-sample t-test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub name: String,
    pub mean_a: f64,
    pub mean_b: f64,
    pub n_a: usize,
    pub n_b: usize,
    pub statistic: f64,
    pub dof: f64,
    pub p_value: f64,
    pub alpha: f64,
    pub reject_null: bool,
}

/// Pearson's chi-square test without continuity correction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChiSquareTest {
    /// Significance level (alpha)
    alpha: f64,
}

impl ChiSquareTest {
    /// `alpha` is used as given; `StatsConfig::validate` bounds it to (0, 1)
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn test(&self, name: &str, table: &ContingencyTable) -> Result<ChiSquareResult> {
        let (n_rows, n_cols) = table.counts.dim();
        if n_rows < 2 || n_cols < 2 {
            return Err(AnalysisError::Statistics(format!(
                "{}: contingency table must be at least 2x2, got {}x{}",
                name, n_rows, n_cols
            )));
        }
        let row_totals = table.counts.sum_axis(Axis(1));
        let col_totals = table.counts.sum_axis(Axis(0));
        if row_totals.iter().chain(col_totals.iter()).any(|&t| t <= 0.0) {
            return Err(AnalysisError::Statistics(format!(
                "{}: contingency table has an empty row or column",
                name
            )));
        }

        let expected = table.expected();
        let statistic: f64 = table
            .counts
            .iter()
            .zip(expected.iter())
            .map(|(&o, &e)| (o - e).powi(2) / e)
            .sum();
        let dof = (n_rows - 1) * (n_cols - 1);
        let dist = ChiSquared::new(dof as f64).map_err(|e| AnalysisError::Statistics(e.to_string()))?;
        let p_value = dist.sf(statistic);

        Ok(ChiSquareResult {
            name: name.to_string(),
            statistic,
            dof,
            p_value,
            alpha: self.alpha,
            reject_null: p_value < self.alpha,
            low_expected_cells: expected.iter().filter(|&&e| e < 5.0).count(),
            table: table.clone(),
        })
    }
}

impl Default for ChiSquareTest {
    fn default() -> Self {
        Self::new(0.05)
    }
}

/// Two-sample t-test with unequal variances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelchTTest {
    alpha: f64,
}

impl WelchTTest {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn test(&self, name: &str, a: &[f64], b: &[f64]) -> Result<TTestResult> {
        if a.len() < 2 || b.len() < 2 {
            return Err(AnalysisError::Statistics(format!(
                "{}: each group needs at least two observations ({} vs {})",
                name,
                a.len(),
                b.len()
            )));
        }

        let (mean_a, var_a) = mean_var(a);
        let (mean_b, var_b) = mean_var(b);
        let (n_a, n_b) = (a.len() as f64, b.len() as f64);
        let se2_a = var_a / n_a;
        let se2_b = var_b / n_b;
        let se = (se2_a + se2_b).sqrt();
        if se == 0.0 {
            return Err(AnalysisError::Statistics(format!(
                "{}: both groups have zero variance",
                name
            )));
        }

        let statistic = (mean_a - mean_b) / se;
        let dof = (se2_a + se2_b).powi(2)
            / (se2_a.powi(2) / (n_a - 1.0) + se2_b.powi(2) / (n_b - 1.0));
        let dist = StudentsT::new(0.0, 1.0, dof).map_err(|e| AnalysisError::Statistics(e.to_string()))?;
        let p_value = (2.0 * dist.sf(statistic.abs())).min(1.0);

        Ok(TTestResult {
            name: name.to_string(),
            mean_a,
            mean_b,
            n_a: a.len(),
            n_b: b.len(),
            statistic,
            dof,
            p_value,
            alpha: self.alpha,
            reject_null: p_value < self.alpha,
        })
    }
}

impl Default for WelchTTest {
    fn default() -> Self {
        Self::new(0.05)
    }
}

/// Mean and sample variance (ddof = 1)
pub fn mean_var(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}
