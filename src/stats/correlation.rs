//! Correlation matrices: Pearson, Spearman and phi

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationMethod {
    Pearson,
    /// Pearson on average ranks
    Spearman,
    /// Matthews coefficient for binary variables
    Phi,
}

/// A pair of variables and their coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
    /// Two-sided p-value of H0: no correlation
    pub p_value: Option<f64>,
}

/// Symmetric matrix with unit diagonal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    pub names: Vec<String>,
    pub values: Array2<f64>,
    pub n_samples: usize,
}

impl CorrelationMatrix {
    /// Correlate the columns of `data`, one variable per column
    pub fn compute(names: &[&str], data: &Array2<f64>, method: CorrelationMethod) -> Result<Self> {
        if names.len() != data.ncols() {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} columns", names.len()),
                actual: format!("{} columns", data.ncols()),
            });
        }
        if data.nrows() < 2 {
            return Err(AnalysisError::Statistics(
                "correlation needs at least two observations".to_string(),
            ));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::Statistics(
                "correlation input contains missing values".to_string(),
            ));
        }

        let columns: Vec<Vec<f64>> = match method {
            CorrelationMethod::Spearman => data
                .columns()
                .into_iter()
                .map(|c| average_ranks(&c.to_vec()))
                .collect(),
            _ => data.columns().into_iter().map(|c| c.to_vec()).collect(),
        };

        let k = names.len();
        let mut values = Array2::<f64>::eye(k);
        for i in 0..k {
            for j in (i + 1)..k {
                let a = ArrayView1::from(columns[i].as_slice());
                let b = ArrayView1::from(columns[j].as_slice());
                let r = match method {
                    CorrelationMethod::Phi => phi_coefficient(a, b)?,
                    _ => pearson(a, b),
                };
                values[[i, j]] = r;
                values[[j, i]] = r;
            }
        }

        Ok(Self {
            method,
            names: names.iter().map(|s| s.to_string()).collect(),
            values,
            n_samples: data.nrows(),
        })
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[[i, j]])
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        let k = self.values.nrows();
        (0..k).all(|i| {
            (self.values[[i, i]] - 1.0).abs() <= tol
                && (0..k).all(|j| (self.values[[i, j]] - self.values[[j, i]]).abs() <= tol)
        })
    }

    /// Off-diagonal pairs with `|r| >= threshold`, strongest first
    pub fn pairs_above(&self, threshold: f64) -> Vec<CorrelatedPair> {
        let k = self.names.len();
        let mut pairs = Vec::new();
        for i in 0..k {
            for j in (i + 1)..k {
                let r = self.values[[i, j]];
                if r.abs() >= threshold {
                    pairs.push(CorrelatedPair {
                        first: self.names[i].clone(),
                        second: self.names[j].clone(),
                        coefficient: r,
                        p_value: correlation_p_value(r, self.n_samples),
                    });
                }
            }
        }
        pairs.sort_by(|a, b| {
            b.coefficient
                .abs()
                .total_cmp(&a.coefficient.abs())
                .then_with(|| a.first.cmp(&b.first))
                .then_with(|| a.second.cmp(&b.second))
        });
        pairs
    }
}

/// Pearson correlation, 0 when either side is constant
pub fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let x_mean = x.mean().unwrap_or(0.0);
    let y_mean = y.mean().unwrap_or(0.0);

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;

    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        (sum_xy / denom).clamp(-1.0, 1.0)
    }
}

/// Phi coefficient from the 2x2 table of two 0/1 variables
pub fn phi_coefficient(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
    let (mut n11, mut n10, mut n01, mut n00) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    for (&a, &b) in x.iter().zip(y.iter()) {
        if !is_binary(a) || !is_binary(b) {
            return Err(AnalysisError::Statistics(format!(
                "phi coefficient needs binary values, got ({}, {})",
                a, b
            )));
        }
        match (a == 1.0, b == 1.0) {
            (true, true) => n11 += 1.0,
            (true, false) => n10 += 1.0,
            (false, true) => n01 += 1.0,
            (false, false) => n00 += 1.0,
        }
    }

    let denom = ((n11 + n10) * (n01 + n00) * (n11 + n01) * (n10 + n00)).sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok((n11 * n00 - n10 * n01) / denom)
}

fn is_binary(v: f64) -> bool {
    v == 0.0 || v == 1.0
}

/// Average ranks (1-based), ties share the mean rank
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// t-test of a correlation coefficient with n - 2 degrees of freedom
pub fn correlation_p_value(r: f64, n: usize) -> Option<f64> {
    if n < 3 {
        return None;
    }
    if r.abs() >= 1.0 {
        return Some(0.0);
    }
    let dof = (n - 2) as f64;
    let t = r * (dof / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, dof).ok()?;
    Some(2.0 * dist.sf(t.abs()))
}
