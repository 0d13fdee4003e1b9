//! KNN-based imputation with explicit median/mode fallback

use crate::error::{AnalysisError, Result};
use crate::imputation::{is_missing, Imputer};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Ordered (distance, row) pair for the neighbour heap
#[derive(Debug, Clone, Copy)]
struct DistanceIdx(f64, usize);

impl PartialEq for DistanceIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DistanceIdx {}

impl PartialOrd for DistanceIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistanceIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max heap by distance, equal distances resolved by row index
        self.0
            .total_cmp(&other.0)
            .then_with(|| self.1.cmp(&other.1))
    }
}

/// How a column's missing values are estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Neighbour mean, falls back to the median
    Continuous,
    /// Neighbour majority vote over integer codes, falls back to the mode
    Categorical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightScheme {
    Uniform,
    Distance,
}

/// Fallback used when too few donors exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackStrategy {
    Median,
    Mode,
}

/// A cell that was filled by the fallback rather than by neighbours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFallback {
    pub row: usize,
    pub column: usize,
    /// Donors with a finite distance that were available
    pub donors: usize,
    pub strategy: FallbackStrategy,
    pub value: f64,
}

/// KNN-based imputer.
///
/// For every missing cell the donors are fitted rows where that column is
/// observed. Distances use the remaining columns after standardization,
/// skipping positions missing on either side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNImputer {
    n_neighbors: usize,
    min_neighbors: usize,
    metric: DistanceMetric,
    weights: WeightScheme,
    column_kinds: Option<Vec<ColumnKind>>,
    /// Fitted data as given
    raw_data: Option<Array2<f64>>,
    /// Fitted data, standardized per column
    scaled_data: Option<Array2<f64>>,
    means: Option<Array1<f64>>,
    stds: Option<Array1<f64>>,
    fallback_values: Option<Vec<f64>>,
}

impl KNNImputer {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            min_neighbors: 1,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
            column_kinds: None,
            raw_data: None,
            scaled_data: None,
            means: None,
            stds: None,
            fallback_values: None,
        }
    }

    /// Minimum number of donors below which the fallback is used
    pub fn with_min_neighbors(mut self, min_neighbors: usize) -> Self {
        self.min_neighbors = min_neighbors.max(1);
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    /// Declare per-column kinds. Columns default to continuous.
    pub fn with_column_kinds(mut self, kinds: Vec<ColumnKind>) -> Self {
        self.column_kinds = Some(kinds);
        self
    }

    fn kind(&self, column: usize) -> ColumnKind {
        self.column_kinds
            .as_ref()
            .and_then(|k| k.get(column).copied())
            .unwrap_or(ColumnKind::Continuous)
    }

    fn distance(&self, a: &[f64], b: &[f64], skip: usize) -> f64 {
        let mut count = 0usize;
        let mut accum = 0.0f64;

        for (j, (&ai, &bi)) in a.iter().zip(b.iter()).enumerate() {
            if j == skip || is_missing(ai) || is_missing(bi) {
                continue;
            }
            count += 1;
            match self.metric {
                DistanceMetric::Manhattan => accum += (ai - bi).abs(),
                DistanceMetric::Euclidean => {
                    let d = ai - bi;
                    accum += d * d;
                }
            }
        }

        if count == 0 {
            return f64::INFINITY;
        }

        match self.metric {
            DistanceMetric::Manhattan => accum / count as f64,
            DistanceMetric::Euclidean => (accum / count as f64).sqrt(),
        }
    }

    /// Nearest donors for `column`, sorted by (distance, row)
    fn find_neighbors(
        &self,
        scaled: &Array2<f64>,
        raw: &Array2<f64>,
        sample: &[f64],
        column: usize,
    ) -> Vec<(usize, f64)> {
        let k = self.n_neighbors;
        let mut heap: BinaryHeap<DistanceIdx> = BinaryHeap::with_capacity(k + 1);
        let mut row_buf: Vec<f64> = Vec::with_capacity(scaled.ncols());

        for (i, row) in scaled.rows().into_iter().enumerate() {
            if is_missing(raw[[i, column]]) {
                continue;
            }
            let dist = match row.as_slice() {
                Some(slice) => self.distance(sample, slice, column),
                None => {
                    row_buf.clear();
                    row_buf.extend(row.iter().copied());
                    self.distance(sample, &row_buf, column)
                }
            };
            if !dist.is_finite() {
                continue;
            }

            let candidate = DistanceIdx(dist, i);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(top) = heap.peek() {
                if candidate < *top {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|DistanceIdx(d, i)| (i, d))
            .collect()
    }

    fn weight(&self, dist: f64) -> f64 {
        match self.weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => {
                if dist < 1e-10 {
                    1e10
                } else {
                    1.0 / dist
                }
            }
        }
    }

    fn impute_value(&self, raw: &Array2<f64>, neighbors: &[(usize, f64)], column: usize) -> f64 {
        match self.kind(column) {
            ColumnKind::Continuous => {
                let mut weighted_sum = 0.0;
                let mut weight_sum = 0.0;
                for &(idx, dist) in neighbors {
                    let w = self.weight(dist);
                    weighted_sum += raw[[idx, column]] * w;
                    weight_sum += w;
                }
                weighted_sum / weight_sum
            }
            ColumnKind::Categorical => {
                let mut votes: BTreeMap<i64, f64> = BTreeMap::new();
                for &(idx, dist) in neighbors {
                    *votes.entry(raw[[idx, column]].round() as i64).or_insert(0.0) +=
                        self.weight(dist);
                }
                // Highest vote wins; BTreeMap order keeps the smallest code on ties
                let mut best: Option<(i64, f64)> = None;
                for (code, vote) in votes {
                    if best.map_or(true, |(_, v)| vote > v) {
                        best = Some((code, vote));
                    }
                }
                best.map(|(code, _)| code as f64).unwrap_or(f64::NAN)
            }
        }
    }

    /// Impute and report every cell that needed the fallback
    pub fn transform_with_report(&self, x: &Array2<f64>) -> Result<(Array2<f64>, Vec<CellFallback>)> {
        let (raw, scaled, means, stds, fallback_values) = match (
            &self.raw_data,
            &self.scaled_data,
            &self.means,
            &self.stds,
            &self.fallback_values,
        ) {
            (Some(r), Some(s), Some(m), Some(sd), Some(f)) => (r, s, m, sd, f),
            _ => return Err(AnalysisError::ModelNotFitted),
        };

        if x.ncols() != raw.ncols() {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} columns", raw.ncols()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut result = x.clone();
        let mut fallbacks = Vec::new();
        let mut sample: Vec<f64> = vec![0.0; x.ncols()];

        for (row_idx, row) in x.rows().into_iter().enumerate() {
            if !row.iter().any(|&v| is_missing(v)) {
                continue;
            }

            for (j, &v) in row.iter().enumerate() {
                sample[j] = if is_missing(v) { f64::NAN } else { (v - means[j]) / stds[j] };
            }

            for j in 0..x.ncols() {
                if !is_missing(row[j]) {
                    continue;
                }
                let neighbors = self.find_neighbors(scaled, raw, &sample, j);
                if neighbors.len() >= self.min_neighbors {
                    result[[row_idx, j]] = self.impute_value(raw, &neighbors, j);
                } else {
                    let strategy = match self.kind(j) {
                        ColumnKind::Continuous => FallbackStrategy::Median,
                        ColumnKind::Categorical => FallbackStrategy::Mode,
                    };
                    result[[row_idx, j]] = fallback_values[j];
                    fallbacks.push(CellFallback {
                        row: row_idx,
                        column: j,
                        donors: neighbors.len(),
                        strategy,
                        value: fallback_values[j],
                    });
                }
            }
        }

        Ok((result, fallbacks))
    }
}

impl Default for KNNImputer {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Imputer for KNNImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_features = x.ncols();
        if let Some(kinds) = &self.column_kinds {
            if kinds.len() != n_features {
                return Err(AnalysisError::ShapeError {
                    expected: format!("{} column kinds", n_features),
                    actual: format!("{} column kinds", kinds.len()),
                });
            }
        }

        let mut means = Array1::zeros(n_features);
        let mut stds = Array1::ones(n_features);
        let mut fallback_values = Vec::with_capacity(n_features);

        for j in 0..n_features {
            let observed: Vec<f64> = x.column(j).iter().copied().filter(|v| !is_missing(*v)).collect();
            if observed.is_empty() {
                return Err(AnalysisError::Imputation(format!(
                    "column {} has no observed values",
                    j
                )));
            }
            let n = observed.len() as f64;
            let mean = observed.iter().sum::<f64>() / n;
            let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            means[j] = mean;
            stds[j] = if var.sqrt() > 1e-10 { var.sqrt() } else { 1.0 };

            fallback_values.push(match self.kind(j) {
                ColumnKind::Continuous => median(&observed),
                ColumnKind::Categorical => mode(&observed),
            });
        }

        let mut scaled = x.clone();
        for ((_, j), v) in scaled.indexed_iter_mut() {
            if !is_missing(*v) {
                *v = (*v - means[j]) / stds[j];
            }
        }

        self.raw_data = Some(x.clone());
        self.scaled_data = Some(scaled);
        self.means = Some(means);
        self.stds = Some(stds);
        self.fallback_values = Some(fallback_values);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.transform_with_report(x).map(|(imputed, _)| imputed)
    }
}

/// Median of a non-empty sample
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Most frequent integer code, smallest code on ties
pub fn mode(values: &[f64]) -> f64 {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    let mut best: Option<(i64, usize)> = None;
    for (code, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((code, count));
        }
    }
    best.map(|(code, _)| code as f64).unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knn_imputer_basic() {
        let data = Array2::from_shape_vec(
            (6, 2),
            vec![
                1.0, 10.0,
                2.0, 20.0,
                3.0, 30.0,
                4.0, 40.0,
                f64::NAN, 25.0,
                2.5, f64::NAN,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(3);
        let result = imputer.fit_transform(&data).unwrap();

        assert!(!result.iter().any(|&v| v.is_nan()));
        assert!(result[[4, 0]] >= 1.0 && result[[4, 0]] <= 4.0);
        assert!(result[[5, 1]] >= 10.0 && result[[5, 1]] <= 40.0);
    }

    #[test]
    fn test_knn_imputer_distance_weights() {
        let data = Array2::from_shape_vec(
            (5, 2),
            vec![
                0.0, 0.0,
                1.0, 1.0,
                2.0, 2.0,
                3.0, 3.0,
                0.1, f64::NAN,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(3).with_weights(WeightScheme::Distance);
        let result = imputer.fit_transform(&data).unwrap();
        assert!(result[[4, 1]].abs() < 1.0);
    }

    #[test]
    fn test_categorical_vote() {
        // Two nearest donors say code 2, the far one says 0
        let data = Array2::from_shape_vec(
            (4, 2),
            vec![
                1.0, 2.0,
                1.1, 2.0,
                9.0, 0.0,
                1.05, f64::NAN,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(3)
            .with_column_kinds(vec![ColumnKind::Continuous, ColumnKind::Categorical]);
        let result = imputer.fit_transform(&data).unwrap();
        assert_eq!(result[[3, 1]], 2.0);
    }

    #[test]
    fn test_fallback_when_donors_are_scarce() {
        let data = Array2::from_shape_vec(
            (5, 2),
            vec![
                1.0, 10.0,
                2.0, 30.0,
                3.0, f64::NAN,
                4.0, f64::NAN,
                5.0, f64::NAN,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(5).with_min_neighbors(3);
        imputer.fit(&data).unwrap();
        let (result, fallbacks) = imputer.transform_with_report(&data).unwrap();

        assert_eq!(fallbacks.len(), 3);
        assert!(fallbacks.iter().all(|f| f.strategy == FallbackStrategy::Median));
        assert!(fallbacks.iter().all(|f| f.donors == 2));
        assert_eq!(result[[2, 1]], 20.0);
        assert!(!result.iter().any(|v| v.is_nan()));
    }

    #[test]
    fn test_deterministic_tie_break() {
        // Rows 0 and 1 are equidistant from row 4; k=1 must pick row 0
        let data = Array2::from_shape_vec(
            (5, 2),
            vec![
                -2.0, 5.0,
                2.0, 7.0,
                10.0, 9.0,
                -10.0, 9.0,
                0.0, f64::NAN,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(1);
        let first = imputer.fit_transform(&data).unwrap();
        let second = imputer.transform(&data).unwrap();
        assert_eq!(first[[4, 1]], 5.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_median_and_mode() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(mode(&[1.0, 2.0, 2.0, 1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_unfitted() {
        let imputer = KNNImputer::new(3);
        let data = Array2::<f64>::zeros((2, 2));
        assert!(matches!(imputer.transform(&data), Err(AnalysisError::ModelNotFitted)));
    }
}
