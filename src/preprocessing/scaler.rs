//! Feature scaling on numeric matrices

use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// No scaling
    None,
}

/// Column-wise scaler fitted on the training split only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    center: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl Scaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            center: None,
            scale: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.center.is_some()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(AnalysisError::ValidationError(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }
        let n_features = x.ncols();

        let (center, scale) = match self.scaler_type {
            ScalerType::Standard => {
                let mean = x
                    .mean_axis(Axis(0))
                    .ok_or_else(|| AnalysisError::ValidationError("Failed to compute means".to_string()))?;
                // Population std, matching the usual z-score convention
                let std = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
                (mean, std)
            }
            ScalerType::None => (Array1::zeros(n_features), Array1::ones(n_features)),
        };

        self.center = Some(center);
        self.scale = Some(scale);
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (center, scale) = match (&self.center, &self.scale) {
            (Some(c), Some(s)) => (c, s),
            _ => return Err(AnalysisError::ModelNotFitted),
        };
        if x.ncols() != center.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} columns", center.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok((x - center) / scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let mut scaler = Scaler::new(ScalerType::Standard);
        let scaled = scaler.fit_transform(&x).unwrap();

        let means = scaled.mean_axis(Axis(0)).unwrap();
        assert!(means[0].abs() < 1e-12);
        // constant column keeps scale 1 and is only centered
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
        assert!((scaled[[2, 0]] - 1.224744871391589).abs() < 1e-9);
    }

    #[test]
    fn test_fitted_on_train_only() {
        let train = array![[0.0], [2.0]];
        let test = array![[4.0]];
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&train).unwrap();
        let scaled = scaler.transform(&test).unwrap();
        assert!((scaled[[0, 0]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_and_shape() {
        let scaler = Scaler::new(ScalerType::Standard);
        assert!(scaler.transform(&array![[1.0]]).is_err());

        let mut scaler = Scaler::new(ScalerType::None);
        scaler.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0]]).is_err());
        assert_eq!(scaler.transform(&array![[1.0, 2.0]]).unwrap(), array![[1.0, 2.0]]);
    }
}
