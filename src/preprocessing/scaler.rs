//! Standard (z-score) feature scaling

use crate::error::{Result, WireRodError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature standardisation: `(x - mean) / std`.
///
/// Statistics use the population standard deviation (ddof = 0). A feature
/// with zero spread gets a scale of 1.0 so it is only centred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
    n_samples_seen: usize,
    is_fitted: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    /// Create a new, unfitted scaler
    pub fn new() -> Self {
        Self {
            mean: Array1::zeros(0),
            scale: Array1::zeros(0),
            n_samples_seen: 0,
            is_fitted: false,
        }
    }

    /// Compute per-column statistics from `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(WireRodError::PreprocessingError(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| WireRodError::PreprocessingError("mean of empty axis".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });

        self.mean = mean;
        self.scale = scale;
        self.n_samples_seen = x.nrows();
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale every row of `x`
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        Ok((x - &self.mean) / &self.scale)
    }

    /// Scale a single sample
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok((&row - &self.mean) / &self.scale)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Undo [`transform`](Self::transform)
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        Ok(x * &self.scale + &self.mean)
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-feature divisor (the standard deviation, or 1.0 for constant features)
    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if !self.is_fitted {
            return Err(WireRodError::ModelNotFitted);
        }
        if width != self.mean.len() {
            return Err(WireRodError::ShapeError {
                expected: format!("{} features", self.mean.len()),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }
}
