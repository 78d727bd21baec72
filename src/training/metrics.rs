//! Regression metrics over multi-output predictions

use crate::error::{Result, WireRodError};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Error metrics for one target column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub name: String,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl TargetMetrics {
    fn compute(name: &str, y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Self {
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.sum() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e * e).sum();

        // A constant target is explained perfectly only by a perfect fit
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            name: name.to_string(),
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
        }
    }
}

/// Held-out evaluation of the fitted forest.
///
/// `mse` and `r2` are uniform averages over the targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub per_target: Vec<TargetMetrics>,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute metrics from true and predicted target matrices
    pub fn compute(y_true: &Array2<f64>, y_pred: &Array2<f64>, names: &[String]) -> Result<Self> {
        if y_true.dim() != y_pred.dim() {
            return Err(WireRodError::ShapeError {
                expected: format!("{:?}", y_true.dim()),
                actual: format!("{:?}", y_pred.dim()),
            });
        }
        if names.len() != y_true.ncols() {
            return Err(WireRodError::ShapeError {
                expected: format!("{} target names", y_true.ncols()),
                actual: format!("{} target names", names.len()),
            });
        }
        if y_true.nrows() == 0 || y_true.ncols() == 0 {
            return Err(WireRodError::ValidationError(
                "cannot evaluate an empty prediction set".to_string(),
            ));
        }

        let per_target: Vec<TargetMetrics> = names
            .iter()
            .enumerate()
            .map(|(k, name)| TargetMetrics::compute(name, y_true.column(k), y_pred.column(k)))
            .collect();

        let k = per_target.len() as f64;
        let mse = per_target.iter().map(|m| m.mse).sum::<f64>() / k;
        let mae = per_target.iter().map(|m| m.mae).sum::<f64>() / k;
        let r2 = per_target.iter().map(|m| m.r2).sum::<f64>() / k;

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
            per_target,
            n_samples: y_true.nrows(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_perfect_prediction() {
        let y = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let m = RegressionMetrics::compute(&y, &y, &names()).unwrap();
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_uniform_average() {
        let y_true = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let y_pred = array![[1.0, 11.0], [2.0, 19.0], [3.0, 31.0], [4.0, 39.0]];
        let m = RegressionMetrics::compute(&y_true, &y_pred, &names()).unwrap();

        assert_eq!(m.per_target[0].mse, 0.0);
        assert_eq!(m.per_target[1].mse, 1.0);
        assert!((m.mse - 0.5).abs() < 1e-12);

        // b: ss_tot = 500, ss_res = 4
        let r2_b = 1.0 - 4.0 / 500.0;
        assert!((m.per_target[1].r2 - r2_b).abs() < 1e-12);
        assert!((m.r2 - (1.0 + r2_b) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target() {
        let y_true = array![[5.0], [5.0]];
        let exact = RegressionMetrics::compute(&y_true, &y_true, &["c".to_string()]).unwrap();
        assert_eq!(exact.r2, 1.0);

        let off = array![[4.0], [6.0]];
        let m = RegressionMetrics::compute(&y_true, &off, &["c".to_string()]).unwrap();
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = array![[1.0, 2.0]];
        let b = array![[1.0]];
        assert!(RegressionMetrics::compute(&a, &b, &names()).is_err());
    }
}
