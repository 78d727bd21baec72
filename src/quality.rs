//! Acceptance classification of predicted rod properties.
//!
//! Two policies exist and exactly one is active for a given artifact:
//!
//! - [`QualityPolicy::PercentileBand`] (default): every predicted property
//!   must lie inside the `[lower, upper]` quantile band of that property in the
//!   training partition.
//! - [`QualityPolicy::Floor`]: every predicted property must meet or exceed a
//!   fixed floor.
//!
//! Bounds are inclusive in both policies. The policy is resolved at training
//! time and stored with the model, so prediction never recomputes it.

use crate::error::{Result, WireRodError};
use crate::schema::{TargetVector, N_TARGETS, TARGET_NAMES};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which policy to resolve at training time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Percentile,
    Floor,
}

impl std::str::FromStr for PolicyKind {
    type Err = WireRodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "percentile" => Ok(PolicyKind::Percentile),
            "floor" => Ok(PolicyKind::Floor),
            other => Err(WireRodError::ConfigError(format!(
                "unknown quality policy '{}', expected 'percentile' or 'floor'",
                other
            ))),
        }
    }
}

/// `[quality]` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub policy: PolicyKind,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    pub floors: TargetVector,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Percentile,
            lower_quantile: 0.1,
            upper_quantile: 0.9,
            floors: TargetVector::new(180.0, 15.0, 60.0),
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<()> {
        let valid_q = |q: f64| (0.0..=1.0).contains(&q);
        if !valid_q(self.lower_quantile) || !valid_q(self.upper_quantile) {
            return Err(WireRodError::ConfigError(
                "quality quantiles must be within [0, 1]".to_string(),
            ));
        }
        if self.lower_quantile > self.upper_quantile {
            return Err(WireRodError::ConfigError(format!(
                "lower_quantile ({}) exceeds upper_quantile ({})",
                self.lower_quantile, self.upper_quantile
            )));
        }
        if self.floors.to_array().iter().any(|f| !f.is_finite()) {
            return Err(WireRodError::ConfigError("quality floors must be finite".to_string()));
        }
        Ok(())
    }
}

/// Outcome of classifying one prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Not Good")]
    NotGood,
}

impl Verdict {
    pub fn is_good(&self) -> bool {
        matches!(self, Verdict::Good)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Good => write!(f, "Good"),
            Verdict::NotGood => write!(f, "Not Good"),
        }
    }
}

/// A resolved acceptance policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityPolicy {
    PercentileBand {
        lower_quantile: f64,
        upper_quantile: f64,
        lower: TargetVector,
        upper: TargetVector,
    },
    Floor {
        floors: TargetVector,
    },
}

impl QualityPolicy {
    /// Band policy from the training targets (samples × 3)
    pub fn percentile_band(y_train: &Array2<f64>, lower_quantile: f64, upper_quantile: f64) -> Result<Self> {
        if y_train.ncols() != N_TARGETS {
            return Err(WireRodError::ShapeError {
                expected: format!("{} target columns", N_TARGETS),
                actual: format!("{} target columns", y_train.ncols()),
            });
        }
        if y_train.nrows() == 0 {
            return Err(WireRodError::ValidationError(
                "cannot derive quality bands from zero training rows".to_string(),
            ));
        }

        let mut lower = [0.0; N_TARGETS];
        let mut upper = [0.0; N_TARGETS];
        for k in 0..N_TARGETS {
            let column: Vec<f64> = y_train.column(k).to_vec();
            lower[k] = quantile(&column, lower_quantile);
            upper[k] = quantile(&column, upper_quantile);
        }

        Ok(QualityPolicy::PercentileBand {
            lower_quantile,
            upper_quantile,
            lower: TargetVector::from_slice(&lower)?,
            upper: TargetVector::from_slice(&upper)?,
        })
    }

    pub fn floor(floors: TargetVector) -> Self {
        QualityPolicy::Floor { floors }
    }

    /// Resolve the configured policy against the training targets
    pub fn resolve(config: &QualityConfig, y_train: &Array2<f64>) -> Result<Self> {
        config.validate()?;
        match config.policy {
            PolicyKind::Percentile => {
                Self::percentile_band(y_train, config.lower_quantile, config.upper_quantile)
            }
            PolicyKind::Floor => Ok(Self::floor(config.floors)),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            QualityPolicy::PercentileBand { .. } => PolicyKind::Percentile,
            QualityPolicy::Floor { .. } => PolicyKind::Floor,
        }
    }

    /// Names of the properties that fail the policy
    pub fn failing_targets(&self, predicted: &TargetVector) -> Vec<&'static str> {
        let values = predicted.to_array();
        let passes: [bool; N_TARGETS] = match self {
            QualityPolicy::PercentileBand { lower, upper, .. } => {
                let (lo, hi) = (lower.to_array(), upper.to_array());
                [0, 1, 2].map(|k| lo[k] <= values[k] && values[k] <= hi[k])
            }
            QualityPolicy::Floor { floors } => {
                let fl = floors.to_array();
                [0, 1, 2].map(|k| values[k] >= fl[k])
            }
        };

        TARGET_NAMES
            .iter()
            .zip(passes.iter())
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn classify(&self, predicted: &TargetVector) -> Verdict {
        if self.failing_targets(predicted).is_empty() {
            Verdict::Good
        } else {
            Verdict::NotGood
        }
    }
}

/// Quantile with linear interpolation between closest ranks
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
