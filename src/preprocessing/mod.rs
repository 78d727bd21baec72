//! Data preprocessing module
//!
//! - Feature standardisation ([`StandardScaler`])
//! - Per-column summaries used by the `info` command

mod scaler;

pub use scaler::StandardScaler;

use crate::error::{Result, WireRodError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Summary statistics of one numeric dataset column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStats {
    pub name: String,
    pub count: usize,
    pub null_count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
}

impl FeatureStats {
    /// Create empty statistics for a column
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            null_count: 0,
            mean: None,
            std: None,
            min: None,
            max: None,
            median: None,
        }
    }

    /// Compute statistics from a numeric column
    pub fn from_column(name: &str, column: &Column) -> Result<Self> {
        let mut stats = Self::new(name);
        stats.count = column.len();
        stats.null_count = column.null_count();

        let casted = column
            .cast(&DataType::Float64)
            .map_err(|e| WireRodError::DataError(format!("column '{}': {}", name, e)))?;
        let ca = casted.as_materialized_series().f64()?.clone();

        stats.mean = ca.mean();
        stats.std = ca.std(1);
        stats.min = ca.min();
        stats.max = ca.max();
        stats.median = ca.median();

        Ok(stats)
    }
}

/// Summaries for the named columns of a frame, in the given order
pub fn describe(df: &DataFrame, columns: &[String]) -> Result<Vec<FeatureStats>> {
    columns
        .iter()
        .map(|name| {
            let column = df
                .column(name)
                .map_err(|_| WireRodError::FeatureNotFound(name.clone()))?;
            FeatureStats::from_column(name, column)
        })
        .collect()
}
