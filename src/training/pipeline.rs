//! End-to-end training: split, scale, fit, evaluate, resolve quality policy

use crate::error::{Result, WireRodError};
use crate::preprocessing::StandardScaler;
use crate::quality::{QualityConfig, QualityPolicy};
use crate::schema::FeatureSchema;
use crate::utils::{DataLoader, Dataset};
use super::metrics::RegressionMetrics;
use super::random_forest::{MaxFeatures, RandomForestRegressor};
use super::split::Splitter;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// `[training]` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed for the split and the per-tree bootstrap draws
    pub seed: u64,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features per split
    pub max_features: MaxFeatures,
    /// Draw each tree's rows with replacement
    pub bootstrap: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(WireRodError::ConfigError(format!(
                "training.test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.n_estimators == 0 {
            return Err(WireRodError::ConfigError(
                "training.n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(WireRodError::ConfigError(
                "training.min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(WireRodError::ConfigError(
                "training.min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(WireRodError::ConfigError(
                "training.max_depth must be at least 1 when set".to_string(),
            ));
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(WireRodError::ConfigError(format!(
                    "training.max_features fraction must be in (0, 1], got {}",
                    f
                )));
            }
            MaxFeatures::Fixed(0) => {
                return Err(WireRodError::ConfigError(
                    "training.max_features must be at least 1".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    fn build_forest(&self) -> RandomForestRegressor {
        RandomForestRegressor::new(self.n_estimators)
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(self.max_features)
            .with_bootstrap(self.bootstrap)
            .with_random_state(self.seed)
    }
}

/// True and predicted targets for the held-out rows
#[derive(Debug, Clone)]
pub struct HoldoutPredictions {
    /// Row indices into the source dataset
    pub row_indices: Vec<usize>,
    pub y_true: Array2<f64>,
    pub y_pred: Array2<f64>,
}

impl HoldoutPredictions {
    pub fn len(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_indices.is_empty()
    }

    /// `row`, then `<target>_true` / `<target>_pred` for every target
    pub fn to_frame(&self, target_names: &[String]) -> Result<DataFrame> {
        let rows: Vec<u64> = self.row_indices.iter().map(|&r| r as u64).collect();
        let mut columns = vec![Column::new("row".into(), rows)];
        for (k, name) in target_names.iter().enumerate() {
            columns.push(Column::new(
                format!("{}_true", name).into(),
                self.y_true.column(k).to_vec(),
            ));
            columns.push(Column::new(
                format!("{}_pred", name).into(),
                self.y_pred.column(k).to_vec(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Diagnostics gathered during one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub n_samples: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: RegressionMetrics,
    /// Normalised importances, in schema order
    pub feature_importances: Vec<(String, f64)>,
    pub training_time_secs: f64,
    pub holdout: HoldoutPredictions,
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub schema: FeatureSchema,
    pub scaler: StandardScaler,
    pub model: RandomForestRegressor,
    pub policy: QualityPolicy,
    pub config: TrainingConfig,
    pub report: TrainingReport,
}

/// Runs the training pipeline. Every call refits from scratch.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
    quality: QualityConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig, quality: QualityConfig) -> Self {
        Self { config, quality }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load a CSV dataset and train on it
    pub fn fit_csv(&self, path: impl AsRef<Path>) -> Result<TrainingOutcome> {
        let df = DataLoader::new().load_csv(path)?;
        self.fit_frame(&df)
    }

    pub fn fit_frame(&self, df: &DataFrame) -> Result<TrainingOutcome> {
        let dataset = Dataset::from_frame(df, &FeatureSchema::default())?;
        self.fit(&dataset)
    }

    pub fn fit(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        self.config.validate()?;
        self.quality.validate()?;

        let start = Instant::now();
        let n_samples = dataset.n_samples();

        let split = Splitter::new(self.config.test_size)
            .with_random_state(self.config.seed)
            .split(n_samples)?;
        let (x_train, x_test) = split.apply(&dataset.x);
        let (y_train, y_test) = split.apply(&dataset.y);
        debug!(
            n_train = x_train.nrows(),
            n_test = x_test.nrows(),
            seed = self.config.seed,
            "Split dataset"
        );

        // Statistics come from the training partition only
        let mut scaler = StandardScaler::new();
        let x_train_scaled = scaler.fit_transform(&x_train)?;
        let x_test_scaled = scaler.transform(&x_test)?;

        let mut model = self.config.build_forest();
        model.fit(&x_train_scaled, &y_train)?;

        let y_pred = model.predict(&x_test_scaled)?;
        let metrics = RegressionMetrics::compute(&y_test, &y_pred, &dataset.schema.targets)?;

        let policy = QualityPolicy::resolve(&self.quality, &y_train)?;

        let feature_importances = match model.feature_importances() {
            Some(imp) => dataset
                .schema
                .features
                .iter()
                .cloned()
                .zip(imp.iter().copied())
                .collect(),
            None => Vec::new(),
        };

        let training_time_secs = start.elapsed().as_secs_f64();
        info!(
            samples = n_samples,
            trees = model.n_trees(),
            mse = metrics.mse,
            r2 = metrics.r2,
            policy = ?policy.kind(),
            elapsed_secs = training_time_secs,
            "Training complete"
        );

        let report = TrainingReport {
            n_samples,
            n_train: split.train_indices.len(),
            n_test: split.test_indices.len(),
            metrics,
            feature_importances,
            training_time_secs,
            holdout: HoldoutPredictions {
                row_indices: split.test_indices.clone(),
                y_true: y_test,
                y_pred,
            },
        };

        Ok(TrainingOutcome {
            schema: dataset.schema.clone(),
            scaler,
            model,
            policy,
            config: self.config.clone(),
            report,
        })
    }
}
