//! Wire-rod quality predictor
//!
//! Predicts ultimate tensile strength, elongation and conductivity of
//! aluminium wire rod from nine casting and rolling parameters, and
//! classifies each prediction as `Good` or `Not Good`.
//!
//! # Modules
//!
//! ## Core
//! - [`schema`] - Process parameters, target properties, column ordering
//! - [`preprocessing`] - Feature standardisation and column summaries
//! - [`training`] - Multi-output random forest and the training pipeline
//! - [`quality`] - Acceptance policies applied to predictions
//! - [`export`] - Artifact persistence (`model.json` + `scaler.json`)
//! - [`inference`] - Read-only prediction context
//!
//! ## Data
//! - [`utils`] - CSV loading and saving
//! - [`synthetic`] - Synthetic wire-rod datasets
//!
//! ## Services
//! - [`config`] - TOML configuration
//! - [`server`] - HTTP JSON API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core
pub mod schema;
pub mod preprocessing;
pub mod training;
pub mod quality;
pub mod export;
pub mod inference;

// Data
pub mod utils;
pub mod synthetic;

// Services
pub mod config;
pub mod server;
pub mod cli;

pub use error::{Result, WireRodError};
pub use inference::{InferenceContext, Prediction};
pub use quality::{QualityPolicy, Verdict};
pub use schema::{FeatureSchema, ProcessSample, TargetVector};
pub use training::{Trainer, TrainingConfig, TrainingOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
