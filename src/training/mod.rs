//! Model training
//!
//! - [`decision_tree`]: multi-output CART regression tree
//! - [`random_forest`]: bagged ensemble of those trees
//! - [`split`]: seeded train/test partitioning
//! - [`metrics`]: held-out regression metrics
//! - [`pipeline`]: the full split → scale → fit → evaluate run

pub mod decision_tree;
pub mod metrics;
pub mod pipeline;
pub mod random_forest;
pub mod split;

pub use decision_tree::{DecisionTree, TreeNode};
pub use metrics::{RegressionMetrics, TargetMetrics};
pub use pipeline::{HoldoutPredictions, Trainer, TrainingConfig, TrainingOutcome, TrainingReport};
pub use random_forest::{MaxFeatures, RandomForestRegressor};
pub use split::{Splitter, TrainTestSplit};
