//! Random forest regressor (bagged multi-output trees)

use crate::error::{Result, WireRodError};
use super::decision_tree::DecisionTree;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Candidate features considered at each split.
///
/// In TOML: `max_features = "sqrt"` or `max_features = { fraction = 0.5 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Number of candidates out of `n_features`, at least one
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

/// Random forest model.
///
/// Each tree is fitted on a bootstrap sample drawn with its own seed
/// (`random_state + tree index`), so the fitted forest does not depend on how
/// rayon schedules the work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Candidate features per split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
    /// Number of jointly predicted outputs
    n_outputs: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    /// Create a new regressor forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            n_outputs: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        self.max_features.resolve(n_features)
    }

    /// Fit the forest to `x` (samples × features) and `y` (samples × outputs)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.nrows() {
            return Err(WireRodError::ShapeError {
                expected: format!("y rows = {}", n_samples),
                actual: format!("y rows = {}", y.nrows()),
            });
        }
        if n_samples == 0 {
            return Err(WireRodError::TrainingError(
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(WireRodError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "at least one tree is required".to_string(),
            });
        }

        self.n_features = n_features;
        self.n_outputs = y.ncols();
        let max_features = self.compute_max_features(n_features);
        let base_seed = self.random_state.unwrap_or(42);
        let bootstrap = self.bootstrap;
        let max_depth = self.max_depth;
        let min_samples_split = self.min_samples_split;
        let min_samples_leaf = self.min_samples_leaf;

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(ndarray::Axis(0), &sample_indices);
                let y_boot = y.select(ndarray::Axis(0), &sample_indices);

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(min_samples_split)
                    .with_min_samples_leaf(min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(seed);
                tree.max_depth = max_depth;

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    if i < self.n_features {
                        total_importances[i] += val;
                    }
                }
            }
        }

        // Normalize
        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Mean of the tree predictions, one row per sample
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(WireRodError::ModelNotFitted);
        }

        let all_predictions: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut sum: Array2<f64> = Array2::zeros((x.nrows(), self.n_outputs));
        for preds in &all_predictions {
            sum += preds;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Prediction for a single scaled sample
    pub fn predict_row(&self, sample: ArrayView1<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(WireRodError::ModelNotFitted);
        }

        let mut sum: Array1<f64> = Array1::zeros(self.n_outputs);
        for tree in &self.trees {
            for (acc, v) in sum.iter_mut().zip(tree.predict_row(sample)?) {
                *acc += v;
            }
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array2<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array2::from_shape_fn((40, 2), |(i, k)| if k == 0 { 2.0 * i as f64 } else { 100.0 - i as f64 });
        (x, y)
    }

    #[test]
    fn test_regressor() {
        let (x, y) = linear_data();
        let mut rf = RandomForestRegressor::new(20).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        assert_eq!(predictions.dim(), (40, 2));

        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 10.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = linear_data();
        let mut a = RandomForestRegressor::new(15).with_random_state(7);
        let mut b = RandomForestRegressor::new(15).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_predict_row_matches_batch() {
        let (x, y) = linear_data();
        let mut rf = RandomForestRegressor::new(10).with_random_state(3);
        rf.fit(&x, &y).unwrap();

        let batch = rf.predict(&x).unwrap();
        let single = rf.predict_row(x.row(5)).unwrap();
        for k in 0..2 {
            assert!((batch[[5, k]] - single[k]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![[1.0], [2.0], [3.0], [4.0]];

        let mut rf = RandomForestRegressor::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::All.resolve(9), 9);
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::Log2.resolve(9), 4);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(9), 5);
        assert_eq!(MaxFeatures::Fixed(20).resolve(9), 9);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(9), 1);
    }

    #[test]
    fn test_without_bootstrap_trees_fit_training_rows() {
        let (x, y) = linear_data();
        let mut rf = RandomForestRegressor::new(5)
            .with_bootstrap(false)
            .with_random_state(11);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        for (p, a) in predictions.iter().zip(y.iter()) {
            assert!((p - a).abs() < 1e-9, "{} vs {}", p, a);
        }
    }

    #[test]
    fn test_sqrt_features_still_learns() {
        let (x, y) = linear_data();
        let mut rf = RandomForestRegressor::new(20)
            .with_max_features(MaxFeatures::Sqrt)
            .with_random_state(5);
        rf.fit(&x, &y).unwrap();
        assert_eq!(rf.predict(&x).unwrap().dim(), (40, 2));
        assert_eq!(rf.max_features, MaxFeatures::Sqrt);
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (x, y) = linear_data();
        let mut rf = RandomForestRegressor::new(0);
        assert!(matches!(rf.fit(&x, &y), Err(WireRodError::InvalidParameter { .. })));
    }

    #[test]
    fn test_predict_before_fit() {
        let rf = RandomForestRegressor::new(5);
        assert!(matches!(rf.predict(&array![[1.0, 2.0]]), Err(WireRodError::ModelNotFitted)));
    }
}
