//! Multi-output regression tree

use crate::error::{Result, WireRodError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the mean target vector of its samples
    Leaf {
        value: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Regression tree predicting all targets jointly.
///
/// Splits minimise the summed per-target variance of the children, so a
/// single tree structure serves every output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn (without replacement) at each split; all when `None`
    pub max_features: Option<usize>,
    /// Seed for feature sub-sampling
    pub random_state: Option<u64>,
    n_features: usize,
    n_outputs: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Running sums for one side of a candidate split
#[derive(Clone)]
struct SplitStats {
    count: usize,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl SplitStats {
    fn empty(n_outputs: usize) -> Self {
        Self {
            count: 0,
            sum: vec![0.0; n_outputs],
            sq_sum: vec![0.0; n_outputs],
        }
    }

    fn add(&mut self, row: ArrayView1<f64>) {
        self.count += 1;
        for (k, &v) in row.iter().enumerate() {
            self.sum[k] += v;
            self.sq_sum[k] += v * v;
        }
    }

    fn remove(&mut self, row: ArrayView1<f64>) {
        self.count -= 1;
        for (k, &v) in row.iter().enumerate() {
            self.sum[k] -= v;
            self.sq_sum[k] -= v * v;
        }
    }

    /// Sum over outputs of Var = E[X²] - E[X]²
    fn impurity(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        self.sum
            .iter()
            .zip(self.sq_sum.iter())
            .map(|(s, sq)| (sq / n - (s / n).powi(2)).max(0.0))
            .sum()
    }
}

impl DecisionTree {
    /// Create a new regressor tree
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
            n_outputs: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
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

    /// Set number of candidate features per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to `x` (samples × features) and `y` (samples × outputs)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.nrows() {
            return Err(WireRodError::ShapeError {
                expected: format!("y rows = {}", n_samples),
                actual: format!("y rows = {}", y.nrows()),
            });
        }

        if n_samples == 0 || y.ncols() == 0 {
            return Err(WireRodError::TrainingError(
                "cannot fit a tree on empty data".to_string(),
            ));
        }

        self.n_features = n_features;
        self.n_outputs = y.ncols();

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(y, indices);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || stats.impurity() <= 1e-12;

        if should_stop {
            return Self::leaf(&stats);
        }

        let Some((feature_idx, threshold, gain)) = self.find_best_split(x, y, indices, &stats, rng)
        else {
            return Self::leaf(&stats);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return Self::leaf(&stats);
        }

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity: stats.impurity(),
        }
    }

    fn node_stats(&self, y: &Array2<f64>, indices: &[usize]) -> SplitStats {
        let mut stats = SplitStats::empty(y.ncols());
        for &i in indices {
            stats.add(y.row(i));
        }
        stats
    }

    fn leaf(stats: &SplitStats) -> TreeNode {
        let n = stats.count.max(1) as f64;
        TreeNode::Leaf {
            value: stats.sum.iter().map(|s| s / n).collect(),
            n_samples: stats.count,
        }
    }

    /// Best `(feature, threshold, impurity decrease)` among the candidate features.
    ///
    /// Each candidate feature is swept once in sorted order with running sums,
    /// so every threshold is evaluated in O(outputs).
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        indices: &[usize],
        parent: &SplitStats,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let n_features = x.ncols();
        let n_candidates = self.max_features.unwrap_or(n_features).clamp(1, n_features);

        let mut candidates: Vec<usize> = if n_candidates < n_features {
            sample(rng, n_features, n_candidates).into_vec()
        } else {
            (0..n_features).collect()
        };
        candidates.sort_unstable();

        let parent_impurity = parent.impurity();
        let n = indices.len() as f64;
        let mut best: Option<(usize, f64, f64)> = None;

        for feature_idx in candidates {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| {
                x[[a, feature_idx]]
                    .partial_cmp(&x[[b, feature_idx]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left = SplitStats::empty(y.ncols());
            let mut right = parent.clone();

            for pos in 0..order.len() - 1 {
                let row = order[pos];
                left.add(y.row(row));
                right.remove(y.row(row));

                let current = x[[row, feature_idx]];
                let next = x[[order[pos + 1], feature_idx]];
                if next <= current {
                    continue;
                }
                if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left.count as f64 * left.impurity()
                    + right.count as f64 * right.impurity())
                    / n;
                let gain = parent_impurity - weighted;

                if gain > best.map_or(1e-12, |b| b.2) {
                    best = Some((feature_idx, (current + next) / 2.0, gain));
                }
            }
        }

        best
    }

    /// Predict one row of target values per sample
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(WireRodError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(WireRodError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut out = Array2::zeros((x.nrows(), self.n_outputs));
        for (i, sample) in x.rows().into_iter().enumerate() {
            let leaf = Self::predict_sample(root, sample);
            for (k, v) in leaf.iter().enumerate() {
                out[[i, k]] = *v;
            }
        }
        Ok(out)
    }

    /// Leaf value reached by a single (already scaled) sample
    pub fn predict_row(&self, sample: ArrayView1<f64>) -> Result<&[f64]> {
        let root = self.root.as_ref().ok_or(WireRodError::ModelNotFitted)?;
        if sample.len() != self.n_features {
            return Err(WireRodError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", sample.len()),
            });
        }
        Ok(Self::predict_sample(root, sample))
    }

    fn predict_sample<'a>(node: &'a TreeNode, sample: ArrayView1<f64>) -> &'a [f64] {
        match node {
            TreeNode::Leaf { value, .. } => value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        // A fully grown tree memorises distinct training points
        let predictions = tree.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9, "expected {}, got {}", t, p);
        }
    }

    #[test]
    fn test_leaf_is_mean_vector() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_n_leaves(), 1);
        let p = tree.predict(&array![[1.0]]).unwrap();
        assert!((p[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((p[[0, 1]] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![[0.0], [1.0], [2.0], [3.0]];

        let mut tree = DecisionTree::new().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
        assert!(tree.get_n_leaves() <= 2);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];

        let mut tree = DecisionTree::new().with_min_samples_leaf(3);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![[0.0], [0.0], [1.0], [1.0]];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(WireRodError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let x = array![[1.0], [2.0]];
        let y = array![[1.0]];
        let mut tree = DecisionTree::new();
        assert!(matches!(tree.fit(&x, &y), Err(WireRodError::ShapeError { .. })));
    }
}
