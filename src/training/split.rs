//! Seeded train/test partitioning

use crate::error::{Result, WireRodError};
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Row indices of a single train/test partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffle-and-cut splitter.
///
/// The held-out partition has `ceil(n_samples * test_size)` rows. With a seed
/// the partition is reproducible; without one it is drawn from entropy.
#[derive(Debug, Clone)]
pub struct Splitter {
    test_size: f64,
    random_state: Option<u64>,
}

impl Splitter {
    pub fn new(test_size: f64) -> Self {
        Self {
            test_size,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Partition `0..n_samples`
    pub fn split(&self, n_samples: usize) -> Result<TrainTestSplit> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(WireRodError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }

        let n_test = (n_samples as f64 * self.test_size).ceil() as usize;
        let n_train = n_samples.saturating_sub(n_test);
        if n_test == 0 || n_train == 0 {
            return Err(WireRodError::ValidationError(format!(
                "cannot split {} samples with test_size {}: both partitions must be non-empty",
                n_samples, self.test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        indices.shuffle(&mut rng);

        let train_indices = indices.split_off(n_test);
        Ok(TrainTestSplit {
            train_indices,
            test_indices: indices,
        })
    }
}

impl TrainTestSplit {
    /// Select `(train, test)` rows of a matrix
    pub fn apply(&self, data: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        (
            data.select(Axis(0), &self.train_indices),
            data.select(Axis(0), &self.test_indices),
        )
    }
}
