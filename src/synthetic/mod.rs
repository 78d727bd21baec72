//! Synthetic wire-rod datasets
//!
//! Process parameters are drawn uniformly from their documented ranges.
//! Targets depend linearly on `chemical_composition` and `casting_temp` only,
//! plus bounded uniform noise, so a fitted model should recover most of the
//! variance from two of the nine inputs.

use crate::error::{Result, WireRodError};
use crate::schema::{FEATURES, N_TARGETS, TARGET_NAMES};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Linear response of one target: `intercept + a * composition + b * (casting_temp - 600)`
#[derive(Debug, Clone, Copy)]
struct Response {
    intercept: f64,
    composition: f64,
    casting_temp: f64,
    noise: f64,
}

const RESPONSES: [Response; N_TARGETS] = [
    // UTS, MPa
    Response {
        intercept: 140.0,
        composition: 60.0,
        casting_temp: 0.5,
        noise: 1.0,
    },
    // elongation, %
    Response {
        intercept: 25.0,
        composition: -8.0,
        casting_temp: -0.05,
        noise: 0.3,
    },
    // conductivity, % IACS
    Response {
        intercept: 63.0,
        composition: -4.0,
        casting_temp: 0.01,
        noise: 0.1,
    },
];

/// Seeded generator of wire-rod samples
#[derive(Debug, Clone)]
pub struct WireRodGenerator {
    seed: Option<u64>,
    noise_scale: f64,
}

impl Default for WireRodGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl WireRodGenerator {
    pub fn new() -> Self {
        Self {
            seed: None,
            noise_scale: 1.0,
        }
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Multiply every target's noise amplitude; 0 gives noiseless targets
    pub fn with_noise_scale(mut self, scale: f64) -> Self {
        self.noise_scale = scale.max(0.0);
        self
    }

    /// Generate `n_samples` rows with the nine feature columns followed by
    /// `UTS`, `elongation` and `conductivity`.
    pub fn generate(&self, n_samples: usize) -> Result<DataFrame> {
        if n_samples == 0 {
            return Err(WireRodError::InvalidParameter {
                name: "n_samples".to_string(),
                value: "0".to_string(),
                reason: "at least one row is required".to_string(),
            });
        }

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut features: Vec<Vec<f64>> = vec![Vec::with_capacity(n_samples); FEATURES.len()];
        let mut targets: Vec<Vec<f64>> = vec![Vec::with_capacity(n_samples); N_TARGETS];

        for _ in 0..n_samples {
            for (column, spec) in features.iter_mut().zip(FEATURES.iter()) {
                column.push(rng.gen_range(spec.min..=spec.max));
            }

            let composition = features[0][features[0].len() - 1];
            let casting_temp = features[1][features[1].len() - 1];

            for (column, response) in targets.iter_mut().zip(RESPONSES.iter()) {
                let noise = if self.noise_scale > 0.0 {
                    let amplitude = response.noise * self.noise_scale;
                    rng.gen_range(-amplitude..=amplitude)
                } else {
                    0.0
                };
                column.push(
                    response.intercept
                        + response.composition * composition
                        + response.casting_temp * (casting_temp - 600.0)
                        + noise,
                );
            }
        }

        let mut columns: Vec<Column> = FEATURES
            .iter()
            .zip(features)
            .map(|(spec, values)| Column::new(spec.name.into(), values))
            .collect();
        columns.extend(
            TARGET_NAMES
                .iter()
                .zip(targets)
                .map(|(name, values)| Column::new((*name).into(), values)),
        );

        Ok(DataFrame::new(columns)?)
    }
}

/// Seeded dataset with default noise
pub fn generate(n_samples: usize, seed: u64) -> Result<DataFrame> {
    WireRodGenerator::new().with_seed(seed).generate(n_samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FeatureSchema;
    use crate::utils::Dataset;

    #[test]
    fn test_shape_and_columns() {
        let df = generate(25, 7).unwrap();
        assert_eq!(df.height(), 25);
        assert_eq!(df.width(), 12);

        let ds = Dataset::from_frame(&df, &FeatureSchema::default()).unwrap();
        assert_eq!(ds.x.ncols(), 9);
        assert_eq!(ds.y.ncols(), 3);
    }

    #[test]
    fn test_features_within_ranges() {
        let df = generate(200, 11).unwrap();
        let ds = Dataset::from_frame(&df, &FeatureSchema::default()).unwrap();
        for (j, spec) in FEATURES.iter().enumerate() {
            assert!(ds.x.column(j).iter().all(|v| spec.in_expected_range(*v)), "{}", spec.name);
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = generate(10, 3).unwrap();
        let b = generate(10, 3).unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn test_noiseless_targets_are_linear() {
        let df = WireRodGenerator::new()
            .with_seed(1)
            .with_noise_scale(0.0)
            .generate(5)
            .unwrap();
        let ds = Dataset::from_frame(&df, &FeatureSchema::default()).unwrap();
        for i in 0..5 {
            let expected = 140.0 + 60.0 * ds.x[[i, 0]] + 0.5 * (ds.x[[i, 1]] - 600.0);
            assert!((ds.y[[i, 0]] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_rows_rejected() {
        assert!(generate(0, 1).is_err());
    }
}
