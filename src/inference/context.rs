//! Read-only prediction context built from a matched artifact pair

use crate::error::{Result, WireRodError};
use crate::export::{ArtifactBundle, ArtifactHeader};
use crate::preprocessing::StandardScaler;
use crate::quality::{QualityPolicy, Verdict};
use crate::schema::{FeatureSchema, ProcessSample, TargetVector, N_FEATURES};
use crate::training::{RandomForestRegressor, RegressionMetrics, TrainingOutcome};
use ndarray::{Array2, ArrayView1};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of predicting one process sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub targets: TargetVector,
    pub verdict: Verdict,
    /// Targets that fail the quality policy
    pub failing: Vec<&'static str>,
    /// Inputs outside their documented range (informational only)
    pub out_of_range: Vec<&'static str>,
}

/// Fitted scaler, forest and quality policy from one training run.
///
/// Immutable after construction; share it as `Arc<InferenceContext>`.
#[derive(Debug, Clone)]
pub struct InferenceContext {
    header: ArtifactHeader,
    scaler: StandardScaler,
    model: RandomForestRegressor,
    policy: QualityPolicy,
    metrics: RegressionMetrics,
}

impl InferenceContext {
    /// Load and cross-check the artifact pair stored in `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let ctx = Self::from_bundle(ArtifactBundle::load(dir)?)?;
        info!(
            dir = %dir.display(),
            artifact_id = %ctx.header.artifact_id,
            trees = ctx.model.n_trees(),
            policy = ?ctx.policy.kind(),
            "Loaded inference context"
        );
        Ok(ctx)
    }

    pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self> {
        bundle.validate()?;
        if bundle.model.header.schema.n_features() != N_FEATURES {
            return Err(WireRodError::ArtifactMismatch(format!(
                "artifact expects {} features, this build reads {}",
                bundle.model.header.schema.n_features(),
                N_FEATURES
            )));
        }
        bundle.model.header.schema.ensure_matches(&FeatureSchema::default())?;

        Ok(Self {
            header: bundle.model.header,
            scaler: bundle.scaler.scaler,
            model: bundle.model.model,
            policy: bundle.model.policy,
            metrics: bundle.model.metrics,
        })
    }

    /// Build directly from a fresh training run, without touching disk
    pub fn from_outcome(outcome: &TrainingOutcome) -> Result<Self> {
        Self::from_bundle(ArtifactBundle::from_outcome(outcome))
    }

    /// Scale, predict and classify one sample
    pub fn predict(&self, sample: &ProcessSample) -> Result<Prediction> {
        let raw = ArrayView1::from(&sample.as_array()[..]);
        let scaled = self.scaler.transform_row(raw)?;
        let output = self.model.predict_row(scaled.view())?;
        let targets = TargetVector::from_slice(&output.to_vec())?;

        let failing = self.policy.failing_targets(&targets);
        let verdict = if failing.is_empty() {
            Verdict::Good
        } else {
            Verdict::NotGood
        };

        debug!(
            uts = targets.uts,
            elongation = targets.elongation,
            conductivity = targets.conductivity,
            verdict = %verdict,
            "Predicted sample"
        );

        let out_of_range = sample.out_of_range();
        if !out_of_range.is_empty() {
            warn!(fields = ?out_of_range, "Process parameters outside their documented range");
        }

        Ok(Prediction {
            targets,
            verdict,
            failing,
            out_of_range,
        })
    }

    /// Predict many samples at once
    pub fn predict_batch(&self, samples: &[ProcessSample]) -> Result<Vec<Prediction>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let x = Array2::from_shape_fn((samples.len(), N_FEATURES), |(i, j)| {
            samples[i].as_array()[j]
        });
        let scaled = self.scaler.transform(&x)?;
        let outputs = self.model.predict(&scaled)?;

        let flagged = samples.iter().filter(|s| !s.out_of_range().is_empty()).count();
        if flagged > 0 {
            warn!(flagged, total = samples.len(), "Samples with parameters outside their documented range");
        }

        samples
            .iter()
            .zip(outputs.rows())
            .map(|(sample, row)| {
                let targets = TargetVector::from_slice(&row.to_vec())?;
                let failing = self.policy.failing_targets(&targets);
                Ok(Prediction {
                    targets,
                    verdict: self.policy.classify(&targets),
                    failing,
                    out_of_range: sample.out_of_range(),
                })
            })
            .collect()
    }

    pub fn header(&self) -> &ArtifactHeader {
        &self.header
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.header.schema
    }

    pub fn policy(&self) -> &QualityPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &RegressionMetrics {
        &self.metrics
    }

    pub fn n_trees(&self) -> usize {
        self.model.n_trees()
    }
}
