//! On-disk artifact pair: `model.json` and `scaler.json`
//!
//! Both files carry the same header (`artifact_id`, `format_version`,
//! `created_at`, schema). A scaler is only ever loaded together with the model
//! it was fitted with.

use crate::error::{Result, WireRodError};
use crate::preprocessing::StandardScaler;
use crate::quality::QualityPolicy;
use crate::schema::FeatureSchema;
use crate::training::{RandomForestRegressor, RegressionMetrics, TrainingConfig, TrainingOutcome};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Bumped whenever the artifact layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";

/// Identity shared by both halves of an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub artifact_id: Uuid,
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub schema: FeatureSchema,
}

impl ArtifactHeader {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            artifact_id: Uuid::new_v4(),
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            schema,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(flatten)]
    pub header: ArtifactHeader,
    pub policy: QualityPolicy,
    pub metrics: RegressionMetrics,
    pub training: TrainingConfig,
    pub model: RandomForestRegressor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    #[serde(flatten)]
    pub header: ArtifactHeader,
    pub scaler: StandardScaler,
}

/// A matched model/scaler pair
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub model: ModelArtifact,
    pub scaler: ScalerArtifact,
}

impl ArtifactBundle {
    /// Stamp a fresh identity onto a training outcome
    pub fn from_outcome(outcome: &TrainingOutcome) -> Self {
        let header = ArtifactHeader::new(outcome.schema.clone());
        Self {
            model: ModelArtifact {
                header: header.clone(),
                policy: outcome.policy.clone(),
                metrics: outcome.report.metrics.clone(),
                training: outcome.config.clone(),
                model: outcome.model.clone(),
            },
            scaler: ScalerArtifact {
                header,
                scaler: outcome.scaler.clone(),
            },
        }
    }

    pub fn header(&self) -> &ArtifactHeader {
        &self.model.header
    }

    /// Write both files into `dir`, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        write_json(&dir.join(MODEL_FILE), &self.model)?;
        write_json(&dir.join(SCALER_FILE), &self.scaler)?;

        info!(
            dir = %dir.display(),
            artifact_id = %self.header().artifact_id,
            "Saved model artifacts"
        );
        Ok(())
    }

    /// Read both files from `dir` and check they belong together
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let model: ModelArtifact = read_json(&dir.join(MODEL_FILE))?;
        let scaler: ScalerArtifact = read_json(&dir.join(SCALER_FILE))?;

        let bundle = Self { model, scaler };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Reject pairs that were not produced by the same training run
    pub fn validate(&self) -> Result<()> {
        let (m, s) = (&self.model.header, &self.scaler.header);

        for (file, version) in [(MODEL_FILE, m.format_version), (SCALER_FILE, s.format_version)] {
            if version != FORMAT_VERSION {
                return Err(WireRodError::ArtifactMismatch(format!(
                    "{} has format version {}, expected {}",
                    file, version, FORMAT_VERSION
                )));
            }
        }

        if m.artifact_id != s.artifact_id {
            return Err(WireRodError::ArtifactMismatch(format!(
                "model {} was not trained with scaler {}",
                m.artifact_id, s.artifact_id
            )));
        }

        m.schema.ensure_matches(&s.schema)?;

        let width = m.schema.n_features();
        if self.scaler.scaler.n_features() != width {
            return Err(WireRodError::ArtifactMismatch(format!(
                "scaler has {} features, schema has {}",
                self.scaler.scaler.n_features(),
                width
            )));
        }
        if self.model.model.n_features() != width {
            return Err(WireRodError::ArtifactMismatch(format!(
                "model has {} features, schema has {}",
                self.model.model.n_features(),
                width
            )));
        }
        if self.model.model.n_outputs() != m.schema.n_targets() {
            return Err(WireRodError::ArtifactMismatch(format!(
                "model predicts {} targets, schema has {}",
                self.model.model.n_outputs(),
                m.schema.n_targets()
            )));
        }
        Ok(())
    }
}

/// Paths of the two artifact files inside `dir`
pub fn artifact_paths(dir: impl AsRef<Path>) -> (PathBuf, PathBuf) {
    let dir = dir.as_ref();
    (dir.join(MODEL_FILE), dir.join(SCALER_FILE))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        WireRodError::InferenceError(format!("cannot open {}: {}", path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        WireRodError::SerializationError(format!("{}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityConfig;
    use crate::synthetic;
    use crate::training::Trainer;
    use tempfile::TempDir;

    fn bundle() -> ArtifactBundle {
        let df = synthetic::generate(30, 2).unwrap();
        let config = TrainingConfig {
            n_estimators: 5,
            ..Default::default()
        };
        let outcome = Trainer::new(config, QualityConfig::default())
            .fit_frame(&df)
            .unwrap();
        ArtifactBundle::from_outcome(&outcome)
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let saved = bundle();
        saved.save(dir.path()).unwrap();

        let (model_path, scaler_path) = artifact_paths(dir.path());
        assert!(model_path.exists());
        assert!(scaler_path.exists());

        let loaded = ArtifactBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.header(), saved.header());
        assert_eq!(loaded.scaler.scaler, saved.scaler.scaler);
        assert_eq!(loaded.model.policy, saved.model.policy);
    }

    #[test]
    fn test_mismatched_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let mut b = bundle();
        b.scaler.header.artifact_id = Uuid::new_v4();
        assert!(matches!(b.save(dir.path()), Err(WireRodError::ArtifactMismatch(_))));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut b = bundle();
        b.model.header.format_version = FORMAT_VERSION + 1;
        b.scaler.header.format_version = FORMAT_VERSION + 1;
        assert!(matches!(b.validate(), Err(WireRodError::ArtifactMismatch(_))));
    }

    #[test]
    fn test_schema_order_checked() {
        let mut b = bundle();
        b.scaler.header.schema.features.swap(0, 1);
        assert!(matches!(b.validate(), Err(WireRodError::ArtifactMismatch(_))));
    }

    #[test]
    fn test_missing_files() {
        let dir = TempDir::new().unwrap();
        assert!(ArtifactBundle::load(dir.path()).is_err());
    }

    #[test]
    fn test_corrupt_json() {
        let dir = TempDir::new().unwrap();
        bundle().save(dir.path()).unwrap();
        fs::write(dir.path().join(MODEL_FILE), "{ not json").unwrap();
        assert!(matches!(
            ArtifactBundle::load(dir.path()),
            Err(WireRodError::SerializationError(_))
        ));
    }
}
