//! Model persistence
//!
//! A trained model is saved as a directory holding `model.json` (forest,
//! schema, quality policy, metrics) and `scaler.json` (fitted scaler, schema).

mod artifact;

pub use artifact::{
    artifact_paths, ArtifactBundle, ArtifactHeader, ModelArtifact, ScalerArtifact,
    FORMAT_VERSION, MODEL_FILE, SCALER_FILE,
};
