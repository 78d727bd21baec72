//! Error types for the wire-rod quality predictor

use thiserror::Error;

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, WireRodError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum WireRodError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A single process parameter was missing or not a finite number.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// Persisted scaler and model do not belong together.
    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),
}

impl WireRodError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        WireRodError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for WireRodError {
    fn from(err: polars::error::PolarsError) -> Self {
        WireRodError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for WireRodError {
    fn from(err: serde_json::Error) -> Self {
        WireRodError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for WireRodError {
    fn from(err: ndarray::ShapeError) -> Self {
        WireRodError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WireRodError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_invalid_input_names_field() {
        let err = WireRodError::invalid_input("casting_temp", "not a number: 'abc'");
        assert_eq!(
            err.to_string(),
            "Invalid input for 'casting_temp': not a number: 'abc'"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WireRodError = io_err.into();
        assert!(matches!(err, WireRodError::IoError(_)));
    }
}
