//! Error types for the health inference core

use crate::artifacts::ArtifactKind;
use thiserror::Error;

/// Errors that can occur while encoding inputs or running inference
#[derive(Error, Debug)]
pub enum HealthError {
    /// One or more model artifacts are not loaded
    #[error("Models not loaded correctly: missing {0}")]
    ModelUnavailable(String),

    /// Caller omitted a required feature value
    #[error("Missing input for: {0}")]
    MissingFeature(String),

    /// Feature has no known vocabulary
    #[error("Encoder missing for: {0}")]
    MissingEncoder(String),

    /// Failure inside the scaling or classification step
    #[error("Prediction error: {0}")]
    PredictionFailure(String),

    /// Artifacts disagree with the declared feature schema
    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Schema declaration is malformed
    #[error("Invalid feature schema: {0}")]
    InvalidSchema(String),

    /// Artifact could not be read or parsed
    #[error("Failed to load {artifact} artifact: {reason}")]
    ArtifactLoad {
        artifact: ArtifactKind,
        reason: String,
    },

    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HealthError {
    /// Whether the error was caused by the caller's input rather than the artifacts.
    pub fn is_input_error(&self) -> bool {
        matches!(self, HealthError::MissingFeature(_))
    }
}

/// Result type for health core operations
pub type Result<T> = std::result::Result<T, HealthError>;
