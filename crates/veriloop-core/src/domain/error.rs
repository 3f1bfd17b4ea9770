//! Domain-level error taxonomy for Veriloop.

use std::path::PathBuf;

use super::artifact::ArtifactKind;

/// Veriloop domain errors.
#[derive(Debug, thiserror::Error)]
pub enum VeriloopError {
    #[error("artifact {kind} not found at {}", path.display())]
    ArtifactNotFound { kind: ArtifactKind, path: PathBuf },

    #[error("generator for {artifact} failed: {reason}")]
    Generator {
        artifact: ArtifactKind,
        reason: String,
    },

    #[error("fault attribution failed: {0}")]
    Attribution(String),

    #[error("delegate error: {0}")]
    Delegate(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("report digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Veriloop domain operations.
pub type Result<T> = std::result::Result<T, VeriloopError>;
