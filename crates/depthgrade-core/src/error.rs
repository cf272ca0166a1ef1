//! Error taxonomy for the effect and its configuration layer.

use std::path::PathBuf;

/// Failures raised while locating, building, or running the grading program.
///
/// `ProgramNotFound` and `ProgramCreation` are fatal for the effect instance:
/// the controller logs them once and stays disabled afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    #[error("shader program not found: {0}")]
    ProgramNotFound(String),
    #[error("failed to create shader program {name}: {reason}")]
    ProgramCreation { name: String, reason: String },
    #[error("render backend error: {0}")]
    Backend(String),
}

impl EffectError {
    /// Whether this error permanently disables the effect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProgramNotFound(_) | Self::ProgramCreation { .. })
    }
}

/// Failures while loading [`EffectSettings`](crate::params::EffectSettings).
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}
