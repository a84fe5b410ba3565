//! Error types for the liveness gate
//!
//! Only capture-stage failures are fatal to a session. Analyzer shortfalls are
//! reported on the layer result instead (see [`crate::types::LayerFailure`]).

use thiserror::Error;

/// Errors that can end a liveness session or its surrounding plumbing
#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Insufficient frames: captured {captured}, required {required}")]
    InsufficientFrames { captured: usize, required: usize },

    #[error("Capture aborted by operator after {captured} frames")]
    Aborted { captured: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LivenessError {
    /// Whether the caller may offer the operator a fresh challenge
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LivenessError::InsufficientFrames { .. } | LivenessError::Aborted { .. }
        )
    }
}

impl From<image::ImageError> for LivenessError {
    fn from(e: image::ImageError) -> Self {
        LivenessError::Image(e.to_string())
    }
}
