use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by `ComputationalCache`.
///
/// Cloneable so that every caller waiting on the same in-flight computation
/// receives the same failure.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("computation scope for `{key}` is cancelled")]
    ScopeCancelled { key: String },

    #[error("computation for `{key}` failed: {reason}")]
    ComputationFailed {
        key: String,
        reason: Arc<anyhow::Error>,
    },

    #[error("computation for `{key}` panicked")]
    ComputationPanicked { key: String },

    #[error("value cached under `{key}` has a different type")]
    TypeMismatch { key: String },
}

impl CacheError {
    pub fn key(&self) -> &str {
        match self {
            CacheError::ScopeCancelled { key }
            | CacheError::ComputationFailed { key, .. }
            | CacheError::ComputationPanicked { key }
            | CacheError::TypeMismatch { key } => key,
        }
    }
}
