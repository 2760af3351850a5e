//! Runtime contract errors
//!
//! These indicate a wiring bug between a program and the runtime. They are
//! returned to the integrator and never recovered from inside the runtime.

use thiserror::Error;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("[tea] unhandled message: {message}")]
    UnhandledMessage { message: String },

    #[error("[tea] keys added outside of initial model: {fields:?}")]
    ModelShape { fields: Vec<String> },

    #[error("[tea] model must serialize to a record, got {kind}")]
    ModelNotRecord { kind: &'static str },

    #[error("[tea] model serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RuntimeError {
    pub fn unhandled(message: impl Into<String>) -> Self {
        RuntimeError::UnhandledMessage {
            message: message.into(),
        }
    }
}
