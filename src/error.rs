//! Error types for the inference and clustering pipeline

use thiserror::Error;

/// Message returned to callers for every input validation failure.
///
/// The detailed reason is logged, never disclosed.
pub const INVALID_INPUT_MESSAGE: &str = "Invalid Input";

/// Errors that can occur while loading artifacts or serving a request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// A required model or dataset artifact is missing or corrupt
    #[error("Failed to load {artifact}: {reason}")]
    StartupFailure { artifact: String, reason: String },

    /// Malformed, missing or non-finite feature fields, or a classifier computation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested cluster count outside the supported range
    #[error("{0}")]
    OutOfRange(String),

    /// Failure inside the K-Means computation itself
    #[error("{0}")]
    ClusteringFailure(String),

    /// Failure while drawing or encoding the plot
    #[error("{0}")]
    RenderFailure(String),
}

impl ServiceError {
    pub fn startup(artifact: impl Into<String>, reason: impl ToString) -> Self {
        ServiceError::StartupFailure {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_input(detail: impl Into<String>) -> Self {
        ServiceError::InvalidInput(detail.into())
    }

    pub fn render(err: impl ToString) -> Self {
        ServiceError::RenderFailure(err.to_string())
    }

    /// Text safe to hand back to a caller.
    ///
    /// Validation failures collapse to [`INVALID_INPUT_MESSAGE`]; range,
    /// clustering and render failures carry their own message.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::InvalidInput(_) => INVALID_INPUT_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Only artifact loading failures stop the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::StartupFailure { .. })
    }
}
