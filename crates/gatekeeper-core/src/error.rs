//! Error types for Gatekeeper Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure while waiting for the next user line.
///
/// Anything other than cancellation is folded into `Failed` so the engine sees
/// a single descriptive error regardless of what went wrong underneath.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("User input cancelled")]
    Cancelled,

    #[error("Failed to receive user input: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
