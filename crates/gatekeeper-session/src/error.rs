//! Session error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Maximum session limit ({0}) reached")]
    CapacityExceeded(usize),

    #[error("Input channel for session {0} is closed")]
    InputClosed(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
