//! Gatekeeper Egress Connectors
//!
//! This crate provides the connector to the downstream chat model:
//! - OpenAI-compatible chat completions (used with Gemini's OpenAI endpoint)
//! - Shared HTTP client construction and retry policy

pub mod client;
pub mod openai;

use thiserror::Error;

/// Egress error types
#[derive(Debug, Error)]
pub enum EgressError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Provider error ({status_code}): {message}")]
    ProviderError { status_code: u16, message: String },

    #[error("Rate limit exceeded{}", retry_after_secs.map(|s| format!(": retry after {}s", s)).unwrap_or_default())]
    RateLimitExceeded { retry_after_secs: Option<u64> },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl From<EgressError> for gatekeeper_core::Error {
    fn from(err: EgressError) -> Self {
        gatekeeper_core::Error::Model(err.to_string())
    }
}

/// Egress result type
pub type Result<T> = std::result::Result<T, EgressError>;
