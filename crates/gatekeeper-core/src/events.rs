//! Client-facing session events
//!
//! Every event a client can receive from a poll is one of these variants. They
//! are serialized with an internal `"type"` tag, e.g.
//! `{"type":"message","role":"Candidate","content":"hi"}` or
//! `{"type":"input_required"}`.

use serde::{Deserialize, Serialize};

/// Role attached to secret reveal events
pub const SECRET_ROLE: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A finalized chat message
    Message { role: String, content: String },

    /// The released secret
    Secret { role: String, content: String },

    /// Session status change
    Status {
        status: SessionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },

    /// The dialogue is waiting for the client to post a message
    InputRequired,

    /// Any other engine-level event rendered as text
    Event { role: String, content: String },
}

impl SessionEvent {
    pub fn message(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Message {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn secret(content: impl Into<String>) -> Self {
        Self::Secret {
            role: SECRET_ROLE.to_string(),
            content: content.into(),
        }
    }

    pub fn status(status: SessionStatus, details: Option<String>) -> Self {
        Self::Status { status, details }
    }

    pub fn event(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Event {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Secret { .. } => "secret",
            Self::Status { .. } => "status",
            Self::InputRequired => "input_required",
            Self::Event { .. } => "event",
        }
    }

    /// Whether this event belongs in the session transcript
    pub fn is_transcript_entry(&self) -> bool {
        matches!(self, Self::Message { .. } | Self::Secret { .. })
    }
}

/// Terminal and error statuses reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The engine finished with a stop reason
    Completed,
    /// The engine stream ended without a final result
    Ended,
    /// The engine failed
    Error,
}
