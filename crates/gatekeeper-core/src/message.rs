//! Chat message types
//!
//! `ChatMessage` is what participants say to each other inside a dialogue.
//! `ChatTurn` is the flattened role/content pair sent to a chat model.

use serde::{Deserialize, Serialize};

/// Source name used for the task message that opens every dialogue
pub const TASK_SOURCE: &str = "user";

/// A finalized message produced by a dialogue participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Name of the participant that produced the message
    pub source: String,

    /// Message body
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a plain text message
    pub fn text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// Render the message body as plain text
    pub fn to_text(&self) -> String {
        self.content.to_text()
    }
}

/// Content of a message (text or multimodal)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),

    /// Multimodal content (text, images, etc.)
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Normalize to plain text. Text parts are joined by newlines and
    /// non-text parts are replaced with a placeholder.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => text.as_str(),
                    ContentPart::Image { .. } => "<image>",
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A part of multimodal content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { url: String },
}

/// Role of a message sent to a chat model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single role/content pair in a model request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request to a chat model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation so far, system prompt first
    pub messages: Vec<ChatTurn>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Token usage reported by a chat model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A completed model reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}
