//! Dialogue engine abstractions
//!
//! A dialogue engine turns a task into a stream of [`EngineItem`]s. Whenever a
//! participant needs a line from the human side it pulls one through an
//! [`InputProvider`]. Model calls go through a [`ChatModel`].

use crate::{
    InputError, Result,
    message::{ChatCompletion, ChatMessage, ChatRequest},
};
use futures::Stream;
use std::{pin::Pin, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Stream of items produced by a running dialogue
pub type EngineStream = Pin<Box<dyn Stream<Item = Result<EngineItem>> + Send>>;

/// One item produced by a dialogue engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineItem {
    /// A finalized chat message
    Message(ChatMessage),

    /// A participant is about to wait for user input
    InputRequested { source: String },

    /// Partial model output; the finalized message follows separately
    StreamingChunk { source: String, content: String },

    /// Any other agent-level event
    Agent(AgentEvent),

    /// The dialogue has stopped
    Result(TaskResult),
}

/// Agent-level event that is neither a message nor an input request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEvent {
    pub source: String,
    pub kind: String,
    pub content: String,
}

impl AgentEvent {
    pub fn to_text(&self) -> String {
        format!("[{}] {}", self.kind, self.content)
    }
}

/// Final result of a dialogue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskResult {
    /// Every message exchanged, task message first
    pub messages: Vec<ChatMessage>,

    /// Why the dialogue stopped
    pub stop_reason: Option<String>,
}

/// Supplies user lines to a running dialogue
#[async_trait::async_trait]
pub trait InputProvider: Send + Sync {
    /// Wait for the next user line.
    ///
    /// If `cancel` fires first the wait is abandoned with
    /// [`InputError::Cancelled`] and no queued line is consumed.
    async fn next_input(
        &self,
        prompt: &str,
        cancel: Option<CancellationToken>,
    ) -> std::result::Result<String, InputError>;
}

/// A turn-taking dialogue engine
pub trait DialogueEngine: Send + Sync {
    /// Start a dialogue for `task`. The returned stream ends after a
    /// [`EngineItem::Result`] or the first error.
    fn run_stream(
        &self,
        task: String,
        input: Arc<dyn InputProvider>,
        cancel: CancellationToken,
    ) -> EngineStream;
}

/// A chat completion model
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a non-streaming completion request
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion>;

    /// Model identifier used for requests
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_event_to_text() {
        let event = AgentEvent {
            source: "unhelpful_assistant".to_string(),
            kind: "tool_call".to_string(),
            content: "lookup(\"yes\")".to_string(),
        };
        assert_eq!(event.to_text(), "[tool_call] lookup(\"yes\")");
    }

    #[test]
    fn test_task_result_default_has_no_stop_reason() {
        let result = TaskResult::default();
        assert!(result.messages.is_empty());
        assert!(result.stop_reason.is_none());
    }
}
