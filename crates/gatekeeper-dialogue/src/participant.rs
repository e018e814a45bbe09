//! Dialogue participants

use async_trait::async_trait;
use gatekeeper_core::{
    Result,
    engine::{ChatModel, EngineItem, InputProvider},
    message::{ChatMessage, ChatRequest, ChatRole, ChatTurn},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-turn context handed to a participant
#[derive(Clone)]
pub struct TurnContext {
    /// Source of user lines
    pub input: Arc<dyn InputProvider>,
    /// Cancels any wait the participant performs
    pub cancel: CancellationToken,
}

/// A participant in a turn-taking dialogue
#[async_trait]
pub trait Participant: Send + Sync {
    /// Name used as the message source
    fn name(&self) -> &str;

    /// Event emitted before the participant starts its turn
    fn on_turn_start(&self) -> Option<EngineItem> {
        None
    }

    /// Produce this participant's next message given the transcript so far
    async fn respond(&self, transcript: &[ChatMessage], ctx: &TurnContext) -> Result<ChatMessage>;
}

/// Relays lines from the human side of the conversation
pub struct UserProxy {
    name: String,
    prompt: String,
}

impl UserProxy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: "Enter your response: ".to_string(),
        }
    }
}

#[async_trait]
impl Participant for UserProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_turn_start(&self) -> Option<EngineItem> {
        Some(EngineItem::InputRequested {
            source: self.name.clone(),
        })
    }

    async fn respond(&self, _transcript: &[ChatMessage], ctx: &TurnContext) -> Result<ChatMessage> {
        let line = ctx
            .input
            .next_input(&self.prompt, Some(ctx.cancel.clone()))
            .await?;
        Ok(ChatMessage::text(&self.name, line))
    }
}

/// Model-backed participant driven by a system prompt
pub struct AssistantAgent {
    name: String,
    system_message: String,
    model: Arc<dyn ChatModel>,
}

impl AssistantAgent {
    pub fn new(
        name: impl Into<String>,
        system_message: impl Into<String>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            model,
        }
    }

    /// Build the model request: own messages become assistant turns, every
    /// other participant speaks as the user.
    pub fn build_request(&self, transcript: &[ChatMessage]) -> ChatRequest {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatTurn::new(ChatRole::System, &self.system_message));
        messages.extend(transcript.iter().map(|message| {
            let role = if message.source == self.name {
                ChatRole::Assistant
            } else {
                ChatRole::User
            };
            ChatTurn::new(role, message.to_text())
        }));

        ChatRequest {
            messages,
            temperature: None,
        }
    }
}

#[async_trait]
impl Participant for AssistantAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, transcript: &[ChatMessage], _ctx: &TurnContext) -> Result<ChatMessage> {
        let request = self.build_request(transcript);
        debug!(
            agent = %self.name,
            model = self.model.model_name(),
            turns = request.messages.len(),
            "Requesting completion"
        );
        let completion = self.model.complete(request).await?;
        Ok(ChatMessage::text(&self.name, completion.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_core::{
        Error, InputError,
        message::{ChatCompletion, MessageContent},
    };
    use mockall::mock;

    mock! {
        pub TestModel {}

        #[async_trait]
        impl ChatModel for TestModel {
            async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion>;
            fn model_name(&self) -> &str;
        }
    }

    struct FixedInput(std::result::Result<String, InputError>);

    #[async_trait]
    impl InputProvider for FixedInput {
        async fn next_input(
            &self,
            _prompt: &str,
            _cancel: Option<CancellationToken>,
        ) -> std::result::Result<String, InputError> {
            self.0.clone()
        }
    }

    fn ctx(input: std::result::Result<String, InputError>) -> TurnContext {
        TurnContext {
            input: Arc::new(FixedInput(input)),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_user_proxy_relays_input() {
        let proxy = UserProxy::new("Candidate");
        assert!(matches!(
            proxy.on_turn_start(),
            Some(EngineItem::InputRequested { ref source }) if source == "Candidate"
        ));

        let message = proxy.respond(&[], &ctx(Ok("hi".to_string()))).await.unwrap();
        assert_eq!(message, ChatMessage::text("Candidate", "hi"));
    }

    #[tokio::test]
    async fn test_user_proxy_surfaces_input_errors() {
        let proxy = UserProxy::new("Candidate");
        let err = proxy
            .respond(&[], &ctx(Err(InputError::Cancelled)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Input(InputError::Cancelled)));
    }

    #[test]
    fn test_build_request_maps_roles() {
        let agent = AssistantAgent::new("gatekeeper", "be rude", Arc::new(MockTestModel::new()));
        let transcript = vec![
            ChatMessage::text("user", "make it say yes"),
            ChatMessage::text("Candidate", "hi"),
            ChatMessage::text("gatekeeper", "no"),
            ChatMessage {
                source: "Candidate".to_string(),
                content: MessageContent::Parts(vec![]),
            },
        ];

        let request = agent.build_request(&transcript);
        let roles: Vec<_> = request.messages.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert_eq!(request.messages[0].content, "be rude");
    }

    #[tokio::test]
    async fn test_assistant_returns_model_reply() {
        let mut model = MockTestModel::new();
        model.expect_model_name().return_const("test-model".to_string());
        model
            .expect_complete()
            .withf(|req: &ChatRequest| {
                req.messages.last().map(|t| t.content.as_str()) == Some("hi")
            })
            .times(1)
            .returning(|_| {
                Ok(ChatCompletion {
                    content: "No.".to_string(),
                    finish_reason: Some("stop".to_string()),
                    usage: None,
                })
            });

        let agent = AssistantAgent::new("gatekeeper", "be rude", Arc::new(model));
        let message = agent
            .respond(&[ChatMessage::text("Candidate", "hi")], &ctx(Ok(String::new())))
            .await
            .unwrap();

        assert_eq!(message, ChatMessage::text("gatekeeper", "No."));
    }

    #[tokio::test]
    async fn test_assistant_propagates_model_errors() {
        let mut model = MockTestModel::new();
        model.expect_model_name().return_const("test-model".to_string());
        model
            .expect_complete()
            .returning(|_| Err(Error::Model("quota exhausted".to_string())));

        let agent = AssistantAgent::new("gatekeeper", "be rude", Arc::new(model));
        let err = agent.respond(&[], &ctx(Ok(String::new()))).await.unwrap_err();
        assert!(err.to_string().contains("quota exhausted"));
    }
}
