//! OpenAI-compatible egress connector
//!
//! Gemini exposes an OpenAI-compatible chat completions endpoint, so the same
//! wire types serve both providers.

use crate::{
    EgressError, Result,
    client::{HttpClientConfig, create_client, with_retry},
};
use async_trait::async_trait;
use gatekeeper_core::{
    engine::ChatModel,
    message::{ChatCompletion, ChatRequest, ChatRole, Usage},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Default base URL for Gemini's OpenAI-compatible API
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// OpenAI connector configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL without the trailing `/chat/completions`
    pub base_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl OpenAIConfig {
    /// Create a configuration targeting Gemini's OpenAI-compatible endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GEMINI_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client_config: HttpClientConfig::default(),
        }
    }

    /// Set the base URL (for custom endpoints)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// A model listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

/// OpenAI-compatible connector
pub struct OpenAIConnector {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIConnector {
    /// Create a new connector
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EgressError::ConfigError("API key is empty".to_string()));
        }
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    /// List models available to the configured key
    #[instrument(skip(self))]
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.config.endpoint("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let list: OpenAIModelList = check_status(response).await?.json().await.map_err(|e| {
            EgressError::ParseError(format!("Failed to parse model list: {}", e))
        })?;
        Ok(list.data)
    }

    /// Send a chat completions request and return the raw response
    #[instrument(skip(self, request), fields(model = %self.config.model, messages = request.messages.len()))]
    async fn send(&self, request: &OpenAIChatRequest) -> Result<OpenAIChatResponse> {
        debug!("Sending chat completion request");

        let max_retries = self.config.client_config.max_retries;
        with_retry(max_retries, || async move {
            let response = self
                .client
                .post(self.config.endpoint("chat/completions"))
                .bearer_auth(&self.config.api_key)
                .json(request)
                .send()
                .await?;

            debug!("Chat completion response status: {}", response.status());

            check_status(response)
                .await?
                .json::<OpenAIChatResponse>()
                .await
                .map_err(|e| EgressError::ParseError(format!("Failed to parse chat response: {}", e)))
        })
        .await
    }
}

#[async_trait]
impl ChatModel for OpenAIConnector {
    async fn complete(&self, request: ChatRequest) -> gatekeeper_core::Result<ChatCompletion> {
        let openai_req = to_openai_request(&self.config.model, request);
        let response = self.send(&openai_req).await?;
        Ok(from_openai_response(response)?)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types (only the fields we use)

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

// Conversion functions

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

fn to_openai_request(model: &str, request: ChatRequest) -> OpenAIChatRequest {
    OpenAIChatRequest {
        model: model.to_string(),
        messages: request
            .messages
            .into_iter()
            .map(|turn| OpenAIMessage {
                role: role_name(turn.role).to_string(),
                content: Some(turn.content),
            })
            .collect(),
        temperature: request.temperature,
    }
}

fn from_openai_response(response: OpenAIChatResponse) -> Result<ChatCompletion> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| EgressError::ParseError("Response contained no choices".to_string()))?;

    Ok(ChatCompletion {
        content: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
        usage: response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

/// Map non-success statuses to egress errors
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_code = status.as_u16();
    if status_code == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        return Err(EgressError::RateLimitExceeded { retry_after_secs });
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    Err(EgressError::ProviderError {
        status_code,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_core::message::ChatTurn;

    #[test]
    fn test_openai_config_builder() {
        let config = OpenAIConfig::new("test-key")
            .with_base_url("https://custom.api.com/v1/")
            .with_model("gemini-1.5-pro");

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(
            config.endpoint("chat/completions"),
            "https://custom.api.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_default_targets_gemini() {
        let config = OpenAIConfig::new("k");
        assert_eq!(config.base_url, GEMINI_OPENAI_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_connector_rejects_empty_key() {
        let result = OpenAIConnector::new(OpenAIConfig::new("  "));
        assert!(matches!(result, Err(EgressError::ConfigError(_))));
    }

    #[test]
    fn test_to_openai_request() {
        let request = ChatRequest {
            messages: vec![
                ChatTurn::new(ChatRole::System, "be rude"),
                ChatTurn::new(ChatRole::User, "hi"),
                ChatTurn::new(ChatRole::Assistant, "no"),
            ],
            temperature: Some(0.2),
        };

        let openai_req = to_openai_request("gemini-2.0-flash", request);
        assert_eq!(openai_req.model, "gemini-2.0-flash");
        let roles: Vec<_> = openai_req.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(openai_req.messages[1].content.as_deref(), Some("hi"));
        assert_eq!(openai_req.temperature, Some(0.2));
    }

    #[test]
    fn test_from_openai_response() {
        let response: OpenAIChatResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gemini-2.0-flash",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "yes\nTERMINATE"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }))
        .unwrap();

        let completion = from_openai_response(response).unwrap();
        assert_eq!(completion.content, "yes\nTERMINATE");
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_from_openai_response_without_choices() {
        let response: OpenAIChatResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            from_openai_response(response),
            Err(EgressError::ParseError(_))
        ));
    }

    #[test]
    fn test_null_content_becomes_empty_text() {
        let response: OpenAIChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap();
        assert_eq!(from_openai_response(response).unwrap().content, "");
    }
}
