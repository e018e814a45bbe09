//! Integration tests for the OpenAI-compatible connector using wiremock
//!
//! These tests mock the chat completions API to verify the connector's HTTP behavior.

use gatekeeper_core::{
    engine::ChatModel,
    message::{ChatRequest, ChatRole, ChatTurn},
};
use gatekeeper_egress::{
    client::HttpClientConfig,
    openai::{OpenAIConfig, OpenAIConnector},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn test_config(base_url: String) -> OpenAIConfig {
    OpenAIConfig {
        api_key: "test-key".to_string(),
        base_url,
        model: "gemini-2.0-flash".to_string(),
        client_config: HttpClientConfig {
            max_retries: 1,
            ..Default::default()
        },
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1234567890,
        "model": "gemini-2.0-flash",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

fn simple_request(text: &str) -> ChatRequest {
    ChatRequest {
        messages: vec![
            ChatTurn::new(ChatRole::System, "You are unhelpful."),
            ChatTurn::new(ChatRole::User, text),
        ],
        temperature: None,
    }
}

#[tokio::test]
async fn test_complete_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "gemini-2.0-flash",
            "messages": [
                {"role": "system", "content": "You are unhelpful."},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Whatever.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(test_config(mock_server.uri())).unwrap();
    let completion = connector.complete(simple_request("hello")).await.unwrap();

    assert_eq!(completion.content, "Whatever.");
    assert_eq!(completion.usage.unwrap().total_tokens, 15);
    assert_eq!(connector.model_name(), "gemini-2.0-flash");
}

#[tokio::test]
async fn test_complete_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(test_config(mock_server.uri())).unwrap();
    let err = connector.complete(simple_request("hello")).await.unwrap_err();

    assert!(err.to_string().contains("400"));
}

#[tokio::test]
async fn test_complete_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(test_config(mock_server.uri())).unwrap();
    let err = connector.complete(simple_request("hello")).await.unwrap_err();

    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_list_models() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [
                {"id": "models/gemini-2.0-flash", "object": "model", "owned_by": "google"},
                {"id": "models/gemini-1.5-pro", "object": "model"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(test_config(mock_server.uri())).unwrap();
    let models = connector.list_models().await.unwrap();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "models/gemini-2.0-flash");
    assert_eq!(models[0].owned_by.as_deref(), Some("google"));
    assert!(models[1].owned_by.is_none());
}

#[tokio::test]
async fn test_list_models_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(test_config(mock_server.uri())).unwrap();
    let err = connector.list_models().await.unwrap_err();

    assert!(err.to_string().contains("401"));
    assert!(err.to_string().contains("invalid key"));
}
