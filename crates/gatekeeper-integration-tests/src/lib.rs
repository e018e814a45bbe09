//! Shared harness for the end-to-end gateway tests
//!
//! Builds the full HTTP application exactly as the server binary does, with
//! the model provider replaced by a wiremock server that behaves like the
//! gatekeeper prompt: it only says yes to the exact trigger phrase.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use gatekeeper_core::termination::TRIGGER_PHRASE;
use gatekeeper_observability::Metrics;
use gatekeeper_server::{
    app::{build_manager, build_model, build_router},
    config::ServerConfig,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::{
    Match, Mock, MockServer, Request as MockRequest, ResponseTemplate,
    matchers::{method, path},
};

pub const TEST_SECRET: &str = "integration-secret";

/// Matches chat requests whose latest user turn is exactly `expected`
pub struct LastUserMessageIs(pub String);

impl Match for LastUserMessageIs {
    fn matches(&self, request: &MockRequest) -> bool {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return false;
        };
        body["messages"]
            .as_array()
            .and_then(|messages| messages.iter().rev().find(|m| m["role"] == "user"))
            .and_then(|m| m["content"].as_str())
            .is_some_and(|content| content == self.0)
    }
}

pub fn completion_body(content: &str) -> Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gemini-2.0-flash",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    })
}

/// Start a mock provider that refuses everything but the trigger phrase
pub async fn gatekeeper_provider() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(LastUserMessageIs(TRIGGER_PHRASE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("yes\nTERMINATE")))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("Ugh. No. Figure it out.")),
        )
        .mount(&server)
        .await;

    server
}

pub fn test_config(provider_url: &str) -> ServerConfig {
    let mut config = ServerConfig {
        secret_code: Some(TEST_SECRET.to_string()),
        ..ServerConfig::default()
    };
    config.provider.api_key = Some("test-key".to_string());
    config.provider.base_url = provider_url.to_string();
    config.provider.max_retries = 0;
    config
}

/// The full application plus its metrics
pub struct TestGateway {
    pub app: Router,
    pub metrics: Arc<Metrics>,
}

impl TestGateway {
    pub fn new(config: &ServerConfig) -> Self {
        let metrics = Arc::new(Metrics::new().expect("metrics"));
        let model = build_model(config).expect("model");
        let manager = build_manager(config, model, metrics.clone()).expect("manager");
        let app = build_router(manager, metrics.clone(), &config.api_prefix);
        Self { app, metrics }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn create_session(&self) -> (String, Value) {
        let (status, body) = self.request(Method::POST, "/api/session", None).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        let id = body["session_id"].as_str().expect("session_id").to_string();
        (id, body)
    }

    /// Create a session and wait until the candidate is prompted for input
    pub async fn open_session(&self) -> (String, Value) {
        let (id, created) = self.create_session().await;
        let prompted = created["events"]
            .as_array()
            .is_some_and(|events| events.iter().any(|e| is_type(e, "input_required")));
        if !prompted {
            self.poll_until(&id, |e| is_type(e, "input_required")).await;
        }
        (id, created)
    }

    pub async fn send_message(&self, session_id: &str, content: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            &format!("/api/session/{}/message", session_id),
            Some(serde_json::json!({ "content": content })),
        )
        .await
    }

    pub async fn poll(&self, session_id: &str, timeout: f64) -> Value {
        let (status, body) = self
            .request(
                Method::GET,
                &format!("/api/session/{}/events?timeout={}", session_id, timeout),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "poll failed: {}", body);
        body
    }

    /// Poll until an event matching `done` arrives, collecting everything seen
    pub async fn poll_until(
        &self,
        session_id: &str,
        done: impl Fn(&Value) -> bool,
    ) -> (Vec<Value>, Value) {
        let mut events = Vec::new();
        let mut last = Value::Null;
        for _ in 0..20 {
            last = self.poll(session_id, 1.0).await;
            let batch = last["events"].as_array().cloned().unwrap_or_default();
            let finished = batch.iter().any(&done);
            events.extend(batch);
            if finished {
                break;
            }
        }
        (events, last)
    }
}

pub fn is_type(event: &Value, kind: &str) -> bool {
    event["type"] == kind
}
