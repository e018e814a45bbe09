//! Shared gateway types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatekeeper_core::events::SessionEvent;
use gatekeeper_session::SessionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request ID for tracing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("req_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Accept a caller-supplied id if it is short printable ASCII
    pub fn from_header(value: &str) -> Option<Self> {
        let valid = !value.is_empty()
            && value.len() <= 128
            && value.bytes().all(|b| b.is_ascii_graphic());
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Session not found")]
    SessionNotFound(String),

    #[error("Maximum session limit ({0}) reached")]
    CapacityExceeded(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            GatewayError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found_error"),
            GatewayError::CapacityExceeded(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "overloaded_error")
            }
            GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => GatewayError::SessionNotFound(id),
            SessionError::CapacityExceeded(max) => GatewayError::CapacityExceeded(max),
            SessionError::InputClosed(_) => GatewayError::Internal(err.to_string()),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Body of `POST /session/{id}/message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAccepted {
    pub status: String,
}

/// Query of `GET /session/{id}/events`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsQuery {
    /// Seconds to wait when nothing is queued
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub events: Vec<SessionEvent>,
    pub completed: bool,
    pub secret_unlocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<SessionEvent>,
    pub completed: bool,
    pub secret_unlocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_error_body() {
        let response = GatewayError::SessionNotFound("abc".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Session not found");
        assert_eq!(json["error"]["type"], "not_found_error");
        assert_eq!(json["error"]["code"], 404);
    }

    #[tokio::test]
    async fn test_capacity_maps_to_503() {
        let err: GatewayError = SessionError::CapacityExceeded(5).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Maximum session limit (5) reached");
    }

    #[test]
    fn test_request_id_from_header() {
        assert_eq!(
            RequestId::from_header("abc-123").map(|id| id.as_str().to_string()),
            Some("abc-123".to_string())
        );
        assert!(RequestId::from_header("").is_none());
        assert!(RequestId::from_header("has space").is_none());
        assert!(RequestId::from_header(&"x".repeat(200)).is_none());
    }

    #[test]
    fn test_generated_request_ids_differ() {
        assert_ne!(RequestId::generate(), RequestId::generate());
        assert!(RequestId::generate().as_str().starts_with("req_"));
    }
}
