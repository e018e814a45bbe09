//! Session endpoints

use crate::types::{
    CreateSessionResponse, EventsQuery, EventsResponse, GatewayError, GatewayResult,
    MessageAccepted, MessageRequest,
};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use gatekeeper_session::SessionManager;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

/// Longest a poll may wait for the next event
pub const MAX_POLL_TIMEOUT_SECS: f64 = 30.0;

#[derive(Clone)]
pub struct GatewayState {
    pub manager: Arc<SessionManager>,
}

impl GatewayState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

/// Session routes, relative to the API prefix
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/session", post(create_session))
        .route("/session/{session_id}/message", post(post_message))
        .route("/session/{session_id}/events", get(get_events))
        .with_state(state)
}

pub async fn create_session(
    State(state): State<GatewayState>,
) -> GatewayResult<(StatusCode, Json<CreateSessionResponse>)> {
    let session = state.manager.create_session().await?;
    let events = session.drain_output_nowait();
    info!(session_id = %session.id(), initial_events = events.len(), "Session opened");

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id().to_string(),
            events,
            completed: session.is_completed(),
            secret_unlocked: session.secret_revealed(),
        }),
    ))
}

pub async fn post_message(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> GatewayResult<Json<MessageAccepted>> {
    let session = state.manager.get_session(&session_id)?;
    let Json(body) = body.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;

    // Trimming only decides emptiness; the line is relayed exactly as typed
    if body.content.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "Message cannot be empty".to_string(),
        ));
    }

    let chars = body.content.len();
    session.enqueue_user_message(body.content)?;
    debug!(session_id = %session_id, chars, "Message accepted");

    Ok(Json(MessageAccepted {
        status: "accepted".to_string(),
    }))
}

pub async fn get_events(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> GatewayResult<Json<EventsResponse>> {
    let session = state.manager.get_session(&session_id)?;
    let Query(query) = query.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let timeout = poll_timeout(query.timeout)?;

    let events = session.poll_events(timeout).await;

    Ok(Json(EventsResponse {
        events,
        completed: session.is_completed(),
        secret_unlocked: session.secret_revealed(),
    }))
}

fn poll_timeout(secs: Option<f64>) -> GatewayResult<Duration> {
    let secs = secs.unwrap_or(0.0);
    if !(0.0..=MAX_POLL_TIMEOUT_SECS).contains(&secs) {
        return Err(GatewayError::InvalidRequest(format!(
            "timeout must be between 0 and {} seconds",
            MAX_POLL_TIMEOUT_SECS
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}
