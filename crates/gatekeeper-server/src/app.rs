//! Application wiring
//!
//! Everything is constructed here from a validated [`ServerConfig`] and
//! injected downwards; there are no process-wide singletons.

use crate::config::{ConfigError, ServerConfig};
use axum::Router;
use gatekeeper_core::engine::ChatModel;
use gatekeeper_dialogue::gatekeeper_team;
use gatekeeper_egress::{
    client::HttpClientConfig,
    openai::{OpenAIConfig, OpenAIConnector},
};
use gatekeeper_ingress::{GatewayState, router as session_router, with_gateway_layers};
use gatekeeper_observability::{HealthState, Metrics, health_router};
use gatekeeper_session::{SecretCode, SessionManager};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create model client: {0}")]
    Model(#[from] gatekeeper_egress::EgressError),

    #[error("Failed to build dialogue team: {0}")]
    Dialogue(#[from] gatekeeper_core::Error),
}

/// Provider connector configuration derived from the server config
pub fn connector_config(config: &ServerConfig) -> Result<OpenAIConfig, ConfigError> {
    let client_config = HttpClientConfig {
        timeout_secs: config.provider.timeout_secs,
        connect_timeout_secs: config.provider.connect_timeout_secs,
        max_retries: config.provider.max_retries,
        ..HttpClientConfig::default()
    };

    Ok(OpenAIConfig {
        client_config,
        ..OpenAIConfig::new(config.api_key()?)
            .with_base_url(&config.provider.base_url)
            .with_model(&config.provider.model)
    })
}

pub fn build_model(config: &ServerConfig) -> Result<Arc<dyn ChatModel>, AppError> {
    let connector = OpenAIConnector::new(connector_config(config)?)?;
    Ok(Arc::new(connector))
}

/// Session manager running the gatekeeper team against `model`
pub fn build_manager(
    config: &ServerConfig,
    model: Arc<dyn ChatModel>,
    metrics: Arc<Metrics>,
) -> Result<Arc<SessionManager>, AppError> {
    let team = gatekeeper_team(model, config.dialogue.max_turns)?;
    let manager = SessionManager::new(
        Arc::new(team),
        config.dialogue.task.clone(),
        SecretCode::new(config.secret_code()?),
        config.session.clone(),
    )
    .with_metrics(metrics);

    Ok(Arc::new(manager))
}

/// Normalized mount point for the session API, `None` for the root
fn mount_point(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{}", trimmed))
    }
}

/// Full HTTP application: session API under `api_prefix`, health routes at
/// the root, all behind the gateway layers
pub fn build_router(manager: Arc<SessionManager>, metrics: Arc<Metrics>, api_prefix: &str) -> Router {
    let api = session_router(GatewayState::new(manager.clone()));
    let api = match mount_point(api_prefix) {
        Some(prefix) => Router::new().nest(&prefix, api),
        None => api,
    };

    let health = health_router(HealthState::with_readiness_checker(metrics, manager));

    with_gateway_layers(api.merge(health))
}
