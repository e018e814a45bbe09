//! Gatekeeper HTTP Gateway
//!
//! This crate provides the HTTP surface over the session manager:
//! - `POST /session`, `POST /session/{id}/message`, `GET /session/{id}/events`
//! - JSON error mapping
//! - Request context middleware (x-request-id)
//! - CORS and request tracing layers

pub mod handlers;
pub mod middleware;
pub mod types;

pub use handlers::{GatewayState, router};
pub use middleware::with_gateway_layers;
pub use types::{GatewayError, GatewayResult, RequestId};
