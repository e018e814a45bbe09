//! Shared gateway middleware

use crate::types::RequestId;
use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension carrying the request id
#[derive(Clone)]
pub struct RequestIdExt(pub RequestId);

/// Tag every request with an id, reusing the caller's `x-request-id` when it
/// is usable, and echo it on the response
pub async fn request_context_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(RequestId::from_header)
        .unwrap_or_else(RequestId::generate);

    req.extensions_mut().insert(RequestIdExt(request_id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Wrap a router with request ids, allow-all CORS and request tracing
pub fn with_gateway_layers(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(REQUEST_ID_HEADER)]);

    router
        .layer(middleware::from_fn(request_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    async fn echo_id(Extension(RequestIdExt(id)): Extension<RequestIdExt>) -> String {
        id.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/test", get(echo_id))
            .layer(middleware::from_fn(request_context_middleware))
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let response = app()
            .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get("x-request-id").unwrap();
        assert!(id.to_str().unwrap().starts_with("req_"));
    }

    #[tokio::test]
    async fn test_reuses_caller_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .header("x-request-id", "client-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "client-42");
    }

    #[tokio::test]
    async fn test_gateway_layers_allow_any_origin() {
        let app = with_gateway_layers(Router::new().route("/test", get(|| async { "OK" })));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .header("origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert!(response.headers().get("x-request-id").is_some());

        let preflight = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/test")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(preflight.status(), StatusCode::OK);
        assert_eq!(
            preflight.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
