//! Route configuration for the Bakehouse server.

mod internal;
mod v1;

pub use v1::CollectResponse;

use crate::{error::ApiError, state::AppState};
use axum::{
    http::Uri,
    response::{IntoResponse, Response},
    Router,
};
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer};

/// Largest accepted request body.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let common_middleware = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT));

    Router::new()
        .nest("/api/v1", v1::router(&state))
        .nest("/internal", internal::router())
        .fallback(fallback_handler)
        .layer(common_middleware)
        .with_state(state)
}

async fn fallback_handler(uri: Uri) -> impl IntoResponse {
    ApiError::NotFound(format!("Route {}", uri.path()))
}

/// Render a handler panic as the standard JSON error body.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    ApiError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    async fn explode() -> &'static str {
        panic!("oven on fire")
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_internal_error() {
        let app = Router::new()
            .route("/boom", get(explode))
            .layer(CatchPanicLayer::custom(panic_response));

        let request = Request::builder().uri("/boom").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "internal_error");
    }

    #[test]
    fn test_panic_payload_kinds() {
        let payloads: Vec<Box<dyn Any + Send>> = vec![
            Box::new("static message"),
            Box::new(String::from("owned message")),
            Box::new(7_u8),
        ];
        for payload in payloads {
            let response = panic_response(payload);
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
