//! Rate limit middleware layer.

use super::{
    types::{KeyStrategy, RateLimitPolicy},
    window::{RateDecision, RateWindow},
};
use crate::error::types::ApiError;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{header::HeaderName, HeaderMap, HeaderValue, Response},
    response::IntoResponse,
};
use futures::future::BoxFuture;
use std::{
    net::SocketAddr,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::debug;

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Rate limit layer.
#[derive(Clone)]
pub struct RateLimitLayer {
    window: Arc<RateWindow>,
    policy: RateLimitPolicy,
}

impl RateLimitLayer {
    pub fn new(window: Arc<RateWindow>, policy: RateLimitPolicy) -> Self {
        Self { window, policy }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            window: self.window.clone(),
            policy: self.policy.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    window: Arc<RateWindow>,
    policy: RateLimitPolicy,
}

impl<S> Service<Request> for RateLimitMiddleware<S>
where
    S: Service<Request, Response = Response<Body>, Error = std::convert::Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let key = extract_key(&req, &self.policy.key_strategy);
        let decision = self
            .window
            .decide(&key, self.policy.window, self.policy.max_requests);

        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            if !decision.allowed {
                debug!(key = %key, "Rate limit exceeded");
                let retry_after = decision.retry_after_secs();
                let mut response = ApiError::RateLimited { retry_after }.into_response();
                add_rate_limit_headers(response.headers_mut(), &decision);
                return Ok(response);
            }

            let mut response = inner.call(req).await?;
            add_rate_limit_headers(response.headers_mut(), &decision);
            Ok(response)
        })
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_LIMIT),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_REMAINING),
        HeaderValue::from(decision.remaining),
    );
}

fn client_ip(req: &Request) -> String {
    // X-Forwarded-For, then X-Real-IP, then the socket peer.
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| {
            req.headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn extract_key(req: &Request, strategy: &KeyStrategy) -> String {
    let ip = client_ip(req);
    match strategy {
        KeyStrategy::Ip => ip,
        KeyStrategy::IpWithDiscriminator(name) => format!("{}:{}", ip, name),
        KeyStrategy::IpAndPath => format!("{}:{}", ip, req.uri().path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{self, StatusCode},
        routing::get,
        Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn request(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_key_prefers_forwarded_for() {
        let req = http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_key(&req, &KeyStrategy::Ip), "203.0.113.7");
    }

    #[test]
    fn test_key_falls_back_to_real_ip_then_peer() {
        let req = http::Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_key(&req, &KeyStrategy::Ip), "198.51.100.2");

        let mut req = request("/");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(extract_key(&req, &KeyStrategy::Ip), "192.0.2.1");

        assert_eq!(extract_key(&request("/"), &KeyStrategy::Ip), "unknown");
    }

    #[test]
    fn test_key_strategies() {
        let req = http::Request::builder()
            .uri("/api/v1/activity")
            .header("x-real-ip", "10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            extract_key(&req, &KeyStrategy::IpWithDiscriminator("login".into())),
            "10.0.0.1:login"
        );
        assert_eq!(
            extract_key(&req, &KeyStrategy::IpAndPath),
            "10.0.0.1:/api/v1/activity"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_layer_denies_after_limit() {
        let window = Arc::new(RateWindow::new());
        let policy = RateLimitPolicy::new(2, Duration::from_secs(60));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(RateLimitLayer::new(window.clone(), policy));

        for remaining in ["1", "0"] {
            let response = app.clone().oneshot(request("/")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-ratelimit-limit"], "2");
            assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
        }

        let response = app.clone().oneshot(request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");
        assert_eq!(window.len(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        let response = app.oneshot(request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_rounds_up_to_whole_seconds() {
        let window = Arc::new(RateWindow::new());
        let policy = RateLimitPolicy::new(1, Duration::from_secs(60));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(RateLimitLayer::new(window, policy));

        let response = app.clone().oneshot(request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // 59.5s remain; advertising 59 would send the client back too early.
        tokio::time::advance(Duration::from_millis(500)).await;
        let response = app.clone().oneshot(request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");

        tokio::time::advance(Duration::from_secs(60)).await;
        let response = app.oneshot(request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
