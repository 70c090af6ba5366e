//! Request routing.
//!
//! - `OPTIONS` anything: CORS preflight, answered locally
//! - `GET`/`HEAD` under the cache prefix: revalidation engine
//! - `/health`, `/`: health document
//! - `/metrics`: counters, when enabled
//! - everything else: relayed to the primary origin

pub mod cache;
pub mod health;
pub mod passthrough;

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::handler::AppState;
use crate::headers::{self, X_RESPONSE_TIME};

/// Send a request to the cache engine or the passthrough relay.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let cacheable = matches!(*request.method(), Method::GET | Method::HEAD) && state.config.is_cacheable_path(&path);

    let result =
        if cacheable { cache::serve(&state, request).await } else { passthrough::relay(&state, request).await };

    match result {
        Ok(response) => response,
        Err(err) => {
            state.sink.report(&err, &path);
            err.into_response()
        }
    }
}

/// Answer CORS preflight requests before routing.
pub async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return (StatusCode::NO_CONTENT, headers::standard().clone()).into_response();
    }
    next.run(request).await
}

/// Stamp every response with `X-Response-Time`.
pub async fn response_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&format!("{}ms", start.elapsed().as_millis())) {
        response.headers_mut().insert(X_RESPONSE_TIME, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::header;
    use axum::response::Redirect;
    use axum::routing::{get, post};
    use axum::Router;
    use stalegate_client::testing::{Outcome, ScriptedUpstream};
    use stalegate_client::{FetchConfig, OriginClient};
    use stalegate_core::{AppConfig, MemoryStore, RetryPlan};
    use tower::ServiceExt;

    use super::*;
    use crate::handler::create_app;

    const ORIGIN_HOST: &str = "127.0.0.1";

    async fn spawn_origin() -> String {
        let app = Router::new()
            .route("/metrics", get(|| async { "origin metrics" }))
            .route("/submit", post(|body: String| async move { (StatusCode::CREATED, body) }))
            .route("/old", get(|| async { Redirect::to("/new") }).post(|| async { Redirect::to("/new") }))
            .route("/new", get(|| async { "followed" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn closed_origin() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    fn app(origin_url: String, enable_metrics: bool) -> (Router, Arc<ScriptedUpstream>, AppState) {
        let config = AppConfig {
            origin_url,
            enable_metrics,
            retry: RetryPlan { max_attempts: 0, ..Default::default() },
            ..Default::default()
        };
        let upstream = Arc::new(ScriptedUpstream::new());
        let client = Arc::new(OriginClient::new(FetchConfig::from(&config)).unwrap());
        let state = AppState::new(config, Arc::new(MemoryStore::new(1 << 20)), upstream.clone(), client).unwrap();
        (create_app(state.clone()), upstream, state)
    }

    fn request(method: Method, uri: &str) -> Request {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> bytes::Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_preflight() {
        let (app, upstream, _) = app(spawn_origin().await, false);

        let response = app.oneshot(request(Method::OPTIONS, "/cache/a.json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(response.headers().contains_key(X_RESPONSE_TIME));
        assert_eq!(upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app(spawn_origin().await, false);

        let response = app.oneshot(request(Method::GET, "/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "stalegate");
        assert_eq!(body["environment"], "production");
        assert_eq!(body["features"]["store"], "memory");
        assert_eq!(body["features"]["staleWhileRevalidate"], true);
    }

    #[tokio::test]
    async fn test_root_is_health() {
        let (app, _, _) = app(spawn_origin().await, false);
        let response = app.oneshot(request(Method::GET, "/")).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_metrics_disabled_falls_through() {
        let (app, _, _) = app(spawn_origin().await, false);

        let response = app.oneshot(request(Method::GET, "/metrics")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-cache"], "PASSTHROUGH");
        assert_eq!(body_bytes(response).await, "origin metrics");
    }

    #[tokio::test]
    async fn test_metrics_enabled() {
        let (app, upstream, _) = app(spawn_origin().await, true);
        upstream.push(ORIGIN_HOST, Outcome::json(200, "{}"));

        let response = app.clone().oneshot(request(Method::GET, "/cache/a.json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(request(Method::GET, "/metrics")).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["counters"]["misses"], 1);
        assert_eq!(body["ttl"]["default"]["fresh"], 3600);
        assert_eq!(body["retry"]["max_attempts"], 0);
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_cache_miss_then_hit() {
        let (app, upstream, _) = app(spawn_origin().await, false);
        upstream.push(ORIGIN_HOST, Outcome::json(200, r#"{"a":1}"#));

        let first = app.clone().oneshot(request(Method::GET, "/cache/a.json")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-cache"], "MISS");
        assert_eq!(first.headers()["x-cache-status"], "updated");
        assert_eq!(first.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(first.headers()["cdn-cache-control"], "public, max-age=3600");
        assert!(!first.headers().contains_key(header::AGE));
        assert_eq!(body_bytes(first).await, r#"{"a":1}"#);

        let second = app.oneshot(request(Method::GET, "/cache/a.json")).await.unwrap();
        assert_eq!(second.headers()["x-cache"], "HIT");
        assert_eq!(second.headers()["x-cache-status"], "fresh");
        assert_eq!(second.headers()[header::AGE], "0");
        assert_eq!(body_bytes(second).await, r#"{"a":1}"#);
        assert_eq!(upstream.call_count(), 1);
    }

    #[tokio::test]
    async fn test_head_shares_get_entry_without_body() {
        let (app, upstream, _) = app(spawn_origin().await, false);
        upstream.push(ORIGIN_HOST, Outcome::json(200, r#"{"a":1}"#));

        let get = app.clone().oneshot(request(Method::GET, "/cache/a.json")).await.unwrap();
        assert_eq!(get.headers()["x-cache"], "MISS");

        let head = app.oneshot(request(Method::HEAD, "/cache/a.json")).await.unwrap();
        assert_eq!(head.headers()["x-cache"], "HIT");
        assert!(body_bytes(head).await.is_empty());
        assert_eq!(upstream.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_miss_unreachable_is_502() {
        let (app, upstream, _) = app(spawn_origin().await, false);
        upstream.set_default(ORIGIN_HOST, Outcome::network());

        let response = app.oneshot(request(Method::GET, "/cache/a.json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Bad Gateway");
        assert!(body["requestId"].as_str().is_some_and(|id| uuid::Uuid::parse_str(id).is_ok()));
    }

    #[tokio::test]
    async fn test_cache_miss_origin_404_is_bypassed() {
        let (app, upstream, _) = app(spawn_origin().await, false);
        upstream.push(ORIGIN_HOST, Outcome::status(404));

        let response = app.oneshot(request(Method::GET, "/cache/missing.json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-cache"], "BYPASS");
    }

    #[tokio::test]
    async fn test_post_under_prefix_is_passed_through() {
        let (app, upstream, state) = app(spawn_origin().await, false);

        let response = app
            .oneshot(Request::builder().method(Method::POST).uri("/submit").body(Body::from("payload")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-cache"], "PASSTHROUGH");
        assert_eq!(body_bytes(response).await, "payload");
        assert_eq!(upstream.call_count(), 0);
        assert_eq!(state.metrics.snapshot().passthroughs, 1);
    }

    #[tokio::test]
    async fn test_unknown_path_relays_origin_status() {
        let (app, _, _) = app(spawn_origin().await, false);
        let response = app.oneshot(request(Method::GET, "/nowhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-cache"], "PASSTHROUGH");
    }

    #[tokio::test]
    async fn test_passthrough_relays_redirect_unchanged() {
        let (app, _, _) = app(spawn_origin().await, false);

        for method in [Method::GET, Method::POST] {
            let response = app.clone().oneshot(request(method, "/old")).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers()[header::LOCATION], "/new");
            assert_eq!(response.headers()["x-cache"], "PASSTHROUGH");
        }
    }

    #[tokio::test]
    async fn test_passthrough_unreachable_is_502() {
        let (app, _, _) = app(closed_origin().await, false);
        let response = app.oneshot(request(Method::GET, "/nowhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("NETWORK_ERROR"));
    }
}
