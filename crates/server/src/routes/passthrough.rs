//! Non-cacheable requests, relayed to the primary origin once.

use anyhow::Context;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use stalegate_client::fetch::origin_url;

use crate::error::ResponseError;
use crate::handler::AppState;
use crate::headers::{self, Diagnostics, compose};
use crate::metrics::CacheEvent;

pub async fn relay(state: &AppState, request: Request) -> Result<Response, ResponseError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, state.config.max_bytes)
        .await
        .map_err(|e| ResponseError::new(StatusCode::PAYLOAD_TOO_LARGE, anyhow::Error::new(e)))?;

    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = origin_url(&state.origins.primary, path_and_query).context("invalid passthrough path")?;

    let upstream = state
        .client
        .forward(parts.method, url, &parts.headers, body)
        .await
        .map_err(|e| ResponseError::new(StatusCode::BAD_GATEWAY, e.into()))?;

    state.metrics.record(CacheEvent::Passthrough);

    let mut response = Response::new(Body::from(upstream.bytes));
    *response.status_mut() = upstream.status;
    *response.headers_mut() =
        compose(&headers::storable(&upstream.headers), headers::standard(), &Diagnostics::passthrough());
    Ok(response)
}
