//! Structured error responses.
//!
//! Failures that reach the HTTP surface become a JSON body carrying a fresh
//! correlation id, so a client report can be matched to the server log line.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::headers;
use crate::revalidate::EngineError;

#[derive(Debug)]
pub struct ResponseError {
    pub status: StatusCode,
    pub err: anyhow::Error,
    pub request_id: Uuid,
}

impl ResponseError {
    pub fn new(status: StatusCode, err: anyhow::Error) -> Self {
        Self { status, err, request_id: Uuid::new_v4() }
    }

    /// Human-readable status line, e.g. "Bad Gateway".
    pub fn message(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Error")
    }

    /// Error and its causes joined into one line.
    pub fn detail(&self) -> String {
        self.err.chain().map(|cause| cause.to_string()).collect::<Vec<_>>().join(": ")
    }
}

impl From<EngineError> for ResponseError {
    fn from(err: EngineError) -> Self {
        Self::new(err.status(), err.into())
    }
}

impl From<anyhow::Error> for ResponseError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

impl From<(StatusCode, anyhow::Error)> for ResponseError {
    fn from((status, err): (StatusCode, anyhow::Error)) -> Self {
        Self::new(status, err)
    }
}

/// Body of every error response.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub status: String,
    pub message: String,
    pub error: String,
    pub request_id: Uuid,
}

impl From<&ResponseError> for ApiErrorResponse {
    fn from(err: &ResponseError) -> Self {
        Self {
            status: "error".to_string(),
            message: err.message().to_string(),
            error: err.detail(),
            request_id: err.request_id,
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(request_id = %self.request_id, status = self.status.as_u16(), error = %self.detail(), "request failed");
        }
        let mut response = Json(ApiErrorResponse::from(&self)).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().extend(headers::standard().clone());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stalegate_client::FetchError;

    #[test]
    fn test_from_engine_error() {
        let err = ResponseError::from(EngineError::Upstream(FetchError::Network("refused".into())));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.message(), "Bad Gateway");
        assert!(err.detail().contains("UPSTREAM_UNREACHABLE"));
        assert!(err.detail().contains("refused"));
    }

    #[test]
    fn test_detail_includes_context() {
        let err = ResponseError::from(anyhow::anyhow!("disk full").context("cache write"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "cache write: disk full");
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let err = ResponseError::from(anyhow::anyhow!("boom"));
        let request_id = err.request_id;
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["x-powered-by"], "stalegate");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ApiErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            ApiErrorResponse {
                status: "error".into(),
                message: "Internal Server Error".into(),
                error: "boom".into(),
                request_id,
            }
        );
    }
}
