//! Best-effort reporting of server errors to an external collector.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ResponseError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorReport {
    pub request_id: Uuid,
    pub message: String,
    pub path: String,
    pub timestamp: String,
}

impl ErrorReport {
    pub fn new(err: &ResponseError, path: &str) -> Self {
        Self {
            request_id: err.request_id,
            message: err.detail(),
            path: path.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// POSTs [`ErrorReport`]s as JSON. Disabled when no URL is configured.
#[derive(Clone, Default)]
pub struct ErrorSink {
    target: Option<(reqwest::Client, reqwest::Url)>,
}

impl ErrorSink {
    pub fn new(url: Option<&str>) -> anyhow::Result<Self> {
        let Some(url) = url else {
            return Ok(Self::default());
        };
        let url = reqwest::Url::parse(url)?;
        let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { target: Some((client, url)) })
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Send a report for 5xx errors without waiting for delivery.
    pub fn report(&self, err: &ResponseError, path: &str) {
        if !err.status.is_server_error() {
            return;
        }
        let Some((client, url)) = self.target.clone() else {
            return;
        };
        let report = ErrorReport::new(err, path);

        tokio::spawn(async move {
            let result = client.post(url).json(&report).send().await.and_then(|r| r.error_for_status());
            if let Err(e) = result {
                tracing::warn!(request_id = %report.request_id, error = %e, "failed to deliver error report");
            }
        });
    }
}
