//! Health and metrics documents.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use stalegate_core::{FreshnessPolicy, RetryPlan};

use crate::handler::AppState;
use crate::headers;
use crate::metrics::MetricsSnapshot;

const SERVICE: &str = "stalegate";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub environment: String,
    pub origin: String,
    pub failover: Option<String>,
    pub features: Features,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub stale_while_revalidate: bool,
    pub retry_logic: bool,
    pub failover: bool,
    pub metrics: bool,
    pub store: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDocument<'a> {
    pub version: &'static str,
    pub timestamp: String,
    pub store: &'static str,
    pub ttl: &'a FreshnessPolicy,
    pub retry: &'a RetryPlan,
    pub worst_case_fetch_ms: u64,
    pub counters: MetricsSnapshot,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn health(State(state): State<AppState>) -> Response {
    let body = Health {
        status: "healthy",
        service: SERVICE,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now(),
        environment: state.config.environment.clone(),
        origin: state.origins.primary.to_string(),
        failover: state.origins.failover.as_ref().map(ToString::to_string),
        features: Features {
            stale_while_revalidate: true,
            retry_logic: true,
            failover: state.origins.failover.is_some(),
            metrics: state.config.enable_metrics,
            store: state.engine.store_name(),
        },
    };

    (headers::standard().clone(), Json(body)).into_response()
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = MetricsDocument {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now(),
        store: state.engine.store_name(),
        ttl: &state.config.ttl,
        retry: &state.config.retry,
        worst_case_fetch_ms: state.config.retry.worst_case().as_millis() as u64,
        counters: state.metrics.snapshot(),
    };

    (headers::standard().clone(), Json(body)).into_response()
}
