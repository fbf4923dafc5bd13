//! Health endpoints: `/health`, `/health/live`, `/health/ready`.
//!
//! Liveness always answers once the process serves requests. Readiness
//! checks configuration. The full health report probes upstream
//! connectivity and classifies latency.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use chatrelay_core::Error;

use crate::state::AppState;

/// Probe latency above this is reported as degraded.
const LATENCY_DEGRADED_MS: u128 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub checks: BTreeMap<String, ComponentHealth>,
}

impl ComponentHealth {
    fn healthy(latency_ms: Option<u64>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms,
            error: None,
            message: None,
        }
    }

    fn degraded(latency_ms: u64, message: &str) -> Self {
        Self {
            status: HealthStatus::Degraded,
            latency_ms: Some(latency_ms),
            error: None,
            message: Some(message.into()),
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            error: Some(error),
            message: None,
        }
    }

    fn disabled() -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: None,
            error: None,
            message: Some("check disabled".into()),
        }
    }
}

fn overall_status<'a>(checks: impl Iterator<Item = &'a ComponentHealth>) -> HealthStatus {
    let mut status = HealthStatus::Healthy;
    for check in checks {
        match check.status {
            HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
            HealthStatus::Degraded => status = HealthStatus::Degraded,
            HealthStatus::Healthy => {}
        }
    }
    status
}

async fn check_upstream(state: &AppState) -> ComponentHealth {
    if !state.settings.health.upstream_check_enabled {
        return ComponentHealth::disabled();
    }
    if state.settings.upstream.api_key.is_empty() {
        return ComponentHealth::unhealthy("upstream API key not configured".into());
    }

    match state.client.probe(state.settings.health_timeout()).await {
        Ok(latency) => {
            let latency_ms = latency.as_millis();
            if latency_ms > LATENCY_DEGRADED_MS {
                ComponentHealth::degraded(latency_ms as u64, "high latency detected")
            } else {
                ComponentHealth::healthy(Some(latency_ms as u64))
            }
        }
        Err(Error::UpstreamFatal { status: 401, .. }) => {
            ComponentHealth::unhealthy("invalid upstream API key".into())
        }
        Err(e) => {
            warn!(error = %e, "upstream health probe failed");
            ComponentHealth::unhealthy(e.user_message())
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Response {
    let mut checks = BTreeMap::new();
    checks.insert("upstream".to_string(), check_upstream(&state).await);

    let status = overall_status(checks.values());
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        checks,
    };

    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, [("cache-control", "no-cache")], Json(body)).into_response()
}

pub async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}

pub async fn ready(State(state): State<AppState>) -> Response {
    if state.settings.upstream.api_key.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not ready",
                "reason": "upstream API key not configured",
            })),
        )
            .into_response();
    }
    Json(serde_json::json!({ "status": "ready" })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status_aggregation() {
        let healthy = ComponentHealth::healthy(Some(10));
        let degraded = ComponentHealth::degraded(3000, "slow");
        let unhealthy = ComponentHealth::unhealthy("down".into());

        assert_eq!(
            overall_status([&healthy].into_iter()),
            HealthStatus::Healthy
        );
        assert_eq!(
            overall_status([&healthy, &degraded].into_iter()),
            HealthStatus::Degraded
        );
        assert_eq!(
            overall_status([&degraded, &unhealthy].into_iter()),
            HealthStatus::Unhealthy
        );
        assert_eq!(overall_status(std::iter::empty()), HealthStatus::Healthy);
    }

    #[test]
    fn test_component_serialization_skips_empty() {
        let body = serde_json::to_value(ComponentHealth::healthy(Some(12))).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["latency_ms"], 12);
        assert!(body.get("error").is_none());
    }
}
