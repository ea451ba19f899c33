use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::state::AppState;
use crate::types::MIN_SENDABLE_MSAT;

/// Overall health state of a component or the entire server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    /// Serving, but pay requests will be refused
    Degraded,
    Unhealthy,
}

/// Health status for an individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthState,
    pub message: Option<String>,
    pub last_check: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
    pub check_duration_ms: Option<u64>,
}

impl ComponentHealth {
    fn with_state(status: HealthState, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            last_check: Utc::now(),
            metadata: None,
            check_duration_ms: None,
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::with_state(HealthState::Healthy, message)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_state(HealthState::Degraded, message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_state(HealthState::Unhealthy, message)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.check_duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub version: String,
    pub wallet_id: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    pub checks: HashMap<String, ComponentHealth>,
    pub summary: HealthSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total_checks: usize,
    pub healthy_count: usize,
    pub degraded_count: usize,
    pub unhealthy_count: usize,
    pub total_check_duration_ms: u64,
}

/// `GET /health`: wallet and event bus status. 503 when unhealthy.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let start_time = Instant::now();
    let mut checks = HashMap::new();

    let wallet_start = Instant::now();
    let wallet_health = check_wallet_health(&state).await;
    checks.insert(
        "wallet".to_string(),
        wallet_health.with_duration(wallet_start.elapsed()),
    );

    let bus_start = Instant::now();
    let bus_health = check_event_bus_health(&state).await;
    checks.insert(
        "event_bus".to_string(),
        bus_health.with_duration(bus_start.elapsed()),
    );

    let status = determine_overall_health(&checks);
    let total_duration = start_time.elapsed();
    let summary = calculate_health_summary(&checks, total_duration);

    let health = HealthStatus {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        wallet_id: state.wallet().id().to_string(),
        uptime_seconds: state.uptime().as_secs(),
        timestamp: Utc::now(),
        checks,
        summary,
    };

    debug!(
        overall_status = ?health.status,
        duration_ms = total_duration.as_millis() as u64,
        "Health check completed"
    );

    match health.status {
        HealthState::Healthy => (StatusCode::OK, Json(health)).into_response(),
        HealthState::Degraded => {
            info!("Health check degraded, pay requests are being refused");
            (StatusCode::OK, Json(health)).into_response()
        }
        HealthState::Unhealthy => {
            warn!("Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(health)).into_response()
        }
    }
}

/// `GET /health/live`
pub async fn liveness_check() -> &'static str {
    "alive"
}

async fn check_wallet_health(state: &AppState) -> ComponentHealth {
    let wallet = state.wallet();
    let locked = wallet.is_locked().await;
    let lightning = wallet.has_lightning().await;

    if locked || !lightning {
        return ComponentHealth::unhealthy(if locked {
            "Wallet is locked"
        } else {
            "Wallet has no lightning"
        })
        .with_metadata(serde_json::json!({
            "locked": locked,
            "lightning": lightning,
        }));
    }

    match wallet.can_receive_sat().await {
        Ok(can_receive_sat) => {
            let metadata = serde_json::json!({
                "locked": false,
                "lightning": true,
                "can_receive_sat": can_receive_sat,
            });
            if can_receive_sat.saturating_mul(1000) < MIN_SENDABLE_MSAT {
                ComponentHealth::degraded("Wallet has no inbound liquidity").with_metadata(metadata)
            } else {
                ComponentHealth::healthy("Wallet can receive").with_metadata(metadata)
            }
        }
        Err(e) => ComponentHealth::unhealthy(format!("Liquidity query failed: {}", e))
            .with_metadata(serde_json::json!({ "error": e.to_string() })),
    }
}

async fn check_event_bus_health(state: &AppState) -> ComponentHealth {
    let stats = state.event_bus().stats().await;
    let metadata = serde_json::json!({
        "capacity": stats.capacity,
        "handler_count": stats.handler_count,
        "critical_handler_count": stats.critical_handler_count,
    });

    if stats.handler_count == 0 {
        ComponentHealth::degraded("No event handlers registered").with_metadata(metadata)
    } else {
        ComponentHealth::healthy("Event bus is functioning normally").with_metadata(metadata)
    }
}

fn determine_overall_health(checks: &HashMap<String, ComponentHealth>) -> HealthState {
    if checks.is_empty() {
        return HealthState::Unhealthy;
    }

    if checks
        .values()
        .any(|c| matches!(c.status, HealthState::Unhealthy))
    {
        HealthState::Unhealthy
    } else if checks
        .values()
        .any(|c| matches!(c.status, HealthState::Degraded))
    {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}

fn calculate_health_summary(
    checks: &HashMap<String, ComponentHealth>,
    total_duration: Duration,
) -> HealthSummary {
    let count = |state: HealthState| checks.values().filter(|c| c.status == state).count();

    HealthSummary {
        total_checks: checks.len(),
        healthy_count: count(HealthState::Healthy),
        degraded_count: count(HealthState::Degraded),
        unhealthy_count: count(HealthState::Unhealthy),
        total_check_duration_ms: total_duration.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_health_creation() {
        let healthy = ComponentHealth::healthy("All good");
        assert_eq!(healthy.status, HealthState::Healthy);
        assert_eq!(healthy.message, Some("All good".to_string()));
        assert!(healthy.metadata.is_none());

        let degraded = ComponentHealth::degraded("No liquidity")
            .with_metadata(serde_json::json!({"can_receive_sat": 0}));
        assert_eq!(degraded.status, HealthState::Degraded);
        assert!(degraded.metadata.is_some());
    }

    #[test]
    fn test_determine_overall_health() {
        let mut checks = HashMap::new();
        checks.insert("wallet".to_string(), ComponentHealth::healthy("OK"));
        checks.insert("event_bus".to_string(), ComponentHealth::healthy("OK"));
        assert_eq!(determine_overall_health(&checks), HealthState::Healthy);

        checks.insert("event_bus".to_string(), ComponentHealth::degraded("idle"));
        assert_eq!(determine_overall_health(&checks), HealthState::Degraded);

        checks.insert("wallet".to_string(), ComponentHealth::unhealthy("locked"));
        assert_eq!(determine_overall_health(&checks), HealthState::Unhealthy);

        checks.clear();
        assert_eq!(determine_overall_health(&checks), HealthState::Unhealthy);
    }

    #[test]
    fn test_health_summary_calculation() {
        let mut checks = HashMap::new();
        checks.insert("a".to_string(), ComponentHealth::healthy("OK"));
        checks.insert("b".to_string(), ComponentHealth::degraded("Slow"));
        checks.insert("c".to_string(), ComponentHealth::unhealthy("Down"));

        let summary = calculate_health_summary(&checks, Duration::from_millis(500));
        assert_eq!(summary.total_checks, 3);
        assert_eq!(summary.healthy_count, 1);
        assert_eq!(summary.degraded_count, 1);
        assert_eq!(summary.unhealthy_count, 1);
        assert_eq!(summary.total_check_duration_ms, 500);
    }
}
