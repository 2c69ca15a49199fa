//! Health check endpoints
//!
//! - `GET /health/live`: the process is running
//! - `GET /health/ready`: every group has a selected mirror
//! - `GET /health`: version, uptime and the current selection of each group

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

// ============================================================================
// Health Status Types
// ============================================================================

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK, // some groups still redirect
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Status for `selected` out of `total` groups having a mirror
    pub fn from_coverage(selected: usize, total: usize) -> Self {
        if selected == total {
            HealthStatus::Healthy
        } else if selected > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Selection state of one group
#[derive(Debug, Clone, Serialize)]
pub struct GroupHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// Liveness probe response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: HealthStatus,
    pub timestamp: String,
}

/// Readiness probe response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub timestamp: String,
    pub selected: usize,
    pub groups: usize,
}

/// Comprehensive health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub groups: Vec<GroupHealth>,
}

// ============================================================================
// Health Check Router
// ============================================================================

/// Create health check router
pub fn create_health_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/health", get(health_check))
        .with_state(state)
}

fn group_health(state: &AppState) -> Vec<GroupHealth> {
    let snapshot = state.store.snapshot();
    state
        .groups
        .iter()
        .map(|name| match snapshot.get(name) {
            Some(record) => GroupHealth {
                name: name.clone(),
                status: HealthStatus::Healthy,
                host: Some(record.host.to_string()),
                latency_ms: record.latency_ms,
                throughput_ms: record.throughput_ms,
                published_at: Some(record.published_at.to_rfc3339()),
            },
            None => GroupHealth {
                name: name.clone(),
                status: HealthStatus::Unhealthy,
                host: None,
                latency_ms: None,
                throughput_ms: None,
                published_at: None,
            },
        })
        .collect()
}

// ============================================================================
// Health Check Handlers
// ============================================================================

async fn liveness_probe() -> impl IntoResponse {
    let response = LivenessResponse {
        status: HealthStatus::Healthy,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

async fn readiness_probe(State(state): State<AppState>) -> impl IntoResponse {
    let groups = group_health(&state);
    let selected = groups.iter().filter(|g| g.host.is_some()).count();
    let status = HealthStatus::from_coverage(selected, groups.len());

    let response = ReadinessResponse {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        selected,
        groups: groups.len(),
    };

    (status.status_code(), Json(response))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let groups = group_health(&state);
    let selected = groups.iter().filter(|g| g.host.is_some()).count();
    let status = HealthStatus::from_coverage(selected, groups.len());

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        groups,
    };

    (status.status_code(), Json(response))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_as_str() {
        assert_eq!(HealthStatus::Healthy.as_str(), "healthy");
        assert_eq!(HealthStatus::Degraded.as_str(), "degraded");
        assert_eq!(HealthStatus::Unhealthy.as_str(), "unhealthy");
    }

    #[test]
    fn test_coverage() {
        assert_eq!(HealthStatus::from_coverage(3, 3), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_coverage(1, 3), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_coverage(0, 3), HealthStatus::Unhealthy);
        assert_eq!(
            HealthStatus::Unhealthy.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_group_health_serialization() {
        let health = GroupHealth {
            name: "all".to_string(),
            status: HealthStatus::Unhealthy,
            host: None,
            latency_ms: None,
            throughput_ms: None,
            published_at: None,
        };

        let json = serde_json::to_string(&health).unwrap();
        assert_eq!(json, r#"{"name":"all","status":"unhealthy"}"#);
    }
}
