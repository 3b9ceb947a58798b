//! Health and status handlers

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use warden_engine::{BatchReport, GuardStatus};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Liveness check
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub scheduler_running: bool,
    pub guard: GuardStatus,
    pub last_batch: Option<BatchReport>,
}

/// Strike table size, queue depth and snapshot sizes
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    Json(DaemonStatusResponse {
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        scheduler_running: state.scheduler.is_running().await,
        guard: state.guard.status().await,
        last_batch: state.scheduler.last_report().await,
    })
}
