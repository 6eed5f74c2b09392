//! Liveness and status endpoints

use axum::{Json, extract::State as AxumState};
use serde::Serialize;

use crate::SharedState;

pub const HEALTH_TEXT: &str = "Slack ↔ Jenkins BMI integration is running!";

/// GET / and GET /health
pub async fn root() -> &'static str {
    HEALTH_TEXT
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub started_at: String,
    pub uptime_seconds: u64,
    pub dispatched_jobs: u64,
    pub signature_verification: bool,
}

/// GET /status - process information, no upstream calls
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at.to_rfc3339(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        dispatched_jobs: state.dispatcher.dispatched_count(),
        signature_verification: state.config.signature_verification_enabled(),
    })
}
