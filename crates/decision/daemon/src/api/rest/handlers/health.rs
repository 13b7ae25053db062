//! Health handler

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use decision_types::SystemState;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub state: SystemState,
    pub version: String,
    pub uptime: String,
    pub checkpoint_key_id: String,
}

/// Liveness. The process answers even while Halted; `state` says whether it
/// accepts decisions.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "alive".to_string(),
        state: state.engine.state(),
        version: state.version.clone(),
        uptime: state.uptime(),
        checkpoint_key_id: state.engine.checkpoint_key_id().to_string(),
    })
}
