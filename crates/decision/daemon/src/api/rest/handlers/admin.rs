//! Operator handlers
//!
//! Every route here requires the `x-operator-token` header.

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, http::HeaderMap, Json};
use decision_degradation::TransitionEvent;
use decision_ledger::{SignedCheckpoint, VerificationReport};
use decision_types::SystemState;
use serde::{Deserialize, Serialize};

const DEFAULT_OPERATOR: &str = "operator";

#[derive(Debug, Deserialize)]
pub struct HaltRequest {
    pub reason: String,
    #[serde(default)]
    pub operator: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub operator: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: SystemState,
}

/// Explicit operator halt
pub async fn halt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<HaltRequest>,
) -> ApiResult<Json<StateResponse>> {
    state.require_operator(&headers)?;
    if body.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("halt requires a reason".into()));
    }

    let operator = body.operator.as_deref().unwrap_or(DEFAULT_OPERATOR);
    let new_state = state.engine.halt(operator, &body.reason)?;
    tracing::warn!(operator = %operator, reason = %body.reason, "Operator halt");
    Ok(Json(StateResponse { state: new_state }))
}

/// Manual reset out of Halted. Lands in Degraded.
pub async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<ResetRequest>>,
) -> ApiResult<Json<StateResponse>> {
    state.require_operator(&headers)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let operator = body.operator.as_deref().unwrap_or(DEFAULT_OPERATOR);
    let new_state = state.engine.reset(operator)?;
    tracing::warn!(operator = %operator, state = %new_state, "Operator reset");
    Ok(Json(StateResponse { state: new_state }))
}

/// Sign a checkpoint of the current tail
pub async fn create_checkpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SignedCheckpoint>> {
    state.require_operator(&headers)?;

    let engine = state.engine.clone();
    let checkpoint = tokio::task::spawn_blocking(move || engine.checkpoint_now())
        .await
        .map_err(|e| ApiError::Internal(format!("checkpoint task failed: {e}")))??;

    checkpoint
        .map(Json)
        .ok_or_else(|| ApiError::Conflict("ledger is empty; nothing to checkpoint".into()))
}

/// Recompute the chain and check the latest checkpoint. An invalid ledger
/// halts the system.
pub async fn verify_ledger(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<VerificationReport>> {
    state.require_operator(&headers)?;

    let engine = state.engine.clone();
    let report = tokio::task::spawn_blocking(move || engine.verify_integrity())
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))??;

    if !report.is_valid() {
        tracing::error!(entries = report.chain.entry_count, "Ledger verification failed");
    }
    Ok(Json(report))
}

/// Transition history, oldest first
pub async fn list_transitions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<TransitionEvent>>> {
    state.require_operator(&headers)?;
    Ok(Json(state.engine.transitions()?))
}
