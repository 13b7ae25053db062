//! Witness handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, http::HeaderMap, Json};
use serde_json::Value;

/// Witness snapshot. Detail fields are included only for operators.
pub async fn get_witness(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let snapshot = state.engine.witness_snapshot()?;

    let body = if state.is_operator(&headers) {
        serde_json::to_value(&snapshot)
    } else {
        serde_json::to_value(snapshot.public())
    }
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(body))
}
