//! Decision submission handler

use std::collections::BTreeMap;

use crate::api::rest::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use decision_engine::{SubmissionRequest, SubmissionResponse, SubmissionStatus};
use decision_types::Payload;
use serde::Deserialize;

/// Submission body. `payload` is base64; `constraints` must be present and
/// `{}` declares none.
#[derive(Debug, Deserialize)]
pub struct SubmitDecisionRequest {
    pub payload: Payload,
    pub constraints: BTreeMap<String, String>,
    pub authority_token: String,
}

fn status_code(response: &SubmissionResponse) -> StatusCode {
    match response.status {
        SubmissionStatus::Committed => StatusCode::CREATED,
        SubmissionStatus::Halted => StatusCode::SERVICE_UNAVAILABLE,
        SubmissionStatus::Rejected => match response.reason.as_deref() {
            Some("AUTHORITY_REJECTED") => StatusCode::UNAUTHORIZED,
            Some("PAYLOAD_INVALID") => StatusCode::UNPROCESSABLE_ENTITY,
            Some("DECISION_TIMED_OUT") => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        },
    }
}

/// Submit a decision
pub async fn submit_decision(
    State(state): State<AppState>,
    Json(body): Json<SubmitDecisionRequest>,
) -> (StatusCode, Json<SubmissionResponse>) {
    let response = state
        .engine
        .submit_request(SubmissionRequest {
            payload: body.payload,
            constraints: body.constraints,
            authority_token: body.authority_token,
        })
        .await;

    (status_code(&response), Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(reason: &str) -> SubmissionResponse {
        SubmissionResponse {
            status: SubmissionStatus::Rejected,
            sequence_number: None,
            reason: Some(reason.to_string()),
            degraded_origin: None,
        }
    }

    #[test]
    fn test_rejections_map_to_distinct_statuses() {
        assert_eq!(status_code(&rejected("AUTHORITY_REJECTED")), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_code(&rejected("PAYLOAD_INVALID")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_code(&rejected("DECISION_TIMED_OUT")), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_code(&rejected("LEDGER_UNAVAILABLE")),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
