//! Error types for decisiond

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use decision_degradation::{DegradationError, IncidentLogError};
use decision_engine::EngineError;
use decision_ledger::LedgerError;
use decision_witness::WitnessError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Degradation error: {0}")]
    Degradation(#[from] DegradationError),

    #[error("Incident log error: {0}")]
    IncidentLog(#[from] IncidentLogError),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Degradation(DegradationError::NotHalted(state)) => {
                ApiError::Conflict(format!("system is {state}, not Halted"))
            }
            EngineError::Ledger(LedgerError::InvalidRange { from, to }) => {
                ApiError::BadRequest(format!("invalid range {from}..={to}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<WitnessError> for ApiError {
    fn from(error: WitnessError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use decision_types::SystemState;

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_reset_when_not_halted_is_conflict() {
        let error: ApiError =
            EngineError::Degradation(DegradationError::NotHalted(SystemState::Active)).into();
        assert!(matches!(error, ApiError::Conflict(_)));
    }

    #[test]
    fn test_invalid_range_is_bad_request() {
        let error: ApiError = EngineError::Ledger(LedgerError::InvalidRange { from: 5, to: 1 }).into();
        assert!(matches!(error, ApiError::BadRequest(_)));
    }
}
