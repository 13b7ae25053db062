//! Application state for API handlers

use std::sync::Arc;

use axum::http::HeaderMap;
use decision_engine::DecisionEngine;
use decision_types::{AuthorityToken, EntryHash};

use crate::error::{ApiError, ApiResult};

/// Header carrying the operator token on the administrative path
pub const OPERATOR_HEADER: &str = "x-operator-token";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Decision engine handle
    pub engine: Arc<DecisionEngine>,

    /// Digest of the operator token; the administrative path is closed when unset
    operator_digest: Option<EntryHash>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(engine: Arc<DecisionEngine>, operator_token: Option<&str>) -> Self {
        Self {
            engine,
            operator_digest: operator_token
                .filter(|t| !t.trim().is_empty())
                .map(|t| AuthorityToken::new(t).digest()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Whether the request carries a valid operator token.
    pub fn is_operator(&self, headers: &HeaderMap) -> bool {
        self.require_operator(headers).is_ok()
    }

    /// 403 when the administrative path is disabled, 401 on a missing or
    /// wrong token.
    pub fn require_operator(&self, headers: &HeaderMap) -> ApiResult<()> {
        let expected = self
            .operator_digest
            .ok_or_else(|| ApiError::Forbidden("administrative path is disabled".into()))?;

        let presented = headers
            .get(OPERATOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(AuthorityToken::new)
            .ok_or_else(|| ApiError::Unauthorized("missing operator token".into()))?;

        if presented.digest() != expected {
            return Err(ApiError::Unauthorized("invalid operator token".into()));
        }
        Ok(())
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
