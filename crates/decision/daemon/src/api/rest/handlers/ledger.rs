//! Ledger read handler

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use decision_types::LedgerEntry;
use serde::Deserialize;

/// Largest range served by one request
pub const MAX_RANGE: u64 = 500;

const DEFAULT_RANGE: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl LedgerQuery {
    fn bounds(&self) -> ApiResult<(u64, u64)> {
        let from = self.from.unwrap_or(1);
        let to = self
            .to
            .unwrap_or_else(|| from.saturating_add(DEFAULT_RANGE - 1));
        if from == 0 || to < from {
            return Err(ApiError::BadRequest(format!("invalid range {from}..={to}")));
        }
        if to - from >= MAX_RANGE {
            return Err(ApiError::BadRequest(format!(
                "range {from}..={to} exceeds {MAX_RANGE} entries"
            )));
        }
        Ok((from, to))
    }
}

/// Ordered range read; sequence numbers past the tail are omitted.
pub async fn read_ledger(
    State(state): State<AppState>,
    Query(query): Query<LedgerQuery>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    let (from, to) = query.bounds()?;
    let entries = state.engine.read_range(from, to)?;
    Ok(Json(entries.iter().map(|e| e.as_ref().clone()).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range() {
        let query = LedgerQuery { from: None, to: None };
        assert_eq!(query.bounds().unwrap(), (1, 100));
        let query = LedgerQuery { from: Some(40), to: None };
        assert_eq!(query.bounds().unwrap(), (40, 139));
    }

    #[test]
    fn test_rejects_bad_ranges() {
        for (from, to) in [(Some(0), Some(5)), (Some(9), Some(3)), (Some(1), Some(MAX_RANGE + 1))] {
            assert!(LedgerQuery { from, to }.bounds().is_err());
        }
    }
}
