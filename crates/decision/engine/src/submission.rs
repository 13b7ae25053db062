use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use decision_types::Payload;
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;

/// Successful commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub sequence_number: u64,
    pub committed_at: DateTime<Utc>,
    pub degraded_origin: bool,
}

/// Structured submission as received from a transport.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Base64 on the wire.
    pub payload: Payload,
    /// Required even when empty; absence is declared, never implied.
    pub constraints: BTreeMap<String, String>,
    pub authority_token: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Committed,
    Rejected,
    Halted,
}

/// Transport-facing result of a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_origin: Option<bool>,
}

impl From<Result<CommitReceipt, SubmitError>> for SubmissionResponse {
    fn from(result: Result<CommitReceipt, SubmitError>) -> Self {
        match result {
            Ok(receipt) => Self {
                status: SubmissionStatus::Committed,
                sequence_number: Some(receipt.sequence_number),
                reason: None,
                degraded_origin: Some(receipt.degraded_origin),
            },
            Err(error) => {
                // A sequence conflict halts the system, so it reports as Halted.
                let status = match error {
                    SubmitError::SystemHalted | SubmitError::SequenceConflict(_) => {
                        SubmissionStatus::Halted
                    }
                    _ => SubmissionStatus::Rejected,
                };
                Self {
                    status,
                    sequence_number: None,
                    reason: Some(error.kind().code().to_string()),
                    degraded_origin: None,
                }
            }
        }
    }
}
