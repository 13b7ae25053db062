use std::fmt;

use serde::{Deserialize, Serialize};

/// Operational state of the system, owned by the degradation state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemState {
    Active,
    Degraded,
    Halted,
}

impl SystemState {
    pub fn is_halted(&self) -> bool {
        matches!(self, SystemState::Halted)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemState::Active => "Active",
            SystemState::Degraded => "Degraded",
            SystemState::Halted => "Halted",
        };
        f.write_str(name)
    }
}

/// Why a submit did not commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    AuthorityRejected,
    PayloadInvalid,
    SystemHalted,
    DecisionTimedOut,
    LedgerUnavailable,
    SequenceConflict,
}

impl RejectionKind {
    /// Rejections that signal ledger-path health problems. Validation
    /// rejections are local to the caller and never move system state.
    pub fn counts_toward_degradation(&self) -> bool {
        matches!(
            self,
            RejectionKind::DecisionTimedOut | RejectionKind::LedgerUnavailable
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RejectionKind::SequenceConflict)
    }

    pub fn code(&self) -> &'static str {
        match self {
            RejectionKind::AuthorityRejected => "AUTHORITY_REJECTED",
            RejectionKind::PayloadInvalid => "PAYLOAD_INVALID",
            RejectionKind::SystemHalted => "SYSTEM_HALTED",
            RejectionKind::DecisionTimedOut => "DECISION_TIMED_OUT",
            RejectionKind::LedgerUnavailable => "LEDGER_UNAVAILABLE",
            RejectionKind::SequenceConflict => "SEQUENCE_CONFLICT",
        }
    }
}

/// Outcome of one submit, as seen by the degradation state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitOutcome {
    Normal,
    DegradedOrigin,
    Rejected(RejectionKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ledger_path_failures_count_toward_degradation() {
        assert!(RejectionKind::DecisionTimedOut.counts_toward_degradation());
        assert!(RejectionKind::LedgerUnavailable.counts_toward_degradation());
        assert!(!RejectionKind::AuthorityRejected.counts_toward_degradation());
        assert!(!RejectionKind::PayloadInvalid.counts_toward_degradation());
        assert!(!RejectionKind::SystemHalted.counts_toward_degradation());
    }
}
