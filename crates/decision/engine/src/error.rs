use decision_degradation::DegradationError;
use decision_ledger::LedgerError;
use decision_types::RejectionKind;
use decision_witness::WitnessError;
use thiserror::Error;

/// Why a submit did not commit. Expected rejection paths are values, never
/// panics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("authority rejected")]
    AuthorityRejected,

    #[error("payload invalid: {0}")]
    PayloadInvalid(String),

    #[error("system halted")]
    SystemHalted,

    #[error("decision timed out before reaching the ledger")]
    DecisionTimedOut,

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("sequence conflict: {0}")]
    SequenceConflict(String),
}

impl SubmitError {
    pub fn kind(&self) -> RejectionKind {
        match self {
            SubmitError::AuthorityRejected => RejectionKind::AuthorityRejected,
            SubmitError::PayloadInvalid(_) => RejectionKind::PayloadInvalid,
            SubmitError::SystemHalted => RejectionKind::SystemHalted,
            SubmitError::DecisionTimedOut => RejectionKind::DecisionTimedOut,
            SubmitError::LedgerUnavailable(_) => RejectionKind::LedgerUnavailable,
            SubmitError::SequenceConflict(_) => RejectionKind::SequenceConflict,
        }
    }
}

/// Errors from engine lifecycle and operator operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("degradation error: {0}")]
    Degradation(#[from] DegradationError),

    #[error("witness error: {0}")]
    Witness(#[from] WitnessError),

    #[error("checkpoint lock poisoned")]
    LockPoisoned,
}
