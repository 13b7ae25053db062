use decision_types::TypeError;
use thiserror::Error;

/// Errors returned by ledger storage and verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid range: from_seq {from} is greater than to_seq {to}")]
    InvalidRange { from: u64, to: u64 },

    /// The proposed entry does not extend the current tail. Only a bypass of
    /// the single-writer discipline can produce this.
    #[error("sequence conflict at seq {seq}: {reason}")]
    SequenceConflict { seq: u64, reason: String },

    #[error("stream integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("record error: {0}")]
    Record(#[from] TypeError),

    #[error("storage io error: {0}")]
    Io(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl LedgerError {
    /// Conflicts and integrity violations are never recovered automatically.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::SequenceConflict { .. } | LedgerError::IntegrityViolation { .. }
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io(error.to_string())
    }
}
