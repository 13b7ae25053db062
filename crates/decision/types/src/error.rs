use thiserror::Error;

/// Errors raised while constructing or sealing core records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("constraint key must not be empty")]
    EmptyConstraintKey,

    #[error("constraint key declared more than once: {0}")]
    DuplicateConstraint(String),

    #[error("committed constraint sets must not be empty; record absence explicitly")]
    EmptyConstraintSet,

    #[error("authority token is missing or blank")]
    MissingAuthority,

    #[error("sequence numbers start at 1, got {0}")]
    InvalidSequence(u64),

    #[error("invalid hash encoding: {0}")]
    InvalidHash(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
