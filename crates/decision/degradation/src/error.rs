use decision_types::SystemState;
use thiserror::Error;

/// Errors from the degradation state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DegradationError {
    #[error("reset refused: system is {0}, not Halted")]
    NotHalted(SystemState),

    #[error("degradation state lock poisoned")]
    LockPoisoned,

    #[error("invalid degradation config: {0}")]
    InvalidConfig(String),
}

/// Errors from the incident log. Never allowed to block a halt.
#[derive(Debug, Error)]
pub enum IncidentLogError {
    #[error("incident log io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("incident serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("incident log lock poisoned")]
    LockPoisoned,
}
