use decision_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WitnessError {
    #[error("witness lock poisoned")]
    LockPoisoned,

    #[error("ledger read failed: {0}")]
    Ledger(#[from] LedgerError),
}
