use std::sync::Arc;

use decision_types::LedgerEntry;

use crate::error::LedgerError;
use crate::verify::{verify_entries, ChainVerification};

/// Write boundary of the ledger. Reserved for the decision engine's appender.
pub trait LedgerWriter: Send + Sync {
    /// Append a sealed entry if it extends the current tail.
    ///
    /// Fails with [`LedgerError::SequenceConflict`] when the entry's sequence or
    /// previous-hash link does not match the tail. Returns only after the entry
    /// is durable.
    fn append(&self, entry: LedgerEntry) -> Result<u64, LedgerError>;
}

/// Read boundary for the witness projection and external observers.
pub trait LedgerReader: Send + Sync {
    fn tail(&self) -> Result<Option<Arc<LedgerEntry>>, LedgerError>;

    /// Inclusive, ordered range read. Never observes a partial entry.
    fn read_range(&self, from_seq: u64, to_seq: u64)
        -> Result<Vec<Arc<LedgerEntry>>, LedgerError>;

    fn entry_count(&self) -> Result<u64, LedgerError>;

    fn read_all(&self) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        match self.entry_count()? {
            0 => Ok(vec![]),
            count => self.read_range(1, count),
        }
    }

    /// Last `n` entries, oldest first.
    fn read_tail(&self, n: u64) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        let count = self.entry_count()?;
        if n == 0 || count == 0 {
            return Ok(vec![]);
        }
        let from = count.saturating_sub(n) + 1;
        self.read_range(from, count)
    }

    /// Recompute the full hash chain. Operational tooling, not the hot path.
    fn verify(&self) -> Result<ChainVerification, LedgerError> {
        Ok(verify_entries(&self.read_all()?))
    }

    fn verify_chain(&self) -> bool {
        self.verify().map(|report| report.valid).unwrap_or(false)
    }
}

/// Full ledger store: reader plus writer.
pub trait LedgerStore: LedgerReader + LedgerWriter {}

impl<T> LedgerStore for T where T: LedgerReader + LedgerWriter {}
