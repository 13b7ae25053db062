use std::sync::{Arc, RwLock};

use decision_types::{EntryHash, LedgerEntry};

use crate::error::LedgerError;

/// Index-addressed, append-only storage for sealed entries.
///
/// Entry `seq` lives at index `seq - 1`. The arena offers `push` and reads
/// only: no slot is ever replaced or removed. The write lock is held for the
/// duration of a `Vec::push`, never across I/O, so readers observe a
/// consistent prefix without waiting on durable writes.
#[derive(Default)]
pub struct EntryArena {
    entries: RwLock<Vec<Arc<LedgerEntry>>>,
}

impl EntryArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(Arc::new).collect()),
        }
    }

    pub(crate) fn push(&self, entry: LedgerEntry) -> Result<Arc<LedgerEntry>, LedgerError> {
        let entry = Arc::new(entry);
        let mut guard = self.entries.write().map_err(|_| LedgerError::LockPoisoned)?;
        guard.push(Arc::clone(&entry));
        Ok(entry)
    }

    pub fn len(&self) -> Result<u64, LedgerError> {
        let guard = self.entries.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(guard.len() as u64)
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, seq: u64) -> Result<Option<Arc<LedgerEntry>>, LedgerError> {
        if seq == 0 {
            return Ok(None);
        }
        let guard = self.entries.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(guard.get((seq - 1) as usize).cloned())
    }

    pub fn tail(&self) -> Result<Option<Arc<LedgerEntry>>, LedgerError> {
        let guard = self.entries.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(guard.last().cloned())
    }

    /// Inclusive range read, clamped to the current length.
    pub fn range(&self, from_seq: u64, to_seq: u64) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        if from_seq == 0 || to_seq == 0 || from_seq > to_seq {
            return Err(LedgerError::InvalidRange {
                from: from_seq,
                to: to_seq,
            });
        }

        let guard = self.entries.read().map_err(|_| LedgerError::LockPoisoned)?;
        let start = (from_seq - 1) as usize;
        if start >= guard.len() {
            return Ok(vec![]);
        }
        let end_exclusive = to_seq.min(guard.len() as u64) as usize;
        Ok(guard[start..end_exclusive].to_vec())
    }

    pub fn snapshot(&self) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        let guard = self.entries.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(guard.clone())
    }
}

/// Check that `entry` extends the chain ending at `tail`.
pub(crate) fn check_extends(
    tail: Option<&LedgerEntry>,
    entry: &LedgerEntry,
) -> Result<(), LedgerError> {
    let expected_seq = tail.map_or(1, |t| t.seq() + 1);
    if entry.seq() != expected_seq {
        return Err(LedgerError::SequenceConflict {
            seq: entry.seq(),
            reason: format!("append attempted out of order; expected seq {expected_seq}"),
        });
    }

    let expected_prev = tail.map_or(EntryHash::GENESIS, LedgerEntry::entry_hash);
    if entry.prev_hash() != expected_prev {
        return Err(LedgerError::SequenceConflict {
            seq: entry.seq(),
            reason: format!(
                "previous hash {} does not match tail {}",
                entry.prev_hash().short(),
                expected_prev.short()
            ),
        });
    }

    if !entry.is_intact() {
        return Err(LedgerError::IntegrityViolation {
            seq: entry.seq(),
            reason: "entry hash does not match content".into(),
        });
    }

    Ok(())
}
