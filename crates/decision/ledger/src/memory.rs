use std::sync::{Arc, Mutex};

use decision_types::LedgerEntry;

use crate::arena::{check_extends, EntryArena};
use crate::error::LedgerError;
use crate::traits::{LedgerReader, LedgerWriter};

/// In-memory ledger used for tests, local demos, and embedding.
///
/// Provides no durability; `append` acknowledges once the entry is in the
/// arena.
#[derive(Default)]
pub struct InMemoryLedger {
    arena: EntryArena,
    writer: Mutex<()>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerWriter for InMemoryLedger {
    fn append(&self, entry: LedgerEntry) -> Result<u64, LedgerError> {
        let _writer = self.writer.lock().map_err(|_| LedgerError::LockPoisoned)?;

        let tail = self.arena.tail()?;
        check_extends(tail.as_deref(), &entry)?;

        let seq = entry.seq();
        self.arena.push(entry)?;
        Ok(seq)
    }
}

impl LedgerReader for InMemoryLedger {
    fn tail(&self) -> Result<Option<Arc<LedgerEntry>>, LedgerError> {
        self.arena.tail()
    }

    fn read_range(
        &self,
        from_seq: u64,
        to_seq: u64,
    ) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        self.arena.range(from_seq, to_seq)
    }

    fn entry_count(&self) -> Result<u64, LedgerError> {
        self.arena.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use decision_types::{Authority, AuthorityToken, ConstraintSet, EntryDraft, EntryHash, Payload};

    use super::*;

    fn draft(seq: u64) -> EntryDraft {
        EntryDraft {
            seq,
            payload: Payload::from("approve"),
            constraints: ConstraintSet::declare([("jurisdiction", "eu")], Utc::now()).unwrap(),
            authority: Authority::attest(&AuthorityToken::new("ops:key")).unwrap(),
            committed_at: Utc::now(),
            degraded_origin: false,
        }
    }

    fn append_next(ledger: &InMemoryLedger) -> LedgerEntry {
        let tail = ledger.tail().unwrap();
        let seq = tail.as_ref().map_or(1, |t| t.seq() + 1);
        let prev = tail.map_or(EntryHash::GENESIS, |t| t.entry_hash());
        let entry = LedgerEntry::seal(draft(seq), prev).unwrap();
        ledger.append(entry.clone()).unwrap();
        entry
    }

    #[test]
    fn append_builds_hash_chain() {
        let ledger = InMemoryLedger::new();
        let first = append_next(&ledger);
        let second = append_next(&ledger);

        assert_eq!(first.seq(), 1);
        assert_eq!(second.seq(), 2);
        assert_eq!(second.prev_hash(), first.entry_hash());
        assert!(ledger.verify_chain());
    }

    #[test]
    fn stale_previous_hash_is_a_sequence_conflict() {
        let ledger = InMemoryLedger::new();
        append_next(&ledger);

        let stale = LedgerEntry::seal(draft(2), EntryHash::GENESIS).unwrap();
        let error = ledger.append(stale).unwrap_err();
        assert!(matches!(error, LedgerError::SequenceConflict { seq: 2, .. }));
        assert_eq!(ledger.entry_count().unwrap(), 1);
    }

    #[test]
    fn duplicate_sequence_is_a_sequence_conflict() {
        let ledger = InMemoryLedger::new();
        let first = append_next(&ledger);

        let error = ledger.append(first).unwrap_err();
        assert!(matches!(error, LedgerError::SequenceConflict { seq: 1, .. }));
        assert!(error.is_fatal());
    }

    #[test]
    fn read_range_is_inclusive_and_validated() {
        let ledger = InMemoryLedger::new();
        for _ in 0..3 {
            append_next(&ledger);
        }

        assert_eq!(ledger.read_range(1, 2).unwrap().len(), 2);
        assert_eq!(ledger.read_range(2, 99).unwrap().len(), 2);
        assert!(ledger.read_range(4, 9).unwrap().is_empty());
        assert_eq!(
            ledger.read_range(3, 2).unwrap_err(),
            LedgerError::InvalidRange { from: 3, to: 2 }
        );
    }

    #[test]
    fn read_tail_returns_last_entries_in_order() {
        let ledger = InMemoryLedger::new();
        for _ in 0..5 {
            append_next(&ledger);
        }

        let tail: Vec<u64> = ledger.read_tail(2).unwrap().iter().map(|e| e.seq()).collect();
        assert_eq!(tail, vec![4, 5]);
        assert_eq!(ledger.read_tail(50).unwrap().len(), 5);
    }

    #[test]
    fn empty_ledger_has_no_tail() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.tail().unwrap().is_none());
        assert!(ledger.read_all().unwrap().is_empty());
        assert!(ledger.verify_chain());
    }
}
