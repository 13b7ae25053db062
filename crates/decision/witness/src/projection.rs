use std::collections::{BTreeSet, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use decision_ledger::LedgerReader;
use decision_types::{LedgerEntry, SystemState};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WitnessError;

/// Fields any observer may read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicWitness {
    pub state: SystemState,
    pub last_decision_at: Option<DateTime<Utc>>,
    pub last_sequence_number: Option<u64>,
    pub acknowledged_constraint_keys: BTreeSet<String>,
}

/// Full witness snapshot. `degraded_origin` and `entry_count` are detail
/// fields reserved for privileged readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessSnapshot {
    pub state: SystemState,
    pub last_decision_at: Option<DateTime<Utc>>,
    pub last_sequence_number: Option<u64>,
    pub acknowledged_constraint_keys: BTreeSet<String>,
    pub degraded_origin: Option<bool>,
    pub entry_count: u64,
}

impl WitnessSnapshot {
    pub fn public(&self) -> PublicWitness {
        PublicWitness {
            state: self.state,
            last_decision_at: self.last_decision_at,
            last_sequence_number: self.last_sequence_number,
            acknowledged_constraint_keys: self.acknowledged_constraint_keys.clone(),
        }
    }
}

struct WitnessView {
    snapshot: WitnessSnapshot,
    window: VecDeque<(u64, Vec<String>)>,
}

impl WitnessView {
    fn empty(state: SystemState) -> Self {
        Self {
            snapshot: WitnessSnapshot {
                state,
                last_decision_at: None,
                last_sequence_number: None,
                acknowledged_constraint_keys: BTreeSet::new(),
                degraded_origin: None,
                entry_count: 0,
            },
            window: VecDeque::new(),
        }
    }

    fn absorb(&mut self, entry: &LedgerEntry, capacity: usize) {
        self.window
            .push_back((entry.seq(), entry.constraints().keys().map(str::to_owned).collect()));
        while self.window.len() > capacity {
            self.window.pop_front();
        }

        self.snapshot.acknowledged_constraint_keys = self
            .window
            .iter()
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect();
        self.snapshot.last_sequence_number = Some(entry.seq());
        self.snapshot.last_decision_at = Some(entry.committed_at());
        self.snapshot.degraded_origin = Some(entry.degraded_origin());
        self.snapshot.entry_count = entry.seq();
    }
}

/// Derived, read-only view over the ledger tail and the system state.
///
/// Refreshed by the engine after each commit or state transition, under its
/// own lock. Never writes to the ledger and never drives a transition.
/// `last_sequence_number` only moves forward.
pub struct WitnessProjection {
    window_size: usize,
    view: RwLock<WitnessView>,
}

impl WitnessProjection {
    /// Empty projection. `window_size` is how many trailing entries contribute
    /// acknowledged constraint keys; zero is treated as one.
    pub fn new(window_size: usize, state: SystemState) -> Self {
        Self {
            window_size: window_size.max(1),
            view: RwLock::new(WitnessView::empty(state)),
        }
    }

    /// Build from the ledger tail.
    pub fn from_ledger<R: LedgerReader + ?Sized>(
        reader: &R,
        window_size: usize,
        state: SystemState,
    ) -> Result<Self, WitnessError> {
        let projection = Self::new(window_size, state);
        projection.rebuild_from(reader)?;
        Ok(projection)
    }

    /// Re-read the last `window_size` entries. Never moves backward.
    pub fn rebuild_from<R: LedgerReader + ?Sized>(&self, reader: &R) -> Result<(), WitnessError> {
        let tail = reader.read_tail(self.window_size as u64)?;
        let mut view = self.view.write().map_err(|_| WitnessError::LockPoisoned)?;

        let current = view.snapshot.last_sequence_number.unwrap_or(0);
        if tail.last().map_or(0, |e| e.seq()) < current {
            return Ok(());
        }

        let state = view.snapshot.state;
        let mut rebuilt = WitnessView::empty(state);
        for entry in &tail {
            rebuilt.absorb(entry, self.window_size);
        }
        *view = rebuilt;

        debug!(
            last_seq = ?view.snapshot.last_sequence_number,
            "Witness rebuilt from ledger tail"
        );
        Ok(())
    }

    /// Fold a newly committed entry in. Entries at or below the current
    /// sequence number are ignored.
    pub fn observe_commit(&self, entry: &LedgerEntry) -> Result<(), WitnessError> {
        let mut view = self.view.write().map_err(|_| WitnessError::LockPoisoned)?;
        if view
            .snapshot
            .last_sequence_number
            .is_some_and(|last| entry.seq() <= last)
        {
            return Ok(());
        }
        view.absorb(entry, self.window_size);
        Ok(())
    }

    pub fn observe_state(&self, state: SystemState) -> Result<(), WitnessError> {
        let mut view = self.view.write().map_err(|_| WitnessError::LockPoisoned)?;
        view.snapshot.state = state;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<WitnessSnapshot, WitnessError> {
        let view = self.view.read().map_err(|_| WitnessError::LockPoisoned)?;
        Ok(view.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use decision_ledger::{InMemoryLedger, LedgerWriter};
    use decision_types::{Authority, AuthorityToken, ConstraintSet, EntryDraft, EntryHash, Payload};

    use super::*;

    fn commit(ledger: &InMemoryLedger, keys: &[&str]) -> LedgerEntry {
        let tail = ledger.tail().unwrap();
        let seq = tail.as_ref().map_or(1, |t| t.seq() + 1);
        let prev = tail.map_or(EntryHash::GENESIS, |t| t.entry_hash());
        let constraints = if keys.is_empty() {
            ConstraintSet::absence(Utc::now())
        } else {
            ConstraintSet::declare(keys.iter().map(|k| (*k, "v")), Utc::now()).unwrap()
        };
        let entry = LedgerEntry::seal(
            EntryDraft {
                seq,
                payload: Payload::from("secret body"),
                degraded_origin: constraints.is_absence(),
                constraints,
                authority: Authority::attest(&AuthorityToken::new("ops:key")).unwrap(),
                committed_at: Utc::now(),
            },
            prev,
        )
        .unwrap();
        ledger.append(entry.clone()).unwrap();
        entry
    }

    #[test]
    fn empty_witness_reports_no_activity() {
        let witness = WitnessProjection::new(4, SystemState::Active);
        let snapshot = witness.snapshot().unwrap();
        assert_eq!(snapshot.last_sequence_number, None);
        assert_eq!(snapshot.last_decision_at, None);
        assert!(snapshot.acknowledged_constraint_keys.is_empty());
    }

    #[test]
    fn acknowledged_keys_cover_trailing_window() {
        let ledger = InMemoryLedger::new();
        let witness = WitnessProjection::new(2, SystemState::Active);
        for keys in [&["region"][..], &["tier"], &["budget", "tier"]] {
            witness.observe_commit(&commit(&ledger, keys)).unwrap();
        }

        let snapshot = witness.snapshot().unwrap();
        assert_eq!(snapshot.last_sequence_number, Some(3));
        let keys: Vec<_> = snapshot.acknowledged_constraint_keys.into_iter().collect();
        assert_eq!(keys, vec!["budget".to_string(), "tier".to_string()]);
    }

    #[test]
    fn stale_commit_never_regresses() {
        let ledger = InMemoryLedger::new();
        let first = commit(&ledger, &["a"]);
        let second = commit(&ledger, &["b"]);

        let witness = WitnessProjection::new(8, SystemState::Active);
        witness.observe_commit(&second).unwrap();
        witness.observe_commit(&first).unwrap();
        assert_eq!(witness.snapshot().unwrap().last_sequence_number, Some(2));
    }

    #[test]
    fn rebuild_matches_incremental_view() {
        let ledger = InMemoryLedger::new();
        let incremental = WitnessProjection::new(3, SystemState::Degraded);
        for keys in [&["a"][..], &[], &["b", "c"], &["d"]] {
            incremental.observe_commit(&commit(&ledger, keys)).unwrap();
        }

        let rebuilt = WitnessProjection::from_ledger(&ledger, 3, SystemState::Degraded).unwrap();
        assert_eq!(rebuilt.snapshot().unwrap(), incremental.snapshot().unwrap());
        assert!(rebuilt
            .snapshot()
            .unwrap()
            .acknowledged_constraint_keys
            .contains("absence"));
    }

    #[test]
    fn public_view_drops_detail_fields() {
        let ledger = InMemoryLedger::new();
        let witness = WitnessProjection::new(1, SystemState::Active);
        witness.observe_commit(&commit(&ledger, &[])).unwrap();
        witness.observe_state(SystemState::Degraded).unwrap();

        let json = serde_json::to_value(witness.snapshot().unwrap().public()).unwrap();
        assert_eq!(json["state"], "Degraded");
        assert!(json.get("degraded_origin").is_none());
        assert!(json.get("entry_count").is_none());
        assert!(!json.to_string().contains("secret"));
    }
}
