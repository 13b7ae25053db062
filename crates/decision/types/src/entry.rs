use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authority::Authority;
use crate::constraint::ConstraintSet;
use crate::error::TypeError;
use crate::hash::EntryHash;
use crate::payload::Payload;

const ENTRY_HASH_DOMAIN: &[u8] = b"decision-ledger-entry-v1:";

/// Everything a committed entry carries except its hash links.
#[derive(Clone, Debug)]
pub struct EntryDraft {
    pub seq: u64,
    pub payload: Payload,
    pub constraints: ConstraintSet,
    pub authority: Authority,
    pub committed_at: DateTime<Utc>,
    pub degraded_origin: bool,
}

/// Immutable ledger record.
///
/// Entries are produced only by [`LedgerEntry::seal`] and expose read accessors
/// only; there is no way to change a field of a sealed entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    seq: u64,
    payload: Payload,
    constraints: ConstraintSet,
    authority: Authority,
    committed_at: DateTime<Utc>,
    degraded_origin: bool,
    prev_hash: EntryHash,
    entry_hash: EntryHash,
}

/// Hashed view of an entry; field order is part of the hash format.
#[derive(Serialize)]
struct CanonicalEntry<'a> {
    seq: u64,
    payload: &'a Payload,
    constraints: &'a ConstraintSet,
    authority: &'a Authority,
    committed_at: &'a DateTime<Utc>,
    degraded_origin: bool,
}

impl LedgerEntry {
    /// Seal a draft onto the chain after `prev_hash`.
    pub fn seal(draft: EntryDraft, prev_hash: EntryHash) -> Result<Self, TypeError> {
        if draft.seq == 0 {
            return Err(TypeError::InvalidSequence(0));
        }
        if draft.constraints.is_empty() {
            return Err(TypeError::EmptyConstraintSet);
        }

        let mut entry = Self {
            seq: draft.seq,
            payload: draft.payload,
            constraints: draft.constraints,
            authority: draft.authority,
            committed_at: draft.committed_at,
            degraded_origin: draft.degraded_origin,
            prev_hash,
            entry_hash: EntryHash::GENESIS,
        };
        entry.entry_hash = entry.recompute_hash()?;
        Ok(entry)
    }

    /// Hash of this entry's content linked to its stored previous hash.
    pub fn recompute_hash(&self) -> Result<EntryHash, TypeError> {
        let canonical = CanonicalEntry {
            seq: self.seq,
            payload: &self.payload,
            constraints: &self.constraints,
            authority: &self.authority,
            committed_at: &self.committed_at,
            degraded_origin: self.degraded_origin,
        };
        let encoded = serde_json::to_vec(&canonical)
            .map_err(|error| TypeError::Serialization(error.to_string()))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(ENTRY_HASH_DOMAIN);
        hasher.update(self.prev_hash.as_bytes());
        hasher.update(&encoded);
        Ok(hasher.finalize().into())
    }

    /// Whether the stored hash still matches the content.
    pub fn is_intact(&self) -> bool {
        self.recompute_hash()
            .map(|hash| hash == self.entry_hash)
            .unwrap_or(false)
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    pub fn degraded_origin(&self) -> bool {
        self.degraded_origin
    }

    pub fn prev_hash(&self) -> EntryHash {
        self.prev_hash
    }

    pub fn entry_hash(&self) -> EntryHash {
        self.entry_hash
    }
}
