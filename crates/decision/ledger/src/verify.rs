use std::sync::Arc;

use decision_types::{EntryHash, LedgerEntry};
use serde::{Deserialize, Serialize};

/// First point at which a chain failed verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFailure {
    pub seq: u64,
    pub reason: String,
}

/// Result of recomputing the hash chain across a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub entry_count: u64,
    pub head_hash: Option<EntryHash>,
    pub valid: bool,
    pub failure: Option<ChainFailure>,
}

/// Verify sequence continuity, previous-hash links, and content hashes.
pub fn verify_entries(entries: &[Arc<LedgerEntry>]) -> ChainVerification {
    let mut prev = EntryHash::GENESIS;

    for (index, entry) in entries.iter().enumerate() {
        let expected_seq = (index + 1) as u64;
        let failure = if entry.seq() != expected_seq {
            Some(format!("expected seq {expected_seq}, found {}", entry.seq()))
        } else if entry.prev_hash() != prev {
            Some("previous hash link mismatch".to_string())
        } else if entry.constraints().is_empty() {
            Some("committed constraint set is empty".to_string())
        } else if !entry.is_intact() {
            Some("entry hash mismatch".to_string())
        } else {
            None
        };

        if let Some(reason) = failure {
            return ChainVerification {
                entry_count: entries.len() as u64,
                head_hash: entries.last().map(|e| e.entry_hash()),
                valid: false,
                failure: Some(ChainFailure {
                    seq: entry.seq(),
                    reason,
                }),
            };
        }

        prev = entry.entry_hash();
    }

    ChainVerification {
        entry_count: entries.len() as u64,
        head_hash: entries.last().map(|e| e.entry_hash()),
        valid: true,
        failure: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use decision_types::{Authority, AuthorityToken, ConstraintSet, EntryDraft, Payload};

    use super::*;

    fn chain(len: u64) -> Vec<Arc<LedgerEntry>> {
        let authority = Authority::attest(&AuthorityToken::new("ops")).unwrap();
        let mut prev = EntryHash::GENESIS;
        (1..=len)
            .map(|seq| {
                let entry = LedgerEntry::seal(
                    EntryDraft {
                        seq,
                        payload: Payload::from(format!("d{seq}").as_str()),
                        constraints: ConstraintSet::absence(Utc::now()),
                        authority: authority.clone(),
                        committed_at: Utc::now(),
                        degraded_origin: true,
                    },
                    prev,
                )
                .unwrap();
                prev = entry.entry_hash();
                Arc::new(entry)
            })
            .collect()
    }

    #[test]
    fn empty_chain_is_valid() {
        let report = verify_entries(&[]);
        assert!(report.valid);
        assert_eq!(report.entry_count, 0);
        assert_eq!(report.head_hash, None);
    }

    #[test]
    fn intact_chain_verifies() {
        let entries = chain(5);
        let report = verify_entries(&entries);
        assert!(report.valid);
        assert_eq!(report.head_hash, Some(entries[4].entry_hash()));
    }

    #[test]
    fn reordered_chain_reports_first_failure() {
        let mut entries = chain(3);
        entries.swap(1, 2);
        let report = verify_entries(&entries);
        assert!(!report.valid);
        assert_eq!(report.failure.unwrap().seq, 3);
    }

    #[test]
    fn dropped_entry_breaks_link() {
        let mut entries = chain(3);
        entries.remove(0);
        let report = verify_entries(&entries);
        assert!(!report.valid);
        assert_eq!(
            report.failure.unwrap().reason,
            "expected seq 1, found 2".to_string()
        );
    }
}
