use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use decision_ledger::{InMemoryLedger, LedgerError, LedgerReader, LedgerWriter};
use decision_types::{AuthorityToken, LedgerEntry};

use crate::traits::AuthorityValidator;

/// Mock authority collaborator for testing.
pub struct MockAuthority {
    accepted: Option<HashSet<String>>,
    delay: Option<Duration>,
}

impl MockAuthority {
    /// Accept every non-blank token.
    pub fn accept_all() -> Self {
        Self {
            accepted: None,
            delay: None,
        }
    }

    pub fn deny_all() -> Self {
        Self {
            accepted: Some(HashSet::new()),
            delay: None,
        }
    }

    pub fn accepting<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            accepted: Some(tokens.into_iter().map(Into::into).collect()),
            delay: None,
        }
    }

    /// Sleep before answering, to exercise submit timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl AuthorityValidator for MockAuthority {
    async fn validate(&self, token: &AuthorityToken) -> bool {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.accepted {
            None => !token.is_blank(),
            Some(accepted) => accepted.contains(token.as_str()),
        }
    }
}

/// In-memory ledger with injectable faults.
#[derive(Default)]
pub struct FaultyLedger {
    inner: InMemoryLedger,
    fail_appends: AtomicU32,
    conflict_next: AtomicBool,
    append_delay_ms: AtomicU64,
}

impl FaultyLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `n` appends fail with an I/O error and write nothing.
    pub fn fail_next_appends(&self, n: u32) {
        self.fail_appends.store(n, Ordering::SeqCst);
    }

    /// The next append reports a sequence conflict.
    pub fn conflict_next_append(&self) {
        self.conflict_next.store(true, Ordering::SeqCst);
    }

    /// Every append sleeps this long before writing.
    pub fn set_append_delay(&self, delay: Duration) {
        self.append_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl LedgerWriter for FaultyLedger {
    fn append(&self, entry: LedgerEntry) -> Result<u64, LedgerError> {
        let delay = self.append_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.conflict_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::SequenceConflict {
                seq: entry.seq(),
                reason: "injected conflict".into(),
            });
        }
        let failing = self
            .fail_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LedgerError::Io("injected write failure".into()));
        }
        self.inner.append(entry)
    }
}

impl LedgerReader for FaultyLedger {
    fn tail(&self) -> Result<Option<Arc<LedgerEntry>>, LedgerError> {
        self.inner.tail()
    }

    fn read_range(&self, from_seq: u64, to_seq: u64) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        self.inner.read_range(from_seq, to_seq)
    }

    fn entry_count(&self) -> Result<u64, LedgerError> {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_authority_modes() {
        let token = AuthorityToken::new("ops:key");
        assert!(MockAuthority::accept_all().validate(&token).await);
        assert!(!MockAuthority::deny_all().validate(&token).await);
        assert!(MockAuthority::accepting(["ops:key"]).validate(&token).await);
        assert!(!MockAuthority::accept_all().validate(&AuthorityToken::new("")).await);
    }

    fn first_entry() -> LedgerEntry {
        use chrono::Utc;
        use decision_types::{Authority, ConstraintSet, EntryDraft, EntryHash, Payload};

        LedgerEntry::seal(
            EntryDraft {
                seq: 1,
                payload: Payload::from("x"),
                constraints: ConstraintSet::absence(Utc::now()),
                authority: Authority::attest(&AuthorityToken::new("ops")).unwrap(),
                committed_at: Utc::now(),
                degraded_origin: true,
            },
            EntryHash::GENESIS,
        )
        .unwrap()
    }

    #[test]
    fn faulty_ledger_fails_then_recovers() {
        let ledger = FaultyLedger::new();
        ledger.fail_next_appends(1);
        assert!(matches!(
            ledger.append(first_entry()),
            Err(LedgerError::Io(_))
        ));
        assert_eq!(ledger.entry_count().unwrap(), 0);
        assert_eq!(ledger.append(first_entry()).unwrap(), 1);
    }

    #[test]
    fn injected_conflict_is_fatal() {
        let ledger = FaultyLedger::new();
        ledger.conflict_next_append();
        assert!(ledger.append(first_entry()).unwrap_err().is_fatal());
        assert_eq!(ledger.append(first_entry()).unwrap(), 1);
    }
}
