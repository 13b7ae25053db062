//! Single sequential appender.
//!
//! Submits from any number of tasks are queued here and committed one at a
//! time. Sequence number, previous hash, and commit timestamp are assigned
//! inside this task, so assignment is atomic and gapless without a lock
//! around the store.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use decision_degradation::HaltCause;
use decision_ledger::LedgerError;
use decision_types::{
    Authority, ConstraintSet, EntryDraft, EntryHash, LedgerEntry, Payload, SubmitOutcome,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::engine::EngineCore;
use crate::error::SubmitError;
use crate::submission::CommitReceipt;

const PENDING: u8 = 0;
const CLAIMED: u8 = 1;
const CANCELLED: u8 = 2;

/// Shared claim flag between a waiting submit and the appender. Whichever
/// side moves it off `PENDING` first wins: the appender by claiming the
/// request, the caller by cancelling it.
#[derive(Clone)]
pub(crate) struct Ticket(Arc<AtomicU8>);

impl Ticket {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(PENDING)))
    }

    fn claim(&self) -> bool {
        self.0
            .compare_exchange(PENDING, CLAIMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn cancel(&self) -> bool {
        self.0
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Cancels the ticket if the submit future is dropped before the appender
/// claims it.
pub(crate) struct CancelOnDrop(pub(crate) Ticket);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

pub(crate) struct AppendRequest {
    pub(crate) ticket: Ticket,
    pub(crate) payload: Payload,
    pub(crate) constraints: ConstraintSet,
    pub(crate) authority: Authority,
    pub(crate) degraded_origin: bool,
    pub(crate) reply: oneshot::Sender<Result<CommitReceipt, SubmitError>>,
}

pub(crate) struct Appender {
    core: Arc<EngineCore>,
}

impl Appender {
    pub(crate) fn new(core: Arc<EngineCore>) -> Self {
        Self { core }
    }

    pub(crate) async fn run(self, mut queue: mpsc::Receiver<AppendRequest>) {
        info!("Appender started");
        while let Some(request) = queue.recv().await {
            if !request.ticket.claim() {
                debug!("Skipping request cancelled before append");
                continue;
            }
            let AppendRequest {
                payload,
                constraints,
                authority,
                degraded_origin,
                reply,
                ..
            } = request;

            let result = self
                .commit(payload, constraints, authority, degraded_origin)
                .await;
            // The caller may have gone away; the commit stands either way.
            let _ = reply.send(result);
        }
        info!("Appender stopped");
    }

    async fn commit(
        &self,
        payload: Payload,
        constraints: ConstraintSet,
        authority: Authority,
        degraded_origin: bool,
    ) -> Result<CommitReceipt, SubmitError> {
        let core = &self.core;
        if core.machine.state().is_halted() {
            return Err(core.reject(SubmitError::SystemHalted));
        }

        let tail = core
            .store
            .tail()
            .map_err(|e| core.reject(SubmitError::LedgerUnavailable(e.to_string())))?;
        let seq = tail.as_ref().map_or(1, |t| t.seq() + 1);
        let prev_hash = tail.map_or(EntryHash::GENESIS, |t| t.entry_hash());

        let entry = LedgerEntry::seal(
            EntryDraft {
                seq,
                payload,
                constraints,
                authority,
                committed_at: Utc::now(),
                degraded_origin,
            },
            prev_hash,
        )
        .map_err(|e| core.reject(SubmitError::LedgerUnavailable(e.to_string())))?;

        let outcome = if degraded_origin {
            SubmitOutcome::DegradedOrigin
        } else {
            SubmitOutcome::Normal
        };

        let store = Arc::clone(&core.store);
        let durable = entry.clone();
        let started = Instant::now();
        let mut write = tokio::task::spawn_blocking(move || store.append(durable));

        // A write still running past the slow threshold is reported while it
        // runs; it is not reported again when it finishes.
        let mut reported = false;
        let joined = match core.slow_write_after() {
            Some(after) => {
                tokio::select! {
                    joined = &mut write => joined,
                    _ = tokio::time::sleep(after) => {
                        let elapsed = started.elapsed();
                        warn!(seq, elapsed_ms = elapsed.as_millis() as u64, "Ledger write stalled");
                        core.notify_commit(outcome, elapsed);
                        reported = true;
                        write.await
                    }
                }
            }
            None => write.await,
        };
        let appended = joined
            .unwrap_or_else(|join| Err(LedgerError::Io(format!("append task failed: {join}"))));
        let latency = started.elapsed();

        match appended {
            Ok(seq) => {
                // Publish state before the entry.
                if !reported {
                    core.notify_commit(outcome, latency);
                }
                core.observe_commit(&entry);
                core.schedule_checkpoint(seq);

                debug!(
                    seq,
                    degraded_origin,
                    latency_us = latency.as_micros() as u64,
                    hash = %entry.entry_hash().short(),
                    "Entry committed"
                );
                Ok(CommitReceipt {
                    sequence_number: seq,
                    committed_at: entry.committed_at(),
                    degraded_origin,
                })
            }
            Err(error) if error.is_fatal() => {
                error!(seq, error = %error, "Fatal ledger error; halting");
                let detail = error.to_string();
                let cause = match error {
                    LedgerError::IntegrityViolation { .. } => HaltCause::IntegrityFailure {
                        detail: detail.clone(),
                    },
                    _ => HaltCause::SequenceConflict {
                        detail: detail.clone(),
                    },
                };
                core.halt(cause);
                Err(SubmitError::SequenceConflict(detail))
            }
            Err(error) => {
                error!(seq, error = %error, "Ledger append failed");
                Err(core.reject(SubmitError::LedgerUnavailable(error.to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_is_claimed_or_cancelled_once() {
        let ticket = Ticket::new();
        assert!(ticket.claim());
        assert!(!ticket.cancel());

        let ticket = Ticket::new();
        assert!(ticket.cancel());
        assert!(!ticket.claim());
    }

    #[test]
    fn dropping_guard_cancels_pending_ticket() {
        let ticket = Ticket::new();
        drop(CancelOnDrop(ticket.clone()));
        assert!(!ticket.claim());
    }
}
