use std::sync::RwLock;

use decision_ledger::{
    Checkpoint, CheckpointSchedule, CheckpointSigner, LedgerReader, SignedCheckpoint,
    VerificationReport, VerifyingKey,
};
use tracing::{info, warn};

use crate::error::EngineError;

/// Signs checkpoints on schedule and keeps the latest one.
pub struct CheckpointBook {
    signer: CheckpointSigner,
    schedule: CheckpointSchedule,
    latest: RwLock<Option<SignedCheckpoint>>,
}

impl CheckpointBook {
    pub fn new(signer: CheckpointSigner, cadence: u64) -> Self {
        Self {
            signer,
            schedule: CheckpointSchedule { cadence },
            latest: RwLock::new(None),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    pub fn key_id(&self) -> &str {
        self.signer.key_id()
    }

    pub fn latest(&self) -> Result<Option<SignedCheckpoint>, EngineError> {
        Ok(self
            .latest
            .read()
            .map_err(|_| EngineError::LockPoisoned)?
            .clone())
    }

    /// Called by the appender after each commit.
    pub(crate) fn on_commit<R: LedgerReader + ?Sized>(&self, seq: u64, reader: &R) {
        if !self.schedule.is_due(seq) {
            return;
        }
        if let Err(error) = self.capture(reader, Some(seq)) {
            warn!(seq, error = %error, "Scheduled checkpoint failed");
        }
    }

    /// Sign a checkpoint of the current tail. `None` for an empty ledger.
    pub fn checkpoint_now<R: LedgerReader + ?Sized>(
        &self,
        reader: &R,
    ) -> Result<Option<SignedCheckpoint>, EngineError> {
        self.capture(reader, None)
    }

    pub fn report<R: LedgerReader + ?Sized>(
        &self,
        reader: &R,
    ) -> Result<VerificationReport, EngineError> {
        let latest = self.latest()?;
        let key = self.verifying_key();
        Ok(VerificationReport::build(
            reader,
            latest.as_ref().map(|signed| (signed, &key)),
        )?)
    }

    fn capture<R: LedgerReader + ?Sized>(
        &self,
        reader: &R,
        entry_count: Option<u64>,
    ) -> Result<Option<SignedCheckpoint>, EngineError> {
        let Some(checkpoint) = Checkpoint::capture(reader, entry_count)? else {
            return Ok(None);
        };
        let signed = self.signer.sign(checkpoint);
        info!(
            entry_count = signed.checkpoint.entry_count,
            merkle_root = %signed.checkpoint.merkle_root.short(),
            key_id = %signed.key_id,
            "Checkpoint signed"
        );

        let mut latest = self.latest.write().map_err(|_| EngineError::LockPoisoned)?;
        let newer = latest
            .as_ref()
            .map_or(true, |l| l.checkpoint.entry_count <= signed.checkpoint.entry_count);
        if newer {
            *latest = Some(signed.clone());
        }
        Ok(Some(signed))
    }
}
