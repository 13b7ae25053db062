use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointVerification, SignedCheckpoint};
use crate::error::LedgerError;
use crate::traits::LedgerReader;
use crate::verify::ChainVerification;

/// Combined integrity report served to operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verified_at: DateTime<Utc>,
    pub chain: ChainVerification,
    pub checkpoint: Option<CheckpointVerification>,
}

impl VerificationReport {
    /// Verify the chain and, when given, the latest signed checkpoint.
    pub fn build<R: LedgerReader + ?Sized>(
        reader: &R,
        latest: Option<(&SignedCheckpoint, &VerifyingKey)>,
    ) -> Result<Self, LedgerError> {
        let chain = reader.verify()?;
        let checkpoint = latest
            .map(|(signed, key)| CheckpointVerification::check(signed, key, reader))
            .transpose()?;
        Ok(Self {
            verified_at: Utc::now(),
            chain,
            checkpoint,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.chain.valid
            && self
                .checkpoint
                .as_ref()
                .map_or(true, |c| c.signature_valid && c.matches_ledger)
    }
}
