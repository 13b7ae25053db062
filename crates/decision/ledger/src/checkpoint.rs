//! Merkle checkpoints over the entry-hash sequence, signed with Ed25519.
//!
//! Checkpoints live outside the ledger and never modify it. A checkpoint over
//! the first `n` entries stays verifiable forever because entries are
//! immutable.

use chrono::{DateTime, Utc};
use decision_types::EntryHash;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::traits::LedgerReader;

const CHECKPOINT_SIGN_DOMAIN: &[u8] = b"decision-ledger-checkpoint-v1:";

/// Merkle root over entry hashes: pairwise `BLAKE3(left || right)`, the last
/// node of an odd layer paired with itself. `None` for an empty ledger.
pub fn merkle_root(hashes: &[EntryHash]) -> Option<EntryHash> {
    if hashes.is_empty() {
        return None;
    }

    let mut layer: Vec<[u8; 32]> = hashes.iter().map(|h| *h.as_bytes()).collect();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut hasher = blake3::Hasher::new();
                hasher.update(&left);
                hasher.update(&right);
                *hasher.finalize().as_bytes()
            })
            .collect();
    }
    Some(EntryHash::from_bytes(layer[0]))
}

/// Commitment to the first `entry_count` entries of the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub entry_count: u64,
    pub head_hash: EntryHash,
    pub merkle_root: EntryHash,
    pub generated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Checkpoint the first `entry_count` entries (the whole ledger when
    /// `None`). Returns `None` for an empty range.
    pub fn capture<R: LedgerReader + ?Sized>(
        reader: &R,
        entry_count: Option<u64>,
    ) -> Result<Option<Self>, LedgerError> {
        let available = reader.entry_count()?;
        let count = entry_count.unwrap_or(available);
        if count == 0 {
            return Ok(None);
        }
        if count > available {
            return Err(LedgerError::Checkpoint(format!(
                "cannot checkpoint {count} entries; ledger holds {available}"
            )));
        }

        let entries = reader.read_range(1, count)?;
        let hashes: Vec<EntryHash> = entries.iter().map(|e| e.entry_hash()).collect();
        let (Some(root), Some(head)) = (merkle_root(&hashes), hashes.last().copied()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            entry_count: count,
            head_hash: head,
            merkle_root: root,
            generated_at: Utc::now(),
        }))
    }

    fn signing_preimage(&self) -> Vec<u8> {
        let mut preimage = Vec::with_capacity(CHECKPOINT_SIGN_DOMAIN.len() + 8 + 64 + 32);
        preimage.extend_from_slice(CHECKPOINT_SIGN_DOMAIN);
        preimage.extend_from_slice(&self.entry_count.to_be_bytes());
        preimage.extend_from_slice(self.head_hash.as_bytes());
        preimage.extend_from_slice(self.merkle_root.as_bytes());
        preimage.extend_from_slice(self.generated_at.to_rfc3339().as_bytes());
        preimage
    }

    /// Whether the ledger still produces this checkpoint's root and head.
    pub fn matches<R: LedgerReader + ?Sized>(&self, reader: &R) -> Result<bool, LedgerError> {
        if reader.entry_count()? < self.entry_count {
            return Ok(false);
        }
        let entries = reader.read_range(1, self.entry_count)?;
        let hashes: Vec<EntryHash> = entries.iter().map(|e| e.entry_hash()).collect();
        Ok(merkle_root(&hashes) == Some(self.merkle_root)
            && hashes.last() == Some(&self.head_hash))
    }
}

/// A checkpoint with its detached Ed25519 signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCheckpoint {
    pub checkpoint: Checkpoint,
    pub key_id: String,
    pub algorithm: String,
    pub signature: String,
}

impl SignedCheckpoint {
    pub fn verify(&self, key: &VerifyingKey) -> bool {
        let mut bytes = [0u8; 64];
        if hex::decode_to_slice(&self.signature, &mut bytes).is_err() {
            return false;
        }
        let signature = Signature::from_bytes(&bytes);
        key.verify(&self.checkpoint.signing_preimage(), &signature)
            .is_ok()
    }
}

/// Outcome of checking a signed checkpoint against a key and a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointVerification {
    pub entry_count: u64,
    pub head_hash: EntryHash,
    pub merkle_root: EntryHash,
    pub generated_at: DateTime<Utc>,
    pub key_id: String,
    pub signature_valid: bool,
    pub matches_ledger: bool,
}

impl CheckpointVerification {
    pub fn check<R: LedgerReader + ?Sized>(
        signed: &SignedCheckpoint,
        key: &VerifyingKey,
        reader: &R,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            entry_count: signed.checkpoint.entry_count,
            head_hash: signed.checkpoint.head_hash,
            merkle_root: signed.checkpoint.merkle_root,
            generated_at: signed.checkpoint.generated_at,
            key_id: signed.key_id.clone(),
            signature_valid: signed.verify(key),
            matches_ledger: signed.checkpoint.matches(reader)?,
        })
    }
}

/// Holds the checkpoint signing key.
pub struct CheckpointSigner {
    key_id: String,
    signing_key: SigningKey,
}

impl CheckpointSigner {
    pub fn from_seed(key_id: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Parse a 64-character hex seed, as written by `decisiond keygen`.
    pub fn from_hex_seed(key_id: impl Into<String>, seed_hex: &str) -> Result<Self, LedgerError> {
        let mut seed = [0u8; 32];
        hex::decode_to_slice(seed_hex.trim(), &mut seed)
            .map_err(|e| LedgerError::Checkpoint(format!("signing seed is not 32 hex bytes: {e}")))?;
        Ok(Self::from_seed(key_id, seed))
    }

    /// Fresh random key; signatures will not verify across restarts.
    pub fn ephemeral(key_id: impl Into<String>) -> Self {
        Self::from_seed(key_id, rand::random::<[u8; 32]>())
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn sign(&self, checkpoint: Checkpoint) -> SignedCheckpoint {
        let signature = self.signing_key.sign(&checkpoint.signing_preimage());
        SignedCheckpoint {
            checkpoint,
            key_id: self.key_id.clone(),
            algorithm: "ed25519".into(),
            signature: hex::encode(signature.to_bytes()),
        }
    }
}

/// Checkpoint every `cadence` entries; zero disables scheduled checkpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointSchedule {
    pub cadence: u64,
}

impl CheckpointSchedule {
    pub fn is_due(&self, seq: u64) -> bool {
        self.cadence > 0 && seq > 0 && seq % self.cadence == 0
    }
}

#[cfg(test)]
mod tests {
    use decision_types::{Authority, AuthorityToken, ConstraintSet, EntryDraft, LedgerEntry, Payload};

    use super::*;
    use crate::memory::InMemoryLedger;
    use crate::traits::LedgerWriter;

    fn ledger_with(count: u64) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        let authority = Authority::attest(&AuthorityToken::new("ops")).unwrap();
        let mut prev = EntryHash::GENESIS;
        for seq in 1..=count {
            let entry = LedgerEntry::seal(
                EntryDraft {
                    seq,
                    payload: Payload::from("x"),
                    constraints: ConstraintSet::declare([("k", "v")], Utc::now()).unwrap(),
                    authority: authority.clone(),
                    committed_at: Utc::now(),
                    degraded_origin: false,
                },
                prev,
            )
            .unwrap();
            prev = entry.entry_hash();
            ledger.append(entry).unwrap();
        }
        ledger
    }

    fn leaf(n: u8) -> EntryHash {
        EntryHash::from_bytes([n; 32])
    }

    #[test]
    fn merkle_root_of_single_leaf_is_the_leaf() {
        assert_eq!(merkle_root(&[leaf(1)]), Some(leaf(1)));
        assert_eq!(merkle_root(&[]), None);
    }

    #[test]
    fn odd_layer_duplicates_last_node() {
        let three = merkle_root(&[leaf(1), leaf(2), leaf(3)]);
        let padded = merkle_root(&[leaf(1), leaf(2), leaf(3), leaf(3)]);
        assert_eq!(three, padded);
    }

    #[test]
    fn signed_checkpoint_verifies_and_matches_ledger() {
        let ledger = ledger_with(10);
        let signer = CheckpointSigner::from_seed("test-key", [7; 32]);
        let checkpoint = Checkpoint::capture(&ledger, None).unwrap().unwrap();
        assert_eq!(checkpoint.entry_count, 10);

        let signed = signer.sign(checkpoint);
        let report =
            CheckpointVerification::check(&signed, &signer.verifying_key(), &ledger).unwrap();
        assert!(report.signature_valid);
        assert!(report.matches_ledger);
    }

    #[test]
    fn checkpoint_stays_valid_as_ledger_grows() {
        let ledger = ledger_with(4);
        let checkpoint = Checkpoint::capture(&ledger, Some(3)).unwrap().unwrap();
        assert!(checkpoint.matches(&ledger).unwrap());
    }

    #[test]
    fn altered_checkpoint_fails_signature() {
        let ledger = ledger_with(3);
        let signer = CheckpointSigner::ephemeral("test-key");
        let mut signed = signer.sign(Checkpoint::capture(&ledger, None).unwrap().unwrap());
        signed.checkpoint.entry_count = 2;
        assert!(!signed.verify(&signer.verifying_key()));
    }

    #[test]
    fn other_key_fails_signature() {
        let ledger = ledger_with(2);
        let signed = CheckpointSigner::from_seed("a", [1; 32])
            .sign(Checkpoint::capture(&ledger, None).unwrap().unwrap());
        let other = CheckpointSigner::from_seed("b", [2; 32]);
        assert!(!signed.verify(&other.verifying_key()));
    }

    #[test]
    fn hex_seed_roundtrips() {
        let signer = CheckpointSigner::from_seed("k", [9; 32]);
        let restored = CheckpointSigner::from_hex_seed("k", &signer.seed_hex()).unwrap();
        assert_eq!(restored.verifying_key(), signer.verifying_key());
        assert!(CheckpointSigner::from_hex_seed("k", "abcd").is_err());
    }

    #[test]
    fn signed_hex_seed_is_rejected() {
        let seed = CheckpointSigner::from_seed("k", [9; 32]).seed_hex();
        let signed = format!("+9{}", &seed[2..]);
        assert!(CheckpointSigner::from_hex_seed("k", &signed).is_err());
    }

    #[test]
    fn signed_hex_signature_fails_verification() {
        let ledger = ledger_with(2);
        let signer = CheckpointSigner::from_seed("k", [4; 32]);
        let mut signed = signer.sign(Checkpoint::capture(&ledger, None).unwrap().unwrap());
        assert!(signed.verify(&signer.verifying_key()));
        signed.signature.replace_range(0..2, "+a");
        assert!(!signed.verify(&signer.verifying_key()));
    }

    #[test]
    fn schedule_fires_on_cadence_multiples() {
        let schedule = CheckpointSchedule { cadence: 10 };
        assert!(!schedule.is_due(9));
        assert!(schedule.is_due(10));
        assert!(schedule.is_due(20));
        assert!(!CheckpointSchedule { cadence: 0 }.is_due(10));
    }

    #[test]
    fn empty_ledger_has_no_checkpoint() {
        let ledger = InMemoryLedger::new();
        assert!(Checkpoint::capture(&ledger, None).unwrap().is_none());
        assert!(Checkpoint::capture(&ledger, Some(1)).is_err());
    }
}
