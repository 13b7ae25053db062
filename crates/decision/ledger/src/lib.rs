//! Append-only, hash-chained decision ledger.
//!
//! Entries are sealed by `decision-types` and linked by previous-entry hash
//! starting from [`decision_types::EntryHash::GENESIS`]. Storage backends
//! implement [`LedgerWriter`] and [`LedgerReader`]:
//!
//! - [`InMemoryLedger`] for tests and embedding
//! - [`FileLedger`], JSON lines with `sync_data` before acknowledge
//!
//! Readers never block on durable writes and never observe a partial entry.
//! Integrity is checked by [`verify_entries`] and, out of band, by signed
//! Merkle checkpoints ([`checkpoint`]).

#![deny(unsafe_code)]

pub mod arena;
pub mod checkpoint;
pub mod error;
pub mod file;
pub mod memory;
pub mod report;
pub mod traits;
pub mod verify;

pub use arena::EntryArena;
pub use checkpoint::{
    merkle_root, Checkpoint, CheckpointSchedule, CheckpointSigner, CheckpointVerification,
    SignedCheckpoint,
};
pub use error::LedgerError;
pub use file::FileLedger;
pub use memory::InMemoryLedger;
pub use report::VerificationReport;
pub use traits::{LedgerReader, LedgerStore, LedgerWriter};
pub use verify::{verify_entries, ChainFailure, ChainVerification};

/// Re-exported so callers can hold checkpoint keys without a direct dependency.
pub use ed25519_dalek::VerifyingKey;
