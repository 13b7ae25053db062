//! Core record types for the constraint-aware decision ledger.
//!
//! This crate provides:
//! - validated constraint declarations and the absence-as-constraint rule
//! - opaque authority tokens and the authority record committed with each entry
//! - sealed, hash-linked ledger entries with no mutation surface
//! - the operational system state and submit outcome categories

#![deny(unsafe_code)]

pub mod authority;
pub mod constraint;
pub mod entry;
pub mod error;
pub mod hash;
pub mod payload;
pub mod state;

pub use authority::{Authority, AuthorityToken};
pub use constraint::{Constraint, ConstraintSet, ABSENCE_KEY, ABSENCE_VALUE};
pub use entry::{EntryDraft, LedgerEntry};
pub use error::TypeError;
pub use hash::EntryHash;
pub use payload::Payload;
pub use state::{RejectionKind, SubmitOutcome, SystemState};
