//! Degradation state machine for the decision ledger.
//!
//! Owns the system's operational state (`Active`, `Degraded`, `Halted`):
//!
//! - `Active -> Degraded` after `degrade_after` consecutive degraded-origin
//!   commits, ledger-path failures, or slow writes
//! - `Degraded -> Active` after `recover_after` consecutive normal commits
//! - `any -> Halted` on sequence conflict, chain-integrity failure, or operator
//!   halt; only an operator reset leaves `Halted`
//!
//! Fatal conditions and resets are written to an out-of-band [`IncidentLog`].

#![deny(unsafe_code)]

pub mod error;
pub mod incident;
pub mod machine;

pub use error::{DegradationError, IncidentLogError};
pub use incident::{FileIncidentLog, IncidentKind, IncidentLog, IncidentRecord, MemoryIncidentLog};
pub use machine::{DegradationConfig, DegradationMachine, HaltCause, TransitionCause, TransitionEvent};
