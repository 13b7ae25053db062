//! Witness projection: the read-only public surface of the decision ledger.
//!
//! Reports current system state, the last committed sequence number and
//! timestamp, and the constraint keys acknowledged by the trailing entries.
//! Never exposes payloads or authority detail.

#![deny(unsafe_code)]

pub mod error;
pub mod projection;

pub use error::WitnessError;
pub use projection::{PublicWitness, WitnessProjection, WitnessSnapshot};
