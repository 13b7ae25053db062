//! Decision engine for the constraint-aware decision ledger.
//!
//! Requests flow one way: validation, then the single sequential appender,
//! then the degradation machine, then the witness. The witness never feeds
//! back into decisions.
//!
//! ## Validation protocol
//!
//! 1. **Authority**: the token must pass the external [`AuthorityValidator`];
//!    otherwise `AuthorityRejected`, nothing written, no state change.
//! 2. **Constraint declaration**: an empty set is replaced by the synthesized
//!    `absence = true` constraint and the entry is flagged degraded-origin.
//!    Absence is never an error.
//! 3. **Payload**: size limit plus the external [`PayloadValidator`];
//!    otherwise `PayloadInvalid`.
//!
//! While the system is `Halted` every submit fails with `SystemHalted`.

mod appender;
pub mod checkpoints;
pub mod config;
pub mod engine;
pub mod error;
pub mod mocks;
pub mod submission;
pub mod traits;
pub mod validators;

pub use checkpoints::CheckpointBook;
pub use config::EngineConfig;
pub use engine::{DecisionEngine, EngineBuilder};
pub use error::{EngineError, SubmitError};
pub use mocks::{FaultyLedger, MockAuthority};
pub use submission::{CommitReceipt, SubmissionRequest, SubmissionResponse, SubmissionStatus};
pub use traits::{AuthorityValidator, PayloadValidator};
pub use validators::{AcceptAnyPayload, JsonObjectPayload, NonEmptyPayload, StaticTokenAuthority};
