//! API request handlers

mod admin;
mod decisions;
mod health;
mod ledger;
mod witness;

pub use admin::*;
pub use decisions::*;
pub use health::*;
pub use ledger::*;
pub use witness::*;
