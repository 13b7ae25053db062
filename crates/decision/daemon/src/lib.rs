//! decisiond library
//!
//! Configuration, engine bootstrap, and the HTTP transport for the decision
//! ledger:
//! - submission (`POST /api/v1/decisions`)
//! - witness and verification reads
//! - operator halt, reset, and checkpoints

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod server;

pub use bootstrap::build_engine;
pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, DaemonResult};
pub use server::Server;
