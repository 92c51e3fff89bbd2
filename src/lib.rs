//! Keeper: Crash-Recoverable Context Persistence
//!
//! Keeps an orchestrator's working state (task progress, agent states, decisions,
//! conversation history) in memory, mirrors it into a sled-backed snapshot store on a
//! fixed cadence with content-hash deduplication, and restores it after an unclean
//! shutdown detected through a marker file.

pub mod api;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod context;
pub mod emergency;
pub mod error;
pub mod logging;
pub mod recovery;
pub mod status;
pub mod store;
pub mod types;

pub use api::{ContextKeeper, ShutdownSummary};
pub use context::ActiveContext;
pub use error::{ApiError, StorageError};
