//! Checkpointing: content hashing, the deduplicating persister and the periodic
//! scheduler that drives it.

pub mod hasher;
pub mod persister;
pub mod scheduler;

pub use persister::{CheckpointInfo, DedupPersister, PersistenceStats, SaveOutcome, SaveRequest};
pub use scheduler::{CheckpointScheduler, CheckpointTarget};
