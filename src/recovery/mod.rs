//! Crash detection and recovery.
//!
//! A marker file is armed when a keeper starts and removed only on graceful
//! shutdown. Finding it at startup means the previous process died; the coordinator
//! then rebuilds the context from the newest readable snapshot.

pub mod coordinator;
pub mod marker;
pub mod report;

pub use coordinator::{Recovery, RecoveryCoordinator, Startup};
pub use marker::{CrashMarker, RecoveryState};
pub use report::{OpenTask, RecoveryReport, RecoverySource, RecoveryTarget};
