//! Error types for the keeper persistence engine.

use crate::types::SnapshotId;
use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt snapshot {id}: {reason}")]
    CorruptSnapshot { id: SnapshotId, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

/// Errors surfaced to callers of the facade and the CLI.
///
/// Persistence trouble is absorbed below the facade; what reaches callers here is
/// lifecycle misuse or bad configuration.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Checkpoint scheduler is already running")]
    SchedulerAlreadyRunning,

    #[error("Failed to remove crash marker {path:?}: {reason}")]
    MarkerRemovalFailure { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
