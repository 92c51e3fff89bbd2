//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, StorageError};

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::StorageError(StorageError::Unavailable(reason)) => format!(
            "Snapshot store unavailable: {}\n(Is a keeper process holding the store open?)",
            reason
        ),
        ApiError::ConfigError(message) => format!("Configuration error: {}", message),
        other => other.to_string(),
    }
}
