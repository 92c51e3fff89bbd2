//! Crash marker file.

use crate::error::{ApiError, StorageError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Whether the previous process shut down cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    Clean,
    Recovering,
}

/// One-bit intent log: present while a keeper owns the store.
///
/// The file body (pid and start time) is informational; only existence matters.
#[derive(Debug, Clone)]
pub struct CrashMarker {
    path: PathBuf,
}

impl CrashMarker {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_present(&self) -> bool {
        self.path.exists()
    }

    pub fn detect(&self) -> RecoveryState {
        if self.is_present() {
            RecoveryState::Recovering
        } else {
            RecoveryState::Clean
        }
    }

    /// Marker body, if the file exists and is readable.
    pub fn contents(&self) -> Option<String> {
        fs::read_to_string(&self.path).ok()
    }

    /// Create (or refresh) the marker for this process.
    pub fn arm(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = format!(
            "pid={}\nstarted_at={}\n",
            std::process::id(),
            Utc::now().to_rfc3339()
        );
        fs::write(&self.path, body)?;
        Ok(())
    }

    /// Remove the marker. A missing marker counts as cleared.
    pub fn clear(&self) -> Result<(), ApiError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::MarkerRemovalFailure {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
