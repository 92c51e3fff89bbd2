//! Configuration System
//!
//! Layered configuration: built-in defaults, the user-level global file, workspace
//! files, then `KEEPER_*` environment variables. Tests included.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::recovery::RecoveryTarget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeeperConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage locations. Relative paths are resolved against the workspace root by
/// [`ConfigLoader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Present while a process owns the store; found at startup means a crash.
    #[serde(default = "default_marker_path")]
    pub marker_path: PathBuf,

    #[serde(default = "default_emergency_dir")]
    pub emergency_dir: PathBuf,
}

pub(crate) fn default_store_path() -> PathBuf {
    PathBuf::from(".keeper/store")
}

pub(crate) fn default_marker_path() -> PathBuf {
    PathBuf::from(".keeper/keeper.running")
}

pub(crate) fn default_emergency_dir() -> PathBuf {
    PathBuf::from(".keeper/emergency")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            marker_path: default_marker_path(),
            emergency_dir: default_emergency_dir(),
        }
    }
}

impl StorageConfig {
    /// Same config with every relative path joined onto `root`.
    pub fn resolved(&self, root: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        };
        Self {
            store_path: resolve(&self.store_path),
            marker_path: resolve(&self.marker_path),
            emergency_dir: resolve(&self.emergency_dir),
        }
    }

    /// Rooted under `root` with the default layout.
    pub fn under(root: &Path) -> Self {
        Self::default().resolved(root)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Start the background scheduler when the keeper opens.
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

pub(crate) fn default_interval_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            auto_start: true,
        }
    }
}

impl CheckpointConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Agents not updated within this window are reported stale after recovery.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,

    /// Startup recovery restores the newest recovery point instead of the newest snapshot.
    #[serde(default)]
    pub prefer_recovery_point: bool,
}

pub(crate) fn default_staleness_secs() -> u64 {
    300
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
            prefer_recovery_point: false,
        }
    }
}

impl RecoveryConfig {
    pub fn staleness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.staleness_secs.min(u64::from(u32::MAX)) as i64)
    }

    pub fn startup_target(&self) -> RecoveryTarget {
        if self.prefer_recovery_point {
            RecoveryTarget::LatestRecoveryPoint
        } else {
            RecoveryTarget::Latest
        }
    }
}

impl KeeperConfig {
    /// Defaults with storage rooted under `root`.
    pub fn for_workspace(root: &Path) -> Self {
        Self {
            storage: StorageConfig::under(root),
            ..Self::default()
        }
    }

    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push("storage.store_path cannot be empty".to_string());
        }
        if self.storage.marker_path.as_os_str().is_empty() {
            errors.push("storage.marker_path cannot be empty".to_string());
        }
        if self.storage.emergency_dir.as_os_str().is_empty() {
            errors.push("storage.emergency_dir cannot be empty".to_string());
        }
        if self.checkpoint.interval_secs == 0 {
            errors.push("checkpoint.interval_secs must be greater than zero".to_string());
        }
        if self.recovery.staleness_secs == 0 {
            errors.push("recovery.staleness_secs must be greater than zero".to_string());
        }
        if let Err(e) = crate::logging::validate(&self.logging) {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )))
        }
    }

    /// Effective configuration as TOML, for `keeper config`.
    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
