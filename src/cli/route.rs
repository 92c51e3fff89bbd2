//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::api::ContextKeeper;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_decisions_json, format_decisions_text, format_emergency_json, format_emergency_text,
    format_messages_json, format_messages_text, format_recovery_report_json,
    format_recovery_report_text, format_snapshots_json, format_snapshots_text,
    format_task_history_json, format_task_history_text, EmergencyEntry, SnapshotEntry,
};
use crate::config::{ConfigLoader, KeeperConfig};
use crate::emergency::EmergencyWriter;
use crate::error::{ApiError, StorageError};
use crate::recovery::{CrashMarker, RecoveryTarget};
use crate::status::{build_store_status, format_store_status_text};
use crate::store::{SledSnapshotStore, SnapshotStore};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

fn parse_format(format: &str) -> Result<Format, ApiError> {
    match format {
        "text" => Ok(Format::Text),
        "json" => Ok(Format::Json),
        other => Err(ApiError::InvalidArgument(format!(
            "Unknown format '{}' (expected text or json)",
            other
        ))),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Serialization(e.to_string())))
}

/// Runtime context for CLI execution: workspace and loaded configuration.
/// The store is opened per command so inspection never arms the crash marker.
pub struct RunContext {
    workspace_root: PathBuf,
    config: KeeperConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let mut loader = ConfigLoader::new(&workspace_root);
        if let Some(path) = config_path {
            loader = loader.explicit_file(path);
        }
        let config = loader.load()?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    /// Run context over an already-built configuration.
    pub fn with_config(workspace_root: PathBuf, config: KeeperConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    fn open_store(&self) -> Result<SledSnapshotStore, ApiError> {
        Ok(SledSnapshotStore::open(&self.config.storage.store_path)?)
    }

    fn emergency(&self) -> EmergencyWriter {
        EmergencyWriter::new(&self.config.storage.emergency_dir)
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Status { format } => self.handle_status(parse_format(format)?),
            Commands::Snapshots {
                recovery_points,
                limit,
                format,
            } => self.handle_snapshots(*recovery_points, *limit, parse_format(format)?),
            Commands::Decisions { limit, format } => {
                let rows = self.open_store()?.query_decisions(None, Some(*limit))?;
                Ok(match parse_format(format)? {
                    Format::Text => format_decisions_text(&rows),
                    Format::Json => format_decisions_json(&rows),
                })
            }
            Commands::Messages { limit, format } => {
                let rows = self.open_store()?.query_messages(Some(*limit))?;
                Ok(match parse_format(format)? {
                    Format::Text => format_messages_text(&rows),
                    Format::Json => format_messages_json(&rows),
                })
            }
            Commands::Tasks { task_id, format } => {
                let rows = self.open_store()?.query_task_history(task_id)?;
                Ok(match parse_format(format)? {
                    Format::Text => format_task_history_text(task_id, &rows),
                    Format::Json => format_task_history_json(task_id, &rows),
                })
            }
            Commands::Recover {
                recovery_point,
                snapshot,
                format,
            } => {
                let target = match (snapshot, recovery_point) {
                    (Some(id), _) => Some(RecoveryTarget::Snapshot(*id)),
                    (None, true) => Some(RecoveryTarget::LatestRecoveryPoint),
                    (None, false) => None,
                };
                self.handle_recover(target, parse_format(format)?)
            }
            Commands::Prune {
                older_than_hours,
                include_recovery_points,
            } => self.handle_prune(*older_than_hours, *include_recovery_points),
            Commands::Emergency { format } => self.handle_emergency(parse_format(format)?),
            Commands::Config => self.config.to_toml(),
        }
    }

    fn handle_status(&self, format: Format) -> Result<String, ApiError> {
        let marker = CrashMarker::new(&self.config.storage.marker_path);
        let emergency = self.emergency();
        let store_path = self.config.storage.store_path.clone();
        // A locked or missing store is part of the status, not a command failure.
        let status = match self.open_store() {
            Ok(store) => build_store_status(&store, store_path, &marker, &emergency)?,
            Err(ApiError::StorageError(e)) => build_store_status(
                &crate::store::UnavailableStore::new(e.to_string()),
                store_path,
                &marker,
                &emergency,
            )?,
            Err(e) => return Err(e),
        };
        match format {
            Format::Text => Ok(format_store_status_text(&status)),
            Format::Json => to_json(&status),
        }
    }

    fn handle_snapshots(
        &self,
        recovery_points: bool,
        limit: usize,
        format: Format,
    ) -> Result<String, ApiError> {
        let store = self.open_store()?;
        let entries: Vec<SnapshotEntry> = if recovery_points {
            store
                .query_recovery_points()?
                .iter()
                .take(limit)
                .map(SnapshotEntry::from)
                .collect()
        } else {
            store
                .snapshot_ids()?
                .into_iter()
                .take(limit)
                .filter_map(|id| match store.get_snapshot(id) {
                    Ok(Some(snapshot)) => Some(SnapshotEntry::from(&snapshot)),
                    Ok(None) => None,
                    Err(e) => Some(SnapshotEntry::unreadable(id, e.to_string())),
                })
                .collect()
        };
        Ok(match format {
            Format::Text => format_snapshots_text(&entries),
            Format::Json => format_snapshots_json(&entries),
        })
    }

    /// Open a keeper (running crash recovery if the marker is present), restore the
    /// requested target, and shut down cleanly so the restored context becomes the
    /// newest snapshot.
    fn handle_recover(
        &self,
        target: Option<RecoveryTarget>,
        format: Format,
    ) -> Result<String, ApiError> {
        let store: Arc<dyn SnapshotStore> = Arc::new(self.open_store()?);
        let mut config = self.config.clone();
        config.checkpoint.auto_start = false;
        let keeper = ContextKeeper::with_store(config, store)?;

        let startup = keeper.startup_report().cloned();
        let report = match (target, startup) {
            (None, Some(report)) => report,
            (target, startup) => {
                if let Some(startup) = startup {
                    info!(summary = %startup.summary(), "Crash recovery ran at open");
                }
                keeper.restore_context(target.unwrap_or_default())
            }
        };
        let summary = keeper.shutdown();

        match format {
            Format::Text => Ok(format!(
                "{}\n\nFinal save: {}{}",
                format_recovery_report_text(&report),
                summary.final_save,
                summary
                    .marker_error
                    .map(|e| format!("\nWarning: {}", e))
                    .unwrap_or_default()
            )),
            Format::Json => Ok(format_recovery_report_json(&report)),
        }
    }

    fn handle_prune(
        &self,
        older_than_hours: u64,
        include_recovery_points: bool,
    ) -> Result<String, ApiError> {
        let hours = i64::try_from(older_than_hours)
            .map_err(|_| ApiError::InvalidArgument("--older-than-hours is too large".to_string()))?;
        let cutoff = Utc::now() - chrono::Duration::hours(hours);
        let store = self.open_store()?;
        let removed = store.delete_older_than(cutoff, !include_recovery_points)?;
        store.flush()?;
        info!(removed, cutoff = %cutoff.to_rfc3339(), "Pruned snapshot store");
        Ok(format!(
            "Removed {} record(s) older than {}{}",
            removed,
            cutoff.to_rfc3339(),
            if include_recovery_points {
                " (including recovery points)"
            } else {
                ""
            }
        ))
    }

    fn handle_emergency(&self, format: Format) -> Result<String, ApiError> {
        let writer = self.emergency();
        let entries: Vec<EmergencyEntry> = writer
            .list()?
            .into_iter()
            .map(|path| match writer.read(&path) {
                Ok(record) => EmergencyEntry {
                    path,
                    saved_at: Some(record.saved_at),
                    reason: Some(record.reason),
                    error: None,
                },
                Err(e) => EmergencyEntry {
                    path,
                    saved_at: None,
                    reason: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        Ok(match format {
            Format::Text => format_emergency_text(&entries),
            Format::Json => format_emergency_json(&entries),
        })
    }
}
