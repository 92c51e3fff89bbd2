//! Status payloads.
//!
//! [`ContextStatus`] is the live health payload returned by
//! `ContextKeeper::get_context_status`. [`StoreStatus`] is built offline from the
//! store, marker and emergency directory for `keeper status`. Both serialize to
//! JSON for external dashboards.

use crate::checkpoint::{CheckpointInfo, PersistenceStats};
use crate::context::ActiveContext;
use crate::emergency::EmergencyWriter;
use crate::error::ApiError;
use crate::recovery::{CrashMarker, RecoveryState};
use crate::store::SnapshotStore;
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Summary counts for external health reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextStatus {
    pub session_id: String,
    /// Agents updated within the staleness window.
    pub active_agent_count: usize,
    pub stale_agent_count: usize,
    pub open_task_count: usize,
    pub task_count: usize,
    pub decision_count: usize,
    pub conversation_entries: usize,
    pub workflow_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checkpoint_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checkpoint: Option<CheckpointInfo>,
    pub scheduler_running: bool,
    pub checkpoint_interval_secs: u64,
    pub marker_armed: bool,
    pub persistence: PersistenceStats,
}

impl ContextStatus {
    /// Counts derived from `context`; persistence fields are filled by the caller.
    pub(crate) fn from_context(
        context: &ActiveContext,
        now: DateTime<Utc>,
        staleness: chrono::Duration,
    ) -> Self {
        let stale_agent_count = context.stale_agents(now, staleness).len();
        Self {
            session_id: String::new(),
            active_agent_count: context.agent_states.len() - stale_agent_count,
            stale_agent_count,
            open_task_count: context.open_tasks().count(),
            task_count: context.task_progress.len(),
            decision_count: context.decision_log.len(),
            conversation_entries: context.conversation_history.len(),
            workflow_state: context.workflow_state.label().to_string(),
            last_checkpoint_at: None,
            last_checkpoint: None,
            scheduler_running: false,
            checkpoint_interval_secs: 0,
            marker_armed: false,
            persistence: PersistenceStats::default(),
        }
    }
}

/// Offline view of a keeper directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub store_path: PathBuf,
    pub store_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
    pub marker_path: PathBuf,
    pub marker_state: RecoveryState,
    pub snapshot_count: usize,
    pub recovery_point_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_snapshot: Option<CheckpointInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_recovery_point: Option<CheckpointInfo>,
    pub emergency_dir: PathBuf,
    pub emergency_file_count: usize,
}

/// Build the offline status. Store read failures are reported in the payload.
pub fn build_store_status(
    store: &dyn SnapshotStore,
    store_path: PathBuf,
    marker: &CrashMarker,
    emergency: &EmergencyWriter,
) -> Result<StoreStatus, ApiError> {
    let emergency_file_count = emergency.list()?.len();
    let mut status = StoreStatus {
        store_path,
        store_available: true,
        store_error: None,
        marker_path: marker.path().to_path_buf(),
        marker_state: marker.detect(),
        snapshot_count: 0,
        recovery_point_count: 0,
        latest_snapshot: None,
        latest_recovery_point: None,
        emergency_dir: emergency.dir().to_path_buf(),
        emergency_file_count,
    };

    let read = store.snapshot_ids().and_then(|ids| {
        let latest = store.query_latest_snapshot()?;
        let points = store.query_recovery_points()?;
        Ok((ids.len(), latest, points))
    });
    match read {
        Ok((count, latest, points)) => {
            status.snapshot_count = count;
            status.recovery_point_count = points.len();
            status.latest_snapshot = latest.as_ref().map(CheckpointInfo::from);
            status.latest_recovery_point = points.first().map(CheckpointInfo::from);
        }
        Err(e) => {
            status.store_available = false;
            status.store_error = Some(e.to_string());
        }
    }
    Ok(status)
}

fn checkpoint_cell(info: &Option<CheckpointInfo>) -> String {
    match info {
        Some(info) => format!(
            "#{} at {}{}",
            info.snapshot_id,
            info.timestamp.to_rfc3339(),
            info.recovery_reason
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        ),
        None => "-".to_string(),
    }
}

/// Format the offline status as a two-column table.
pub fn format_store_status_text(status: &StoreStatus) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Property", "Value"]);
    table.add_row(vec!["Store".to_string(), status.store_path.display().to_string()]);
    let availability = match &status.store_error {
        Some(e) => format!("unavailable ({})", e),
        None => "available".to_string(),
    };
    table.add_row(vec!["Store state".to_string(), availability]);
    let marker = match status.marker_state {
        RecoveryState::Clean => "absent (clean)",
        RecoveryState::Recovering => "present (running or crashed)",
    };
    table.add_row(vec!["Crash marker".to_string(), marker.to_string()]);
    table.add_row(vec!["Snapshots".to_string(), status.snapshot_count.to_string()]);
    table.add_row(vec![
        "Recovery points".to_string(),
        status.recovery_point_count.to_string(),
    ]);
    table.add_row(vec!["Latest snapshot".to_string(), checkpoint_cell(&status.latest_snapshot)]);
    table.add_row(vec![
        "Latest recovery point".to_string(),
        checkpoint_cell(&status.latest_recovery_point),
    ]);
    table.add_row(vec![
        "Emergency files".to_string(),
        status.emergency_file_count.to_string(),
    ]);
    table.to_string()
}

/// Format the live status as a two-column table.
pub fn format_context_status_text(status: &ContextStatus) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Property", "Value"]);
    table.add_row(vec!["Session".to_string(), status.session_id.clone()]);
    table.add_row(vec!["Workflow".to_string(), status.workflow_state.clone()]);
    table.add_row(vec![
        "Agents (active/stale)".to_string(),
        format!("{}/{}", status.active_agent_count, status.stale_agent_count),
    ]);
    table.add_row(vec![
        "Tasks (open/total)".to_string(),
        format!("{}/{}", status.open_task_count, status.task_count),
    ]);
    table.add_row(vec!["Decisions".to_string(), status.decision_count.to_string()]);
    table.add_row(vec!["Last checkpoint".to_string(), checkpoint_cell(&status.last_checkpoint)]);
    table.add_row(vec![
        "Snapshots written".to_string(),
        status.persistence.snapshots_written.to_string(),
    ]);
    if status.persistence.degraded {
        table.add_row(vec![
            "Degraded".to_string(),
            status.persistence.last_error.clone().unwrap_or_default(),
        ]);
    }
    table.to_string()
}
