//! Recovery report payload.

use crate::checkpoint::CheckpointInfo;
use crate::context::TaskStatus;
use crate::types::SnapshotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which snapshot recovery should restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecoveryTarget {
    /// Newest readable snapshot of any kind.
    Latest,
    /// Newest readable recovery point.
    LatestRecoveryPoint,
    /// One specific snapshot.
    Snapshot(SnapshotId),
}

impl Default for RecoveryTarget {
    fn default() -> Self {
        RecoveryTarget::Latest
    }
}

/// Where the restored context came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoverySource {
    Snapshot {
        snapshot_id: SnapshotId,
        timestamp: DateTime<Utc>,
        is_recovery_point: bool,
        recovery_reason: Option<String>,
    },
    EmergencyFile {
        path: PathBuf,
        saved_at: DateTime<Utc>,
    },
    Empty,
}

/// A task that was not finished when the context was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTask {
    pub task_id: String,
    pub status: TaskStatus,
    pub percentage: u8,
}

/// Outcome of one recovery run, for operators and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// True only when a stored snapshot was restored.
    pub recovered: bool,
    /// Why recovery was degraded or empty.
    pub reason: Option<String>,
    pub target: RecoveryTarget,
    pub source: RecoverySource,
    /// Snapshots passed over because they could not be read back.
    pub skipped_corrupt: Vec<SnapshotId>,
    pub latest_recovery_point: Option<CheckpointInfo>,
    pub open_tasks: Vec<OpenTask>,
    /// Agents whose last update is older than the staleness window; they need a ping.
    pub stale_agents: Vec<String>,
    /// Durable decisions logged after the restored snapshot and merged back in.
    pub replayed_decisions: usize,
    pub recovered_at: DateTime<Utc>,
}

impl RecoveryReport {
    pub fn snapshot_id(&self) -> Option<SnapshotId> {
        match &self.source {
            RecoverySource::Snapshot { snapshot_id, .. } => Some(*snapshot_id),
            _ => None,
        }
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        let source = match &self.source {
            RecoverySource::Snapshot { snapshot_id, .. } => format!("snapshot {}", snapshot_id),
            RecoverySource::EmergencyFile { path, .. } => format!("emergency file {}", path.display()),
            RecoverySource::Empty => "empty context".to_string(),
        };
        match &self.reason {
            Some(reason) => format!(
                "recovered={} from {} ({}); {} open tasks, {} stale agents",
                self.recovered,
                source,
                reason,
                self.open_tasks.len(),
                self.stale_agents.len()
            ),
            None => format!(
                "recovered={} from {}; {} open tasks, {} stale agents",
                self.recovered,
                source,
                self.open_tasks.len(),
                self.stale_agents.len()
            ),
        }
    }
}
