//! Recovery Coordinator
//!
//! Restores the active context after a crash (or on operator request). Recovery
//! always terminates: a readable snapshot, else the newest emergency file when the
//! store itself is unreadable, else an empty context.

use crate::checkpoint::hasher::verify_payload;
use crate::checkpoint::CheckpointInfo;
use crate::context::{ActiveContext, DecisionEntry};
use crate::emergency::EmergencyWriter;
use crate::error::StorageError;
use crate::recovery::marker::{CrashMarker, RecoveryState};
use crate::recovery::report::{OpenTask, RecoveryReport, RecoverySource, RecoveryTarget};
use crate::store::{Snapshot, SnapshotStore};
use crate::types::SnapshotId;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A restored context and the report describing how it was obtained.
#[derive(Debug, Clone)]
pub struct Recovery {
    pub context: ActiveContext,
    pub report: RecoveryReport,
}

/// Result of startup crash detection.
#[derive(Debug, Clone)]
pub struct Startup {
    pub previous: RecoveryState,
    pub recovery: Option<Recovery>,
    /// False when the marker could not be written; crashes of this process
    /// would then go undetected.
    pub marker_armed: bool,
}

pub struct RecoveryCoordinator {
    store: Arc<dyn SnapshotStore>,
    emergency: EmergencyWriter,
    staleness: chrono::Duration,
}

impl RecoveryCoordinator {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        emergency: EmergencyWriter,
        staleness: chrono::Duration,
    ) -> Self {
        Self {
            store,
            emergency,
            staleness,
        }
    }

    /// Inspect the marker, recover if the previous process crashed, then arm the
    /// marker for this process.
    pub fn startup(&self, marker: &CrashMarker, target: RecoveryTarget) -> Startup {
        let previous = marker.detect();
        let recovery = match previous {
            RecoveryState::Clean => None,
            RecoveryState::Recovering => {
                warn!(
                    marker = %marker.path().display(),
                    "Crash marker present; previous process did not shut down cleanly"
                );
                let recovery = self.recover(target);
                if let Err(e) = marker.clear() {
                    error!(error = %e, "Failed to clear crash marker after recovery");
                }
                info!(summary = %recovery.report.summary(), "Crash recovery finished");
                Some(recovery)
            }
        };

        let marker_armed = match marker.arm() {
            Ok(()) => true,
            Err(e) => {
                error!(
                    marker = %marker.path().display(),
                    error = %e,
                    "Failed to arm crash marker; crashes of this process will not be detected"
                );
                false
            }
        };

        Startup {
            previous,
            recovery,
            marker_armed,
        }
    }

    /// Rebuild a context from the store according to `target`.
    pub fn recover(&self, target: RecoveryTarget) -> Recovery {
        let candidates = match self.candidates(target) {
            Ok(ids) => ids,
            Err(e) => return self.degraded(target, e, Vec::new()),
        };

        let mut skipped = Vec::new();
        for id in candidates {
            match self.load(id) {
                Ok(Some((snapshot, context))) => {
                    return self.restored(target, snapshot, context, skipped);
                }
                Ok(None) => {}
                Err(StorageError::CorruptSnapshot { id, reason }) => {
                    warn!(snapshot_id = id, %reason, "Skipping corrupt snapshot");
                    skipped.push(id);
                }
                Err(e) => return self.degraded(target, e, skipped),
            }
        }

        let reason = if skipped.is_empty() {
            match target {
                RecoveryTarget::Snapshot(id) => format!("snapshot {} not found", id),
                _ => "no snapshot available".to_string(),
            }
        } else {
            format!("no readable snapshot ({} corrupt)", skipped.len())
        };
        self.finish(
            target,
            ActiveContext::new(),
            RecoverySource::Empty,
            false,
            Some(reason),
            skipped,
            0,
        )
    }

    fn candidates(&self, target: RecoveryTarget) -> Result<Vec<SnapshotId>, StorageError> {
        match target {
            RecoveryTarget::Latest => self.store.snapshot_ids(),
            RecoveryTarget::LatestRecoveryPoint => Ok(self
                .store
                .query_recovery_points()?
                .into_iter()
                .map(|s| s.id)
                .collect()),
            RecoveryTarget::Snapshot(id) => Ok(vec![id]),
        }
    }

    /// Load one snapshot and decode its payload, verifying the recorded hash.
    fn load(&self, id: SnapshotId) -> Result<Option<(Snapshot, ActiveContext)>, StorageError> {
        let Some(snapshot) = self.store.get_snapshot(id)? else {
            return Ok(None);
        };
        if !verify_payload(&snapshot.payload, &snapshot.content_hash) {
            return Err(StorageError::CorruptSnapshot {
                id,
                reason: "payload does not match content hash".to_string(),
            });
        }
        let context = ActiveContext::from_json(&snapshot.payload).map_err(|e| {
            StorageError::CorruptSnapshot {
                id,
                reason: format!("payload does not deserialize: {}", e),
            }
        })?;
        Ok(Some((snapshot, context)))
    }

    fn restored(
        &self,
        target: RecoveryTarget,
        snapshot: Snapshot,
        mut context: ActiveContext,
        skipped: Vec<SnapshotId>,
    ) -> Recovery {
        let replayed = self.replay_decisions(&mut context, &snapshot);
        let source = RecoverySource::Snapshot {
            snapshot_id: snapshot.id,
            timestamp: snapshot.timestamp,
            is_recovery_point: snapshot.is_recovery_point,
            recovery_reason: snapshot.recovery_reason.clone(),
        };
        self.finish(target, context, source, true, None, skipped, replayed)
    }

    /// Store unreadable: newest emergency file, else empty.
    fn degraded(
        &self,
        target: RecoveryTarget,
        cause: StorageError,
        skipped: Vec<SnapshotId>,
    ) -> Recovery {
        warn!(error = %cause, "Snapshot store unreadable during recovery; trying emergency files");
        match self.emergency.latest() {
            Ok(Some((path, record))) => {
                let reason = format!(
                    "snapshot store unreadable ({}); restored emergency file",
                    cause
                );
                let source = RecoverySource::EmergencyFile {
                    path,
                    saved_at: record.saved_at,
                };
                self.finish(target, record.context, source, false, Some(reason), skipped, 0)
            }
            Ok(None) => self.finish(
                target,
                ActiveContext::new(),
                RecoverySource::Empty,
                false,
                Some(format!("snapshot store unreadable ({}); no emergency file", cause)),
                skipped,
                0,
            ),
            Err(emergency_err) => self.finish(
                target,
                ActiveContext::new(),
                RecoverySource::Empty,
                false,
                Some(format!(
                    "snapshot store unreadable ({}); emergency files unreadable ({})",
                    cause, emergency_err
                )),
                skipped,
                0,
            ),
        }
    }

    /// Merge durable decisions logged after `snapshot` into the restored log.
    ///
    /// A row counts as later when it was committed after the snapshot (row ids come
    /// from the same increasing sequence) or stamped at or after the snapshot's
    /// capture instant. Rows already in the restored log are skipped.
    fn replay_decisions(&self, context: &mut ActiveContext, snapshot: &Snapshot) -> usize {
        let rows = match self.store.query_decisions(None, None) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Could not read decision log for replay");
                return 0;
            }
        };
        let mut replayed = 0;
        for row in rows {
            if row.id <= snapshot.id && row.timestamp < snapshot.timestamp {
                continue;
            }
            let entry = DecisionEntry {
                decision_type: row.decision_type,
                context: row.context,
                decision: row.decision,
                reasoning: row.reasoning,
                outcome: row.outcome,
                timestamp: row.timestamp,
            };
            if !context.decision_log.contains(&entry) {
                context.push_decision(entry);
                replayed += 1;
            }
        }
        replayed
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        target: RecoveryTarget,
        context: ActiveContext,
        source: RecoverySource,
        recovered: bool,
        reason: Option<String>,
        skipped_corrupt: Vec<SnapshotId>,
        replayed_decisions: usize,
    ) -> Recovery {
        let now = Utc::now();
        let latest_recovery_point = match self.store.query_recovery_points() {
            Ok(points) => points.first().map(CheckpointInfo::from),
            Err(_) => None,
        };
        let open_tasks = context
            .open_tasks()
            .map(|(task_id, task)| OpenTask {
                task_id: task_id.clone(),
                status: task.status,
                percentage: task.percentage,
            })
            .collect();
        let stale_agents = context.stale_agents(now, self.staleness);

        let report = RecoveryReport {
            recovered,
            reason,
            target,
            source,
            skipped_corrupt,
            latest_recovery_point,
            open_tasks,
            stale_agents,
            replayed_decisions,
            recovered_at: now,
        };
        Recovery { context, report }
    }
}
