//! Deduplicating Persister
//!
//! Decides whether the current context differs from the last persisted snapshot and,
//! if so, writes a new one. Store failures divert the context to the emergency
//! writer; `save` itself never fails.

use crate::checkpoint::hasher::canonical_form;
use crate::context::ActiveContext;
use crate::emergency::EmergencyWriter;
use crate::store::{NewSnapshot, Snapshot, SnapshotStore, TaskProgressEntry};
use crate::types::{ContentHash, SnapshotId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What kind of save is being requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveRequest {
    pub is_recovery_point: bool,
    pub recovery_reason: Option<String>,
}

impl SaveRequest {
    /// Ordinary checkpoint, subject to deduplication.
    pub fn checkpoint() -> Self {
        Self::default()
    }

    /// Recovery point; always written.
    pub fn recovery_point(reason: impl Into<String>) -> Self {
        Self {
            is_recovery_point: true,
            recovery_reason: Some(reason.into()),
        }
    }
}

/// Metadata of the last snapshot this persister wrote or adopted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub snapshot_id: SnapshotId,
    pub timestamp: DateTime<Utc>,
    pub content_hash: ContentHash,
    pub is_recovery_point: bool,
    pub recovery_reason: Option<String>,
}

impl From<&Snapshot> for CheckpointInfo {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            snapshot_id: snapshot.id,
            timestamp: snapshot.timestamp,
            content_hash: snapshot.content_hash,
            is_recovery_point: snapshot.is_recovery_point,
            recovery_reason: snapshot.recovery_reason.clone(),
        }
    }
}

/// Result of one save attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// A new snapshot was committed.
    Persisted(CheckpointInfo),
    /// Content matched the last snapshot; nothing written.
    Skipped,
    /// The store failed; the context went to an emergency file.
    Fallback(PathBuf),
    /// Both the store and the emergency writer failed.
    Failed(String),
}

impl SaveOutcome {
    /// True only when a snapshot reached the store.
    pub fn persisted(&self) -> bool {
        matches!(self, SaveOutcome::Persisted(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SaveOutcome::Persisted(_) => "persisted",
            SaveOutcome::Skipped => "skipped",
            SaveOutcome::Fallback(_) => "fallback",
            SaveOutcome::Failed(_) => "failed",
        }
    }
}

/// Persistence counters exposed through the status payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceStats {
    pub snapshots_written: u64,
    pub saves_skipped: u64,
    pub fallback_writes: u64,
    pub failures: u64,
    /// True while the most recent save did not reach the store.
    pub degraded: bool,
    pub last_error: Option<String>,
    pub last_fallback_file: Option<PathBuf>,
}

struct PersisterState {
    last_hash: Option<ContentHash>,
    last_checkpoint: Option<CheckpointInfo>,
    stats: PersistenceStats,
}

/// Writes snapshots only when the context changed.
pub struct DedupPersister {
    store: Arc<dyn SnapshotStore>,
    fallback: EmergencyWriter,
    session_id: String,
    state: Mutex<PersisterState>,
}

impl DedupPersister {
    /// Create a persister, seeding the last-seen hash from the newest stored snapshot
    /// so an unchanged context is not written again after a restart.
    pub fn new(store: Arc<dyn SnapshotStore>, fallback: EmergencyWriter, session_id: String) -> Self {
        let last_checkpoint = match store.query_latest_snapshot() {
            Ok(latest) => latest.as_ref().map(CheckpointInfo::from),
            Err(e) => {
                warn!(error = %e, "Could not read latest snapshot; deduplication starts empty");
                None
            }
        };
        let state = PersisterState {
            last_hash: last_checkpoint.as_ref().map(|c| c.content_hash),
            last_checkpoint,
            stats: PersistenceStats::default(),
        };
        Self {
            store,
            fallback,
            session_id,
            state: Mutex::new(state),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub fn fallback(&self) -> &EmergencyWriter {
        &self.fallback
    }

    pub fn last_checkpoint(&self) -> Option<CheckpointInfo> {
        self.state.lock().last_checkpoint.clone()
    }

    pub fn stats(&self) -> PersistenceStats {
        self.state.lock().stats.clone()
    }

    /// Persist `context` unless it is unchanged and `request` is not a recovery point.
    pub fn save(&self, context: &ActiveContext, request: SaveRequest) -> SaveOutcome {
        let mut state = self.state.lock();
        self.save_locked(&mut state, context, Utc::now(), request)
    }

    /// Like [`save`](Self::save), but the context is captured by `capture` while the
    /// state lock is held.
    ///
    /// Saves are serialized: a copy taken by one caller can never be committed after
    /// a newer copy committed by another. `capture` returns the context together with
    /// the instant it was taken; that instant becomes the snapshot timestamp.
    pub fn save_captured<F>(&self, request: SaveRequest, capture: F) -> SaveOutcome
    where
        F: FnOnce() -> (ActiveContext, DateTime<Utc>),
    {
        let mut state = self.state.lock();
        let (context, captured_at) = capture();
        self.save_locked(&mut state, &context, captured_at, request)
    }

    fn save_locked(
        &self,
        state: &mut PersisterState,
        context: &ActiveContext,
        timestamp: DateTime<Utc>,
        request: SaveRequest,
    ) -> SaveOutcome {
        let (payload, hash) = match canonical_form(context) {
            Ok(form) => form,
            Err(e) => {
                error!(error = %e, "Failed to serialize context");
                state.stats.failures += 1;
                state.stats.last_error = Some(e.to_string());
                return SaveOutcome::Failed(e.to_string());
            }
        };

        if !request.is_recovery_point && state.last_hash == Some(hash) {
            state.stats.saves_skipped += 1;
            debug!(content_hash = %hash.short(), "Context unchanged; skipping snapshot");
            return SaveOutcome::Skipped;
        }

        let snapshot = NewSnapshot {
            session_id: self.session_id.clone(),
            timestamp,
            content_hash: hash,
            payload,
            is_recovery_point: request.is_recovery_point,
            recovery_reason: request.recovery_reason.clone(),
            tasks: context
                .task_progress
                .iter()
                .map(|(task_id, task)| TaskProgressEntry {
                    task_id: task_id.clone(),
                    status: task.status,
                    percentage: task.percentage,
                })
                .collect(),
        };

        let written = self
            .store
            .insert_snapshot(snapshot)
            .and_then(|id| self.store.flush().map(|_| id));

        match written {
            Ok(snapshot_id) => {
                let info = CheckpointInfo {
                    snapshot_id,
                    timestamp,
                    content_hash: hash,
                    is_recovery_point: request.is_recovery_point,
                    recovery_reason: request.recovery_reason,
                };
                if info.is_recovery_point {
                    info!(
                        snapshot_id,
                        reason = info.recovery_reason.as_deref().unwrap_or(""),
                        "Recovery point saved"
                    );
                } else {
                    debug!(snapshot_id, content_hash = %hash.short(), "Snapshot saved");
                }
                state.last_hash = Some(hash);
                state.last_checkpoint = Some(info.clone());
                state.stats.snapshots_written += 1;
                state.stats.degraded = false;
                SaveOutcome::Persisted(info)
            }
            Err(store_err) => {
                warn!(error = %store_err, "Snapshot store write failed; using emergency fallback");
                state.stats.degraded = true;
                state.stats.last_error = Some(store_err.to_string());
                let reason = format!("snapshot store write failed: {}", store_err);
                match self.fallback.emergency_save(context, &reason) {
                    Ok(path) => {
                        state.stats.fallback_writes += 1;
                        state.stats.last_fallback_file = Some(path.clone());
                        SaveOutcome::Fallback(path)
                    }
                    Err(fallback_err) => {
                        error!(
                            store_error = %store_err,
                            fallback_error = %fallback_err,
                            "Emergency fallback write failed; context not persisted"
                        );
                        state.stats.failures += 1;
                        let message = format!(
                            "store: {}; emergency fallback: {}",
                            store_err, fallback_err
                        );
                        state.stats.last_error = Some(message.clone());
                        SaveOutcome::Failed(message)
                    }
                }
            }
        }
    }
}
