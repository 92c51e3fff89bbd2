//! Persistence layer for the Snapshot Store

use crate::error::StorageError;
use crate::store::{
    AgentCoordinationRow, CommitReceipt, DecisionLogRow, Snapshot, SnapshotStore,
    TaskProgressRow, WriteUnit,
};
use crate::types::SnapshotId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{TransactionError, TransactionResult, Transactional};
use sled::{Db, Tree};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TREE_SNAPSHOTS: &str = "snapshots";
const TREE_TASKS: &str = "task_progress";
const TREE_DECISIONS: &str = "decisions";
const TREE_COORDINATION: &str = "coordination";
const SNAPSHOT_KEY_PAD: usize = 20;

/// Sled-based implementation of SnapshotStore
///
/// One sled database, one tree per table. Snapshot, decision and coordination rows
/// are keyed by big-endian ids so key order is insertion order; task rows are keyed
/// `task_id:snapshot_id` for prefix scans.
#[derive(Clone)]
pub struct SledSnapshotStore {
    path: PathBuf,
    db: Db,
    snapshots: Tree,
    tasks: Tree,
    decisions: Tree,
    coordination: Tree,
}

impl SledSnapshotStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path).map_err(|e| {
            StorageError::Unavailable(format!(
                "Failed to create store directory {:?}: {}",
                path, e
            ))
        })?;
        let db = sled::open(&path).map_err(|e| {
            StorageError::Unavailable(format!("Failed to open sled database at {:?}: {}", path, e))
        })?;
        let store = Self::from_db(path, db)?;
        debug!(path = %store.path.display(), "Opened snapshot store");
        Ok(store)
    }

    fn from_db(path: PathBuf, db: Db) -> Result<Self, StorageError> {
        let snapshots = db.open_tree(TREE_SNAPSHOTS)?;
        let tasks = db.open_tree(TREE_TASKS)?;
        let decisions = db.open_tree(TREE_DECISIONS)?;
        let coordination = db.open_tree(TREE_COORDINATION)?;
        Ok(Self {
            path,
            db,
            snapshots,
            tasks,
            decisions,
            coordination,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Overwrite the raw bytes of a snapshot row. Used to exercise corruption handling.
    pub fn put_raw_snapshot(&self, id: SnapshotId, bytes: &[u8]) -> Result<(), StorageError> {
        self.snapshots.insert(id_key(id), bytes)?;
        Ok(())
    }

    pub fn encode_task_key(task_id: &str, snapshot_id: SnapshotId) -> String {
        encode_task_key(task_id, snapshot_id)
    }

    fn next_id(&self) -> Result<u64, StorageError> {
        Ok(self.db.generate_id()?)
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn initialize(&self) -> Result<(), StorageError> {
        for name in [TREE_SNAPSHOTS, TREE_TASKS, TREE_DECISIONS, TREE_COORDINATION] {
            self.db.open_tree(name)?;
        }
        Ok(())
    }

    fn commit(&self, unit: WriteUnit) -> Result<CommitReceipt, StorageError> {
        if unit.is_empty() {
            return Ok(CommitReceipt::default());
        }

        // Ids and encodings are prepared up front; the transaction closure may rerun.
        let mut receipt = CommitReceipt::default();
        let mut snapshot_rows: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut task_rows: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut decision_rows: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut message_rows: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();

        if let Some(new) = unit.snapshot {
            let id = self.next_id()?;
            for task in &new.tasks {
                let row = TaskProgressRow {
                    snapshot_id: id,
                    task_id: task.task_id.clone(),
                    status: task.status,
                    percentage: task.percentage,
                    timestamp: new.timestamp,
                };
                task_rows.push((
                    encode_task_key(&task.task_id, id).into_bytes(),
                    encode(&row)?,
                ));
            }
            let snapshot = Snapshot {
                id,
                session_id: new.session_id,
                timestamp: new.timestamp,
                content_hash: new.content_hash,
                payload: new.payload,
                is_recovery_point: new.is_recovery_point,
                recovery_reason: new.recovery_reason,
            };
            snapshot_rows.push((id_key(id).to_vec(), encode(&snapshot)?));
            receipt.snapshot_id = Some(id);
        }

        for new in unit.decisions {
            let id = self.next_id()?;
            let row = DecisionLogRow {
                id,
                session_id: new.session_id,
                decision_type: new.decision_type,
                context: new.context,
                decision: new.decision,
                reasoning: new.reasoning,
                outcome: new.outcome,
                timestamp: new.timestamp,
            };
            decision_rows.push((id_key(id).to_vec(), encode(&row)?));
            receipt.decision_ids.push(id);
        }

        for new in unit.messages {
            let id = self.next_id()?;
            let row = AgentCoordinationRow {
                id,
                session_id: new.session_id,
                from_agent: new.from_agent,
                to_agent: new.to_agent,
                message_type: new.message_type,
                content: new.content,
                response: new.response,
                timestamp: new.timestamp,
            };
            message_rows.push((id_key(id).to_vec(), encode(&row)?));
            receipt.message_ids.push(id);
        }

        let result: TransactionResult<(), StorageError> = (
            &self.snapshots,
            &self.tasks,
            &self.decisions,
            &self.coordination,
        )
            .transaction(|(snapshots, tasks, decisions, coordination)| {
                for (key, value) in &snapshot_rows {
                    snapshots.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &task_rows {
                    tasks.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &decision_rows {
                    decisions.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &message_rows {
                    coordination.insert(key.as_slice(), value.as_slice())?;
                }
                Ok(())
            });
        result.map_err(to_storage_tx)?;

        Ok(receipt)
    }

    fn get_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>, StorageError> {
        let Some(raw) = self.snapshots.get(id_key(id))? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_slice(&raw).map_err(|e| StorageError::CorruptSnapshot {
            id,
            reason: format!("undecodable row: {}", e),
        })?;
        Ok(Some(snapshot))
    }

    fn snapshot_ids(&self) -> Result<Vec<SnapshotId>, StorageError> {
        let mut ids = Vec::new();
        for key in self.snapshots.iter().keys().rev() {
            let key = key?;
            match decode_id(&key) {
                Some(id) => ids.push(id),
                None => warn!(key_len = key.len(), "Skipping malformed snapshot key"),
            }
        }
        Ok(ids)
    }

    fn query_recovery_points(&self) -> Result<Vec<Snapshot>, StorageError> {
        let mut out = Vec::new();
        for id in self.snapshot_ids()? {
            match self.get_snapshot(id) {
                Ok(Some(snapshot)) if snapshot.is_recovery_point => out.push(snapshot),
                Ok(_) => {}
                Err(StorageError::CorruptSnapshot { id, reason }) => {
                    warn!(snapshot_id = id, %reason, "Skipping corrupt snapshot row");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn query_decisions(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<DecisionLogRow>, StorageError> {
        let mut rows: Vec<DecisionLogRow> = read_all(&self.decisions)?;
        if let Some(since) = since {
            rows.retain(|row| row.timestamp > since);
        }
        Ok(keep_newest(rows, limit))
    }

    fn query_messages(&self, limit: Option<usize>) -> Result<Vec<AgentCoordinationRow>, StorageError> {
        let rows: Vec<AgentCoordinationRow> = read_all(&self.coordination)?;
        Ok(keep_newest(rows, limit))
    }

    fn query_task_history(&self, task_id: &str) -> Result<Vec<TaskProgressRow>, StorageError> {
        let prefix = format!("{task_id}:");
        let mut out = Vec::new();
        for result in self.tasks.scan_prefix(prefix.as_bytes()) {
            let (_, value) = result?;
            let row: TaskProgressRow = decode(&value)?;
            // Prefix scans also match ids that merely start with `task_id:`.
            if row.task_id == task_id {
                out.push(row);
            }
        }
        out.sort_by_key(|row| row.snapshot_id);
        Ok(out)
    }

    fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        keep_recovery_points: bool,
    ) -> Result<usize, StorageError> {
        let mut snapshot_keys = Vec::new();
        let mut removed_ids = HashSet::new();
        for result in self.snapshots.iter() {
            let (key, value) = result?;
            let snapshot: Snapshot = match serde_json::from_slice(&value) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "Leaving undecodable snapshot row in place");
                    continue;
                }
            };
            if snapshot.timestamp >= cutoff {
                continue;
            }
            if keep_recovery_points && snapshot.is_recovery_point {
                continue;
            }
            removed_ids.insert(snapshot.id);
            snapshot_keys.push(key.to_vec());
        }

        let mut task_keys = Vec::new();
        for result in self.tasks.iter() {
            let (key, value) = result?;
            let snapshot_id = match decode::<TaskProgressRow>(&value) {
                Ok(row) => Some(row.snapshot_id),
                Err(e) => {
                    warn!(error = %e, "Undecodable task row; matching on its key");
                    snapshot_id_from_task_key(&key)
                }
            };
            if snapshot_id.is_some_and(|id| removed_ids.contains(&id)) {
                task_keys.push(key.to_vec());
            }
        }

        let decision_keys =
            keys_older_than(&self.decisions, cutoff, |r: &DecisionLogRow| r.timestamp)?;
        let message_keys =
            keys_older_than(&self.coordination, cutoff, |r: &AgentCoordinationRow| r.timestamp)?;

        let result: TransactionResult<(), StorageError> = (
            &self.snapshots,
            &self.tasks,
            &self.decisions,
            &self.coordination,
        )
            .transaction(|(snapshots, tasks, decisions, coordination)| {
                for key in &snapshot_keys {
                    snapshots.remove(key.as_slice())?;
                }
                for key in &task_keys {
                    tasks.remove(key.as_slice())?;
                }
                for key in &decision_keys {
                    decisions.remove(key.as_slice())?;
                }
                for key in &message_keys {
                    coordination.remove(key.as_slice())?;
                }
                Ok(())
            });
        result.map_err(to_storage_tx)?;

        let removed = snapshot_keys.len() + task_keys.len() + decision_keys.len() + message_keys.len();
        debug!(
            snapshots = snapshot_keys.len(),
            task_rows = task_keys.len(),
            decisions = decision_keys.len(),
            messages = message_keys.len(),
            "Retention sweep removed records"
        );
        Ok(removed)
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode_id(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

fn encode_task_key(task_id: &str, snapshot_id: SnapshotId) -> String {
    format!("{task_id}:{snapshot_id:0SNAPSHOT_KEY_PAD$}")
}

fn snapshot_id_from_task_key(key: &[u8]) -> Option<SnapshotId> {
    let key = std::str::from_utf8(key).ok()?;
    key.rsplit_once(':')?.1.parse().ok()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn read_all<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StorageError> {
    let mut out = Vec::new();
    for result in tree.iter() {
        let (_, value) = result?;
        out.push(decode(&value)?);
    }
    Ok(out)
}

fn keys_older_than<T, F>(
    tree: &Tree,
    cutoff: DateTime<Utc>,
    timestamp: F,
) -> Result<Vec<Vec<u8>>, StorageError>
where
    T: DeserializeOwned,
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut keys = Vec::new();
    for result in tree.iter() {
        let (key, value) = result?;
        match decode::<T>(&value) {
            Ok(row) if timestamp(&row) < cutoff => keys.push(key.to_vec()),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Leaving undecodable log row in place"),
        }
    }
    Ok(keys)
}

fn keep_newest<T>(mut rows: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        if rows.len() > limit {
            rows.drain(..rows.len() - limit);
        }
    }
    rows
}

fn to_storage_tx(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StorageError::Unavailable(e.to_string()),
    }
}
