//! Stand-in store used when the backing path cannot be opened.
//!
//! Every operation fails with [`StorageError::Unavailable`], which routes saves to the
//! emergency writer and recovery to the emergency files.

use crate::error::StorageError;
use crate::store::{
    AgentCoordinationRow, CommitReceipt, DecisionLogRow, Snapshot, SnapshotStore,
    TaskProgressRow, WriteUnit,
};
use crate::types::SnapshotId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn err<T>(&self) -> Result<T, StorageError> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }
}

impl SnapshotStore for UnavailableStore {
    fn initialize(&self) -> Result<(), StorageError> {
        self.err()
    }

    fn commit(&self, _unit: WriteUnit) -> Result<CommitReceipt, StorageError> {
        self.err()
    }

    fn get_snapshot(&self, _id: SnapshotId) -> Result<Option<Snapshot>, StorageError> {
        self.err()
    }

    fn snapshot_ids(&self) -> Result<Vec<SnapshotId>, StorageError> {
        self.err()
    }

    fn query_recovery_points(&self) -> Result<Vec<Snapshot>, StorageError> {
        self.err()
    }

    fn query_decisions(
        &self,
        _since: Option<DateTime<Utc>>,
        _limit: Option<usize>,
    ) -> Result<Vec<DecisionLogRow>, StorageError> {
        self.err()
    }

    fn query_messages(&self, _limit: Option<usize>) -> Result<Vec<AgentCoordinationRow>, StorageError> {
        self.err()
    }

    fn query_task_history(&self, _task_id: &str) -> Result<Vec<TaskProgressRow>, StorageError> {
        self.err()
    }

    fn delete_older_than(
        &self,
        _cutoff: DateTime<Utc>,
        _keep_recovery_points: bool,
    ) -> Result<usize, StorageError> {
        self.err()
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.err()
    }
}
