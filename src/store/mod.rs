//! Snapshot Store
//!
//! Durable, queryable storage for context snapshots, task-progress rows, the decision
//! log and agent-coordination rows. Every write goes through [`SnapshotStore::commit`],
//! which applies one [`WriteUnit`] atomically.

pub mod persistence;
pub mod unavailable;

pub use persistence::SledSnapshotStore;
pub use unavailable::UnavailableStore;

use crate::context::TaskStatus;
use crate::error::StorageError;
use crate::types::{ContentHash, RowId, SnapshotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted copy of the active context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub content_hash: ContentHash,
    /// Canonical JSON of the context.
    pub payload: String,
    pub is_recovery_point: bool,
    pub recovery_reason: Option<String>,
}

/// Snapshot contents before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub content_hash: ContentHash,
    pub payload: String,
    pub is_recovery_point: bool,
    pub recovery_reason: Option<String>,
    /// Task rows committed alongside the snapshot.
    pub tasks: Vec<TaskProgressEntry>,
}

/// Task summary carried by a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgressEntry {
    pub task_id: String,
    pub status: TaskStatus,
    pub percentage: u8,
}

/// Durable task-progress row, one per task per snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgressRow {
    pub snapshot_id: SnapshotId,
    pub task_id: String,
    pub status: TaskStatus,
    pub percentage: u8,
    pub timestamp: DateTime<Utc>,
}

/// Durable mirror of one decision-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogRow {
    pub id: RowId,
    pub session_id: String,
    pub decision_type: String,
    pub context: serde_json::Value,
    pub decision: String,
    pub reasoning: String,
    pub outcome: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDecision {
    pub session_id: String,
    pub decision_type: String,
    pub context: serde_json::Value,
    pub decision: String,
    pub reasoning: String,
    pub outcome: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Durable record of one inter-agent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCoordinationRow {
    pub id: RowId,
    pub session_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub message_type: String,
    pub content: serde_json::Value,
    pub response: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAgentMessage {
    pub session_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub message_type: String,
    pub content: serde_json::Value,
    pub response: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Rows that must land together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteUnit {
    pub snapshot: Option<NewSnapshot>,
    pub decisions: Vec<NewDecision>,
    pub messages: Vec<NewAgentMessage>,
}

impl WriteUnit {
    pub fn snapshot(snapshot: NewSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            ..Self::default()
        }
    }

    pub fn decision(decision: NewDecision) -> Self {
        Self {
            decisions: vec![decision],
            ..Self::default()
        }
    }

    pub fn message(message: NewAgentMessage) -> Self {
        Self {
            messages: vec![message],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none() && self.decisions.is_empty() && self.messages.is_empty()
    }
}

/// Ids assigned by one committed [`WriteUnit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub snapshot_id: Option<SnapshotId>,
    pub decision_ids: Vec<RowId>,
    pub message_ids: Vec<RowId>,
}

/// Snapshot Store interface
pub trait SnapshotStore: Send + Sync {
    /// Create any missing tables. Safe to call repeatedly.
    fn initialize(&self) -> Result<(), StorageError>;

    /// Apply every row of `unit` in one transaction.
    fn commit(&self, unit: WriteUnit) -> Result<CommitReceipt, StorageError>;

    fn get_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>, StorageError>;

    /// All snapshot ids, newest first.
    fn snapshot_ids(&self) -> Result<Vec<SnapshotId>, StorageError>;

    /// Recovery-point snapshots, newest first.
    fn query_recovery_points(&self) -> Result<Vec<Snapshot>, StorageError>;

    /// Decision rows, oldest first, optionally only those newer than `since`.
    /// `limit` keeps the newest rows.
    fn query_decisions(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<DecisionLogRow>, StorageError>;

    /// Coordination rows, oldest first; `limit` keeps the newest rows.
    fn query_messages(&self, limit: Option<usize>) -> Result<Vec<AgentCoordinationRow>, StorageError>;

    /// Progress rows recorded for one task, oldest first.
    fn query_task_history(&self, task_id: &str) -> Result<Vec<TaskProgressRow>, StorageError>;

    /// Remove snapshots (and their task rows) and log rows older than `cutoff`.
    /// Returns the number of records removed.
    fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        keep_recovery_points: bool,
    ) -> Result<usize, StorageError>;

    /// Make committed writes durable.
    fn flush(&self) -> Result<(), StorageError>;

    fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<SnapshotId, StorageError> {
        let receipt = self.commit(WriteUnit::snapshot(snapshot))?;
        receipt
            .snapshot_id
            .ok_or_else(|| StorageError::Unavailable("snapshot id was not assigned".to_string()))
    }

    fn append_decision(&self, decision: NewDecision) -> Result<RowId, StorageError> {
        let receipt = self.commit(WriteUnit::decision(decision))?;
        receipt
            .decision_ids
            .first()
            .copied()
            .ok_or_else(|| StorageError::Unavailable("decision id was not assigned".to_string()))
    }

    fn append_message(&self, message: NewAgentMessage) -> Result<RowId, StorageError> {
        let receipt = self.commit(WriteUnit::message(message))?;
        receipt
            .message_ids
            .first()
            .copied()
            .ok_or_else(|| StorageError::Unavailable("message id was not assigned".to_string()))
    }

    /// Most recent snapshot, or `None` when the store is empty.
    fn query_latest_snapshot(&self) -> Result<Option<Snapshot>, StorageError> {
        match self.snapshot_ids()?.first() {
            Some(id) => self.get_snapshot(*id),
            None => Ok(None),
        }
    }
}
