//! The live orchestration state.

use crate::context::types::{
    AgentState, AgentUpdate, ConversationEntry, CurrentTask, DecisionEntry, ErrorContext,
    TaskProgress, TaskStatus, TaskUpdate, WorkflowPhase,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Number of conversation entries kept in memory; older ones are evicted first.
pub const CONVERSATION_HISTORY_LIMIT: usize = 100;

/// In-memory orchestration state.
///
/// Maps are ordered so the JSON form is canonical: equal contexts always
/// serialize to identical bytes, which is what snapshot deduplication hashes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveContext {
    #[serde(default)]
    pub agent_states: BTreeMap<String, AgentState>,
    #[serde(default)]
    pub task_progress: BTreeMap<String, TaskProgress>,
    #[serde(default)]
    pub conversation_history: VecDeque<ConversationEntry>,
    #[serde(default)]
    pub decision_log: Vec<DecisionEntry>,
    #[serde(default)]
    pub workflow_state: WorkflowPhase,
    #[serde(default)]
    pub error_recovery: Option<ErrorContext>,
    #[serde(default)]
    pub current_task: Option<CurrentTask>,
}

impl ActiveContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `update` into the task, creating it on first sight.
    pub fn update_task_progress(&mut self, task_id: &str, update: TaskUpdate, now: DateTime<Utc>) {
        let task = self
            .task_progress
            .entry(task_id.to_string())
            .or_insert_with(|| TaskProgress::new_at(now));
        update.apply(task, now);
    }

    /// Explicit cleanup; tasks are never dropped implicitly.
    pub fn remove_task(&mut self, task_id: &str) -> Option<TaskProgress> {
        self.task_progress.remove(task_id)
    }

    pub fn update_agent_state(&mut self, agent_id: &str, update: AgentUpdate, now: DateTime<Utc>) {
        let previous = self.agent_states.remove(agent_id);
        let merged = update.apply(previous, now);
        self.agent_states.insert(agent_id.to_string(), merged);
    }

    pub fn add_conversation_entry(&mut self, entry: ConversationEntry) {
        self.conversation_history.push_back(entry);
        while self.conversation_history.len() > CONVERSATION_HISTORY_LIMIT {
            self.conversation_history.pop_front();
        }
    }

    pub fn push_decision(&mut self, entry: DecisionEntry) {
        self.decision_log.push(entry);
    }

    pub fn set_workflow_state(&mut self, phase: WorkflowPhase) {
        self.workflow_state = phase;
    }

    /// Overwrite the error slot; the attempt counter restarts at zero.
    pub fn record_error(&mut self, error_type: &str, message: &str, now: DateTime<Utc>) {
        self.error_recovery = Some(ErrorContext {
            error_type: error_type.to_string(),
            message: message.to_string(),
            timestamp: now,
            recovery_attempts: 0,
        });
    }

    /// Count one recovery attempt against the current error, if any.
    pub fn record_recovery_attempt(&mut self) -> Option<u32> {
        let error = self.error_recovery.as_mut()?;
        error.recovery_attempts = error.recovery_attempts.saturating_add(1);
        Some(error.recovery_attempts)
    }

    pub fn assign_current_task(&mut self, task: CurrentTask) {
        self.current_task = Some(task);
    }

    /// Tasks whose status is not terminal, in task-id order.
    pub fn open_tasks(&self) -> impl Iterator<Item = (&String, &TaskProgress)> {
        self.task_progress
            .iter()
            .filter(|(_, task)| !task.status.is_terminal())
    }

    pub fn stale_agents(&self, now: DateTime<Utc>, window: chrono::Duration) -> Vec<String> {
        self.agent_states
            .iter()
            .filter(|(_, agent)| agent.is_stale(now, window))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.task_progress.get(task_id).map(|t| t.status)
    }

    /// Canonical serialized form used for hashing and snapshot payloads.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
