//! Value types held by the active context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal tasks are not reported as open after recovery.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// Progress record for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub description: String,
    pub status: TaskStatus,
    /// 0-100; updates above 100 are clamped.
    pub percentage: u8,
    pub completed_subtasks: Vec<String>,
    pub blockers: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl TaskProgress {
    pub(crate) fn new_at(now: DateTime<Utc>) -> Self {
        Self {
            description: String::new(),
            status: TaskStatus::Pending,
            percentage: 0,
            completed_subtasks: Vec::new(),
            blockers: Vec::new(),
            updated_at: now,
        }
    }
}

/// Partial task update. `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub percentage: Option<u8>,
    /// Appended in order; subtasks already recorded are not repeated.
    pub completed_subtasks: Vec<String>,
    /// Replaces the blocker list when set.
    pub blockers: Option<Vec<String>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn percentage(mut self, percentage: u8) -> Self {
        self.percentage = Some(percentage);
        self
    }

    pub fn completed_subtask(mut self, subtask: impl Into<String>) -> Self {
        self.completed_subtasks.push(subtask.into());
        self
    }

    pub fn blockers(mut self, blockers: Vec<String>) -> Self {
        self.blockers = Some(blockers);
        self
    }

    pub(crate) fn apply(self, task: &mut TaskProgress, now: DateTime<Utc>) {
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(percentage) = self.percentage {
            task.percentage = percentage.min(100);
        }
        for subtask in self.completed_subtasks {
            if !task.completed_subtasks.contains(&subtask) {
                task.completed_subtasks.push(subtask);
            }
        }
        if let Some(blockers) = self.blockers {
            task.blockers = blockers;
        }
        task.updated_at = now;
    }
}

/// Last reported state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub status: String,
    pub current_task: Option<String>,
    pub capabilities: Vec<String>,
    pub last_update: DateTime<Utc>,
}

impl AgentState {
    pub fn is_stale(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_update) > window
    }
}

/// Partial agent update; `last_update` is always stamped by the context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentUpdate {
    pub status: Option<String>,
    pub current_task: Option<String>,
    pub capabilities: Option<Vec<String>>,
}

impl AgentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn current_task(mut self, task_id: impl Into<String>) -> Self {
        self.current_task = Some(task_id.into());
        self
    }

    pub fn capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub(crate) fn apply(self, agent: Option<AgentState>, now: DateTime<Utc>) -> AgentState {
        let mut agent = agent.unwrap_or_else(|| AgentState {
            status: "unknown".to_string(),
            current_task: None,
            capabilities: Vec::new(),
            last_update: now,
        });
        if let Some(status) = self.status {
            agent.status = status;
        }
        if let Some(task) = self.current_task {
            agent.current_task = Some(task);
        }
        if let Some(capabilities) = self.capabilities {
            agent.capabilities = capabilities;
        }
        agent.last_update = now;
        agent
    }
}

/// Summary of one conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub speaker: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

/// One orchestration decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub decision_type: String,
    pub context: serde_json::Value,
    pub decision: String,
    pub reasoning: String,
    pub outcome: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Coarse workflow phase of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Idle,
    Planning,
    TaskAssignment,
    Execution,
    DecisionMaking,
    Review,
    Recovery,
    Custom(String),
}

impl Default for WorkflowPhase {
    fn default() -> Self {
        WorkflowPhase::Idle
    }
}

impl WorkflowPhase {
    pub fn label(&self) -> &str {
        match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::Planning => "planning",
            WorkflowPhase::TaskAssignment => "task_assignment",
            WorkflowPhase::Execution => "execution",
            WorkflowPhase::DecisionMaking => "decision_making",
            WorkflowPhase::Review => "review",
            WorkflowPhase::Recovery => "recovery",
            WorkflowPhase::Custom(label) => label.as_str(),
        }
    }
}

/// Most recent error seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub error_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub recovery_attempts: u32,
}

/// Task currently being assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTask {
    pub task_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_agents: Vec<String>,
}
