//! Context domain: the active orchestration state and its value types.
//! Owns in-memory mutation only; persistence lives in `checkpoint` and `store`.

pub mod active;
pub mod types;

pub use active::{ActiveContext, CONVERSATION_HISTORY_LIMIT};
pub use types::{
    AgentState, AgentUpdate, ConversationEntry, CurrentTask, DecisionEntry, ErrorContext,
    TaskProgress, TaskStatus, TaskUpdate, WorkflowPhase,
};
