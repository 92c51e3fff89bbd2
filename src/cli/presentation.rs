//! CLI presentation: text and json formatters per command family.

mod records;
mod recovery;

pub use records::{
    format_decisions_json, format_decisions_text, format_emergency_json, format_emergency_text,
    format_messages_json, format_messages_text, format_snapshots_json, format_snapshots_text,
    format_task_history_json, format_task_history_text, EmergencyEntry, SnapshotEntry,
};
pub use recovery::{format_recovery_report_json, format_recovery_report_text};
