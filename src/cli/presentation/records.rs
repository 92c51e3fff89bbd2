//! Store record presentation: snapshots, decisions, messages, task history,
//! emergency files. Text uses comfy tables; json is pretty-printed serde.

use crate::store::{AgentCoordinationRow, DecisionLogRow, Snapshot, TaskProgressRow};
use crate::types::SnapshotId;
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

/// One row of `keeper snapshots`. Unreadable snapshots are listed with the error.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    pub id: SnapshotId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub is_recovery_point: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_reason: Option<String>,
    pub payload_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Snapshot> for SnapshotEntry {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id,
            timestamp: Some(snapshot.timestamp),
            session_id: Some(snapshot.session_id.clone()),
            content_hash: Some(snapshot.content_hash.to_hex()),
            is_recovery_point: snapshot.is_recovery_point,
            recovery_reason: snapshot.recovery_reason.clone(),
            payload_bytes: snapshot.payload.len(),
            error: None,
        }
    }
}

impl SnapshotEntry {
    pub fn unreadable(id: SnapshotId, error: String) -> Self {
        Self {
            id,
            timestamp: None,
            session_id: None,
            content_hash: None,
            is_recovery_point: false,
            recovery_reason: None,
            payload_bytes: 0,
            error: Some(error),
        }
    }
}

/// One row of `keeper emergency`.
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyEntry {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn short(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(header);
    table
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_snapshots_text(entries: &[SnapshotEntry]) -> String {
    if entries.is_empty() {
        return "No snapshots stored.".to_string();
    }
    let mut t = table(vec!["ID", "Timestamp", "Hash", "Recovery point", "Bytes"]);
    for entry in entries {
        if let Some(error) = &entry.error {
            t.add_row(vec![
                entry.id.to_string(),
                "-".to_string(),
                "-".to_string(),
                format!("unreadable: {}", short(error, 40)),
                "-".to_string(),
            ]);
            continue;
        }
        let rp = if entry.is_recovery_point {
            entry.recovery_reason.clone().unwrap_or_else(|| "yes".to_string())
        } else {
            String::new()
        };
        t.add_row(vec![
            entry.id.to_string(),
            entry.timestamp.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
            entry.content_hash.as_deref().map(|h| short(h, 15)).unwrap_or_default(),
            rp,
            entry.payload_bytes.to_string(),
        ]);
    }
    format!("{}\n\nTotal: {} snapshot(s)", t, entries.len())
}

pub fn format_snapshots_json(entries: &[SnapshotEntry]) -> String {
    pretty(&json!({ "snapshots": entries, "total": entries.len() }))
}

pub fn format_decisions_text(rows: &[DecisionLogRow]) -> String {
    if rows.is_empty() {
        return "No decisions logged.".to_string();
    }
    let mut t = table(vec!["ID", "Timestamp", "Type", "Decision", "Outcome"]);
    for row in rows {
        t.add_row(vec![
            row.id.to_string(),
            row.timestamp.to_rfc3339(),
            row.decision_type.clone(),
            short(&row.decision, 48),
            row.outcome.clone().unwrap_or_default(),
        ]);
    }
    t.to_string()
}

pub fn format_decisions_json(rows: &[DecisionLogRow]) -> String {
    pretty(&json!({ "decisions": rows, "total": rows.len() }))
}

pub fn format_messages_text(rows: &[AgentCoordinationRow]) -> String {
    if rows.is_empty() {
        return "No agent messages logged.".to_string();
    }
    let mut t = table(vec!["ID", "Timestamp", "From", "To", "Type", "Response"]);
    for row in rows {
        t.add_row(vec![
            row.id.to_string(),
            row.timestamp.to_rfc3339(),
            row.from_agent.clone(),
            row.to_agent.clone(),
            row.message_type.clone(),
            row.response.as_deref().map(|r| short(r, 32)).unwrap_or_default(),
        ]);
    }
    t.to_string()
}

pub fn format_messages_json(rows: &[AgentCoordinationRow]) -> String {
    pretty(&json!({ "messages": rows, "total": rows.len() }))
}

pub fn format_task_history_text(task_id: &str, rows: &[TaskProgressRow]) -> String {
    if rows.is_empty() {
        return format!("No recorded progress for task '{}'.", task_id);
    }
    let mut t = table(vec!["Snapshot", "Timestamp", "Status", "Percent"]);
    for row in rows {
        t.add_row(vec![
            row.snapshot_id.to_string(),
            row.timestamp.to_rfc3339(),
            row.status.as_str().to_string(),
            format!("{}%", row.percentage),
        ]);
    }
    format!("Task: {}\n{}", task_id, t)
}

pub fn format_task_history_json(task_id: &str, rows: &[TaskProgressRow]) -> String {
    pretty(&json!({ "task_id": task_id, "history": rows }))
}

pub fn format_emergency_text(entries: &[EmergencyEntry]) -> String {
    if entries.is_empty() {
        return "No emergency files.".to_string();
    }
    let mut t = table(vec!["File", "Saved at", "Reason"]);
    for entry in entries {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.path.display().to_string());
        let reason = match (&entry.reason, &entry.error) {
            (_, Some(error)) => format!("unreadable: {}", short(error, 40)),
            (Some(reason), None) => short(reason, 48),
            (None, None) => String::new(),
        };
        t.add_row(vec![
            name,
            entry.saved_at.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
            reason,
        ]);
    }
    t.to_string()
}

pub fn format_emergency_json(entries: &[EmergencyEntry]) -> String {
    pretty(&json!({ "files": entries, "total": entries.len() }))
}
