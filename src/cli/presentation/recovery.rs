//! Recovery report presentation.

use crate::recovery::{RecoveryReport, RecoverySource};

pub fn format_recovery_report_text(report: &RecoveryReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Recovered: {}\n",
        if report.recovered { "yes" } else { "no" }
    ));
    match &report.source {
        RecoverySource::Snapshot {
            snapshot_id,
            timestamp,
            is_recovery_point,
            recovery_reason,
        } => {
            output.push_str(&format!(
                "Source: snapshot {} ({})",
                snapshot_id,
                timestamp.to_rfc3339()
            ));
            if *is_recovery_point {
                output.push_str(&format!(
                    ", recovery point '{}'",
                    recovery_reason.as_deref().unwrap_or("")
                ));
            }
            output.push('\n');
        }
        RecoverySource::EmergencyFile { path, saved_at } => {
            output.push_str(&format!(
                "Source: emergency file {} ({})\n",
                path.display(),
                saved_at.to_rfc3339()
            ));
        }
        RecoverySource::Empty => output.push_str("Source: empty context\n"),
    }
    if let Some(reason) = &report.reason {
        output.push_str(&format!("Reason: {}\n", reason));
    }
    if !report.skipped_corrupt.is_empty() {
        let ids: Vec<String> = report.skipped_corrupt.iter().map(|id| id.to_string()).collect();
        output.push_str(&format!("Skipped corrupt snapshots: {}\n", ids.join(", ")));
    }
    if let Some(rp) = &report.latest_recovery_point {
        output.push_str(&format!(
            "Latest recovery point: {} ({})\n",
            rp.snapshot_id,
            rp.recovery_reason.as_deref().unwrap_or("")
        ));
    }
    if report.replayed_decisions > 0 {
        output.push_str(&format!("Replayed decisions: {}\n", report.replayed_decisions));
    }

    output.push_str(&format!("\nOpen tasks: {}\n", report.open_tasks.len()));
    for task in &report.open_tasks {
        output.push_str(&format!(
            "  {:<24} {:<12} {}%\n",
            task.task_id,
            task.status.as_str(),
            task.percentage
        ));
    }
    output.push_str(&format!("Stale agents: {}\n", report.stale_agents.len()));
    for agent in &report.stale_agents {
        output.push_str(&format!("  {}\n", agent));
    }
    output.trim_end().to_string()
}

pub fn format_recovery_report_json(report: &RecoveryReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}
