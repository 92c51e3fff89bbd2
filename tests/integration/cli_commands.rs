//! Operator CLI routed through `RunContext`.

use super::test_utils::{crash, manual_config, open};
use keeper::cli::{Cli, Commands, RunContext};
use keeper::context::TaskUpdate;
use clap::Parser;
use serde_json::{json, Value};
use tempfile::TempDir;

fn run(dir: &TempDir) -> RunContext {
    RunContext::with_config(dir.path().to_path_buf(), manual_config(dir.path()))
}

fn json_of(output: &str) -> Value {
    serde_json::from_str(output).unwrap()
}

#[test]
fn parse_recover_flags() {
    let cli = Cli::try_parse_from(["keeper", "recover", "--snapshot", "12"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Recover { snapshot: Some(12), recovery_point: false, .. }
    ));
    assert!(Cli::try_parse_from(["keeper", "recover", "--snapshot", "1", "--recovery-point"]).is_err());
}

#[test]
fn status_shows_marker_left_by_crash() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(5));
    keeper.mark_recovery_point("start");
    crash(keeper);

    let output = run(&dir)
        .execute(&Commands::Status { format: "json".to_string() })
        .unwrap();
    let status = json_of(&output);
    assert_eq!(status["marker_state"], "recovering");
    assert_eq!(status["snapshot_count"], 1);
    assert_eq!(status["recovery_point_count"], 1);
    assert_eq!(status["latest_recovery_point"]["recovery_reason"], "start");
}

#[test]
fn listings_render_in_both_formats() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.log_decision("assign", json!({}), "t1 to a1", "idle", None);
    keeper.log_agent_message("a1", "a2", "handoff", json!({ "task": "t1" }), None);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(40));
    keeper.save_context();
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(80));
    keeper.save_context();
    // Final save at shutdown is deduplicated against the 80% snapshot.
    keeper.shutdown();

    let run = run(&dir);
    let snapshots = json_of(
        &run.execute(&Commands::Snapshots {
            recovery_points: false,
            limit: 10,
            format: "json".to_string(),
        })
        .unwrap(),
    );
    assert_eq!(snapshots["total"], 2);

    let history = json_of(
        &run.execute(&Commands::Tasks {
            task_id: "t1".to_string(),
            format: "json".to_string(),
        })
        .unwrap(),
    );
    let percentages: Vec<u64> = history["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["percentage"].as_u64().unwrap())
        .collect();
    assert_eq!(percentages, vec![40, 80]);

    let decisions = run
        .execute(&Commands::Decisions { limit: 5, format: "text".to_string() })
        .unwrap();
    assert!(decisions.contains("t1 to a1"));

    let messages = json_of(
        &run.execute(&Commands::Messages { limit: 5, format: "json".to_string() })
            .unwrap(),
    );
    assert_eq!(messages["messages"][0]["message_type"], "handoff");
}

#[test]
fn recover_command_reports_and_clears_marker() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(55));
    keeper.save_context();
    crash(keeper);

    let output = run(&dir)
        .execute(&Commands::Recover {
            recovery_point: false,
            snapshot: None,
            format: "json".to_string(),
        })
        .unwrap();
    let report = json_of(&output);
    assert_eq!(report["recovered"], true);
    assert_eq!(report["open_tasks"][0]["task_id"], "t1");
    assert!(!manual_config(dir.path()).storage.marker_path.exists());
}

#[test]
fn emergency_listing_and_bad_format() {
    let dir = TempDir::new().unwrap();
    let run = run(&dir);
    let output = run
        .execute(&Commands::Emergency { format: "text".to_string() })
        .unwrap();
    assert_eq!(output, "No emergency files.");
    assert!(run
        .execute(&Commands::Emergency { format: "yaml".to_string() })
        .is_err());
}
