//! Decisions and agent messages are durable before the logging call returns.

use super::test_utils::{crash, manual_config, open};
use keeper::context::TaskUpdate;
use keeper::store::{SledSnapshotStore, SnapshotStore};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn decision_survives_crash_before_any_checkpoint() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    let id = keeper.log_decision(
        "task_assignment",
        json!({ "task": "t1", "candidates": ["a1", "a2"] }),
        "assign t1 to a1",
        "a1 is idle and has the capability",
        None,
    );
    assert!(id.is_some());
    crash(keeper);

    let store = SledSnapshotStore::open(manual_config(dir.path()).storage.store_path).unwrap();
    let rows = store.query_decisions(None, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].decision, "assign t1 to a1");
    assert_eq!(rows[0].context["candidates"][1], "a2");
}

#[test]
fn decisions_after_last_checkpoint_are_replayed_into_context() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.log_decision("plan", json!({}), "split work", "too large", Some("ok"));
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(50));
    keeper.save_context();
    keeper.log_decision("review", json!({ "task": "t1" }), "request review", "half done", None);
    crash(keeper);

    let keeper = open(&dir);
    let report = keeper.startup_report().unwrap();
    assert_eq!(report.replayed_decisions, 1);

    let decisions: Vec<String> = keeper
        .context()
        .decision_log
        .iter()
        .map(|d| d.decision.clone())
        .collect();
    assert_eq!(decisions, vec!["split work", "request review"]);
    keeper.shutdown();
}

#[test]
fn agent_messages_are_written_immediately() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.log_agent_message(
        "orchestrator",
        "worker-1",
        "assignment",
        json!({ "task": "t1" }),
        Some("accepted"),
    );
    keeper.log_agent_message("worker-1", "orchestrator", "progress", json!({ "pct": 10 }), None);
    crash(keeper);

    let store = SledSnapshotStore::open(manual_config(dir.path()).storage.store_path).unwrap();
    let rows = store.query_messages(None).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].response.as_deref(), Some("accepted"));
    assert_eq!(rows[1].from_agent, "worker-1");
}
