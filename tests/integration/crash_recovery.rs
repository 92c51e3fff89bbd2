//! Crash detection and recovery through the facade.

use super::test_utils::{crash, manual_config, open};
use keeper::context::{AgentUpdate, TaskStatus, TaskUpdate, WorkflowPhase};
use keeper::recovery::{RecoverySource, RecoveryState, RecoveryTarget};
use keeper::store::{SledSnapshotStore, SnapshotStore};
use keeper::ContextKeeper;
use tempfile::TempDir;

#[test]
fn restored_context_matches_last_checkpoint() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress(
        "t1",
        TaskUpdate::new()
            .description("index repository")
            .status(TaskStatus::InProgress)
            .percentage(60)
            .completed_subtask("scan"),
    );
    keeper.update_task_progress("t2", TaskUpdate::new().status(TaskStatus::Completed));
    keeper.update_agent_state(
        "planner",
        AgentUpdate::new().status("busy").current_task("t1"),
    );
    keeper.set_workflow_state(WorkflowPhase::Execution);
    assert!(keeper.save_context().persisted());
    let before = keeper.context();
    crash(keeper);

    let keeper = open(&dir);
    assert_eq!(keeper.previous_state(), RecoveryState::Recovering);
    let report = keeper.startup_report().unwrap();
    assert!(report.recovered);
    assert_eq!(report.open_tasks.len(), 1);
    assert_eq!(report.open_tasks[0].task_id, "t1");

    let after = keeper.context();
    assert_eq!(after.task_progress, before.task_progress);
    assert_eq!(after.agent_states, before.agent_states);
    assert_eq!(after.workflow_state, WorkflowPhase::Execution);
    keeper.shutdown();
}

#[test]
fn update_without_checkpoint_is_lost_on_crash() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(25));
    crash(keeper);

    let keeper = open(&dir);
    let report = keeper.startup_report().unwrap();
    assert!(!report.recovered);
    assert_eq!(report.reason.as_deref(), Some("no snapshot available"));
    assert_eq!(report.source, RecoverySource::Empty);
    // Documented lossy window: nothing covered the update, so it is gone.
    assert!(keeper.context().task_progress.get("t1").is_none());
    keeper.shutdown();
}

#[test]
fn latest_snapshot_wins_over_older_recovery_point() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(25));
    assert!(keeper.mark_recovery_point("phase1").persisted());
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(75));
    assert!(keeper.save_context().persisted());
    crash(keeper);

    let keeper = open(&dir);
    assert_eq!(keeper.context().task_progress["t1"].percentage, 75);
    let report = keeper.startup_report().unwrap();
    let rp = report.latest_recovery_point.as_ref().unwrap();
    assert_eq!(rp.recovery_reason.as_deref(), Some("phase1"));
    keeper.shutdown();
}

#[test]
fn prefer_recovery_point_restores_the_recovery_point() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(25));
    keeper.mark_recovery_point("phase1");
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(75));
    keeper.save_context();
    crash(keeper);

    let mut config = manual_config(dir.path());
    config.recovery.prefer_recovery_point = true;
    let keeper = ContextKeeper::open(config).unwrap();
    assert_eq!(keeper.context().task_progress["t1"].percentage, 25);
    keeper.shutdown();
}

#[test]
fn corrupt_latest_snapshot_is_skipped() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(30));
    keeper.save_context();
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(90));
    keeper.save_context();
    crash(keeper);

    let store_path = manual_config(dir.path()).storage.store_path;
    let corrupted = {
        let store = SledSnapshotStore::open(&store_path).unwrap();
        let newest = store.snapshot_ids().unwrap()[0];
        store.put_raw_snapshot(newest, b"not json at all").unwrap();
        store.flush().unwrap();
        newest
    };

    let keeper = open(&dir);
    let report = keeper.startup_report().unwrap();
    assert!(report.recovered);
    assert_eq!(report.skipped_corrupt, vec![corrupted]);
    assert_eq!(keeper.context().task_progress["t1"].percentage, 30);
    keeper.shutdown();
}

#[test]
fn recovery_runs_once_then_clean() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.save_context();
    crash(keeper);

    let keeper = open(&dir);
    assert_eq!(keeper.previous_state(), RecoveryState::Recovering);
    let summary = keeper.shutdown();
    assert!(summary.marker_cleared);

    let keeper = open(&dir);
    assert_eq!(keeper.previous_state(), RecoveryState::Clean);
    assert!(keeper.startup_report().is_none());
    keeper.shutdown();
}

#[test]
fn stale_agents_are_reported() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_agent_state("worker", AgentUpdate::new().status("busy"));
    keeper.save_context();
    crash(keeper);

    let mut config = manual_config(dir.path());
    config.recovery.staleness_secs = 1;
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let keeper = ContextKeeper::open(config).unwrap();
    let report = keeper.startup_report().unwrap();
    assert_eq!(report.stale_agents, vec!["worker".to_string()]);
    keeper.shutdown();
}

#[test]
fn operator_restore_rolls_back_to_recovery_point() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(20));
    keeper.mark_recovery_point("checkpoint-a");
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(80));
    keeper.save_context();

    let report = keeper.restore_context(RecoveryTarget::LatestRecoveryPoint);
    assert!(report.recovered);
    assert_eq!(keeper.context().task_progress["t1"].percentage, 20);

    // A missing snapshot leaves the current context alone.
    let report = keeper.restore_context(RecoveryTarget::Snapshot(u64::MAX));
    assert!(!report.recovered);
    assert_eq!(keeper.context().task_progress["t1"].percentage, 20);
    keeper.shutdown();
}
