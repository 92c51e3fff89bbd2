//! Retention sweeps keep recovery points unless asked otherwise.

use super::test_utils::manual_config;
use keeper::checkpoint::hasher::canonical_form;
use keeper::cli::{Commands, RunContext};
use keeper::context::{ActiveContext, TaskUpdate};
use keeper::recovery::RecoveryTarget;
use keeper::store::{NewSnapshot, SledSnapshotStore, SnapshotStore};
use keeper::ContextKeeper;
use chrono::{Duration, Utc};
use tempfile::TempDir;

fn aged_snapshot(percentage: u8, hours_ago: i64, recovery_point: bool) -> NewSnapshot {
    let timestamp = Utc::now() - Duration::hours(hours_ago);
    let mut context = ActiveContext::new();
    context.update_task_progress("t1", TaskUpdate::new().percentage(percentage), timestamp);
    let (payload, content_hash) = canonical_form(&context).unwrap();
    NewSnapshot {
        session_id: "sess-old".to_string(),
        timestamp,
        content_hash,
        payload,
        is_recovery_point: recovery_point,
        recovery_reason: recovery_point.then(|| "milestone".to_string()),
        tasks: Vec::new(),
    }
}

#[test]
fn prune_removes_old_checkpoints_but_keeps_recovery_points() {
    let dir = TempDir::new().unwrap();
    let config = manual_config(dir.path());
    {
        let store = SledSnapshotStore::open(&config.storage.store_path).unwrap();
        store.insert_snapshot(aged_snapshot(10, 72, false)).unwrap();
        store.insert_snapshot(aged_snapshot(20, 60, true)).unwrap();
        store.insert_snapshot(aged_snapshot(30, 1, false)).unwrap();
        store.flush().unwrap();
    }

    let run = RunContext::with_config(dir.path().to_path_buf(), config.clone());
    let output = run
        .execute(&Commands::Prune {
            older_than_hours: 24,
            include_recovery_points: false,
        })
        .unwrap();
    assert!(output.starts_with("Removed 1 record(s)"));

    let keeper = ContextKeeper::open(config.clone()).unwrap();
    assert_eq!(keeper.store().snapshot_ids().unwrap().len(), 2);
    let report = keeper.restore_context(RecoveryTarget::LatestRecoveryPoint);
    assert!(report.recovered);
    assert_eq!(keeper.context().task_progress["t1"].percentage, 20);
    keeper.shutdown();

    let output = run
        .execute(&Commands::Prune {
            older_than_hours: 24,
            include_recovery_points: true,
        })
        .unwrap();
    assert!(output.starts_with("Removed 1 record(s)"));
}
