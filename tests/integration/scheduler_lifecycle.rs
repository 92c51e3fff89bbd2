//! Background checkpoint scheduler driven through the facade.

use super::test_utils::manual_config;
use keeper::context::TaskUpdate;
use keeper::store::SnapshotStore;
use keeper::{ApiError, ContextKeeper};
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[test]
fn auto_started_scheduler_checkpoints_changes() {
    let dir = TempDir::new().unwrap();
    let mut config = manual_config(dir.path());
    config.checkpoint.auto_start = true;
    config.checkpoint.interval_secs = 1;
    let keeper = ContextKeeper::open(config).unwrap();
    assert!(keeper.get_context_status().scheduler_running);

    keeper.update_task_progress("t1", TaskUpdate::new().percentage(33));
    let deadline = Instant::now() + Duration::from_secs(10);
    while keeper.store().snapshot_ids().unwrap().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(100));
    }
    let latest = keeper.store().query_latest_snapshot().unwrap().unwrap();
    assert!(latest.payload.contains("\"percentage\":33"));

    let summary = keeper.shutdown();
    assert!(summary.scheduler_was_running);
}

#[test]
fn double_start_is_a_caller_error() {
    let dir = TempDir::new().unwrap();
    let keeper = ContextKeeper::open(manual_config(dir.path())).unwrap();
    keeper.start_scheduler().unwrap();
    assert!(matches!(
        keeper.start_scheduler(),
        Err(ApiError::SchedulerAlreadyRunning)
    ));
    keeper.shutdown();
}

#[test]
fn shutdown_does_not_wait_out_a_long_interval() {
    let dir = TempDir::new().unwrap();
    let mut config = manual_config(dir.path());
    config.checkpoint.auto_start = true;
    config.checkpoint.interval_secs = 3600;
    let keeper = ContextKeeper::open(config).unwrap();

    let started = Instant::now();
    let summary = keeper.shutdown();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(summary.scheduler_was_running);
    assert_eq!(summary.final_save, "persisted");
}
