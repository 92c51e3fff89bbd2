//! Deduplication and recovery-point exemption through the facade.

use super::test_utils::{crash, open};
use keeper::checkpoint::SaveOutcome;
use keeper::context::TaskUpdate;
use keeper::store::SnapshotStore;
use tempfile::TempDir;

#[test]
fn repeated_saves_without_mutation_write_one_snapshot() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(10));

    assert!(keeper.save_context().persisted());
    for _ in 0..10 {
        assert_eq!(keeper.save_context(), SaveOutcome::Skipped);
    }
    assert_eq!(keeper.store().snapshot_ids().unwrap().len(), 1);
    assert_eq!(keeper.get_context_status().persistence.saves_skipped, 10);
    keeper.shutdown();
}

#[test]
fn mutation_between_saves_writes_again() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.save_context();
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(10));
    assert!(keeper.save_context().persisted());
    assert_eq!(keeper.store().snapshot_ids().unwrap().len(), 2);
    keeper.shutdown();
}

#[test]
fn recovery_point_with_identical_content_is_still_written() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(40));
    keeper.save_context();

    let SaveOutcome::Persisted(info) = keeper.mark_recovery_point("before-review") else {
        panic!("recovery point not persisted");
    };
    assert!(info.is_recovery_point);

    let points = keeper.store().query_recovery_points().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].recovery_reason.as_deref(), Some("before-review"));
    assert_eq!(keeper.store().snapshot_ids().unwrap().len(), 2);
    keeper.shutdown();
}

#[test]
fn dedup_survives_restart() {
    let dir = TempDir::new().unwrap();
    let keeper = open(&dir);
    keeper.save_context();
    keeper.shutdown();

    // Clean shutdown: the next session starts empty, which hashes the same as the
    // final save of the previous one.
    let keeper = open(&dir);
    assert_eq!(keeper.save_context(), SaveOutcome::Skipped);
    crash(keeper);
}
