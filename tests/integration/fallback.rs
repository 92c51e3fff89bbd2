//! Degraded operation when the snapshot store cannot be used.

use super::test_utils::{crash, manual_config};
use keeper::checkpoint::SaveOutcome;
use keeper::context::TaskUpdate;
use keeper::recovery::{RecoverySource, RecoveryState};
use keeper::store::UnavailableStore;
use keeper::ContextKeeper;
use std::sync::Arc;
use tempfile::TempDir;

fn degraded(dir: &TempDir) -> ContextKeeper {
    ContextKeeper::with_store(
        manual_config(dir.path()),
        Arc::new(UnavailableStore::new("disk detached")),
    )
    .unwrap()
}

#[test]
fn saves_fall_back_to_new_emergency_files() {
    let dir = TempDir::new().unwrap();
    let keeper = degraded(&dir);
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(15));

    let first = keeper.save_context();
    let second = keeper.save_context();
    let (SaveOutcome::Fallback(a), SaveOutcome::Fallback(b)) = (first, second) else {
        panic!("expected fallback saves");
    };
    assert_ne!(a, b);

    let status = keeper.get_context_status();
    assert!(status.persistence.degraded);
    assert_eq!(status.persistence.fallback_writes, 2);
    assert!(status.last_checkpoint_at.is_none());
    keeper.shutdown();
}

#[test]
fn recovery_uses_emergency_file_when_store_is_unreadable() {
    let dir = TempDir::new().unwrap();
    let keeper = degraded(&dir);
    keeper.update_task_progress("t7", TaskUpdate::new().percentage(70));
    keeper.save_context();
    let before = keeper.context();
    crash(keeper);

    let keeper = degraded(&dir);
    assert_eq!(keeper.previous_state(), RecoveryState::Recovering);
    let report = keeper.startup_report().unwrap();
    assert!(!report.recovered);
    assert!(report.reason.as_deref().unwrap().contains("disk detached"));
    assert!(matches!(report.source, RecoverySource::EmergencyFile { .. }));
    assert_eq!(keeper.context(), before);
    keeper.shutdown();
}

#[test]
fn unopenable_store_path_still_yields_a_working_keeper() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "file, not a directory").unwrap();

    let mut config = manual_config(dir.path());
    config.storage.store_path = blocker.join("store");
    let keeper = ContextKeeper::open(config).unwrap();
    keeper.update_task_progress("t1", TaskUpdate::new().percentage(1));
    assert!(matches!(keeper.save_context(), SaveOutcome::Fallback(_)));
    keeper.shutdown();
}
