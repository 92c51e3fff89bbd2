//! Shared test utilities for integration tests

use keeper::config::KeeperConfig;
use keeper::ContextKeeper;
use std::path::Path;
use tempfile::TempDir;

/// Config rooted in `dir` with the scheduler off so tests control every save.
pub fn manual_config(dir: &Path) -> KeeperConfig {
    let mut config = KeeperConfig::for_workspace(dir);
    config.checkpoint.auto_start = false;
    config
}

pub fn open(dir: &TempDir) -> ContextKeeper {
    ContextKeeper::open(manual_config(dir.path())).unwrap()
}

/// Simulate a process crash: the keeper goes away without `shutdown`, so the crash
/// marker stays on disk and no final save happens. Dropping still releases the
/// store lock so the "next process" can open it.
pub fn crash(keeper: ContextKeeper) {
    drop(keeper);
}
