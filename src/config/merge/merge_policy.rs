//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources override earlier ones key by key, so a workspace file that only
//! sets `checkpoint.interval_secs` keeps every other default.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.store_path", ".keeper/store")?
        .set_default("storage.marker_path", ".keeper/keeper.running")?
        .set_default("storage.emergency_dir", ".keeper/emergency")?
        .set_default("checkpoint.interval_secs", 30)?
        .set_default("checkpoint.auto_start", true)?
        .set_default("recovery.staleness_secs", 300)?
        .set_default("recovery.prefer_recovery_point", false)
}
