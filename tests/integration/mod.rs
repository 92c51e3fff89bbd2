//! Integration tests for the keeper persistence engine

mod checkpoint_dedup;
mod cli_commands;
mod config_layering;
mod crash_recovery;
mod decision_durability;
mod fallback;
mod retention;
mod scheduler_lifecycle;
mod test_utils;
