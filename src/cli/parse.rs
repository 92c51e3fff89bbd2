//! CLI parse: clap types for keeper. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keeper CLI - inspect, recover and prune a context keeper store
#[derive(Parser)]
#[command(name = "keeper")]
#[command(about = "Crash-recoverable context persistence: inspection and recovery tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file layered above the workspace files
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is file)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show store, marker and emergency file status
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List snapshots, newest first
    Snapshots {
        /// Only recovery points
        #[arg(long)]
        recovery_points: bool,
        /// Maximum rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List durable decision log rows, newest last
    Decisions {
        /// Maximum rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List agent coordination messages, newest last
    Messages {
        /// Maximum rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the progress history of one task
    Tasks {
        /// Task identifier
        task_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run recovery and print the report
    Recover {
        /// Restore the newest recovery point instead of the newest snapshot
        #[arg(long, conflicts_with = "snapshot")]
        recovery_point: bool,
        /// Restore one specific snapshot
        #[arg(long)]
        snapshot: Option<u64>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete snapshots and log rows older than a cutoff
    Prune {
        /// Age cutoff in hours
        #[arg(long)]
        older_than_hours: u64,
        /// Also delete recovery points older than the cutoff
        #[arg(long)]
        include_recovery_points: bool,
    },
    /// List emergency fallback files, newest first
    Emergency {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration as TOML
    Config,
}
