//! Keeper CLI Binary
//!
//! Operator tooling over a keeper store: status, listings, recovery and pruning.

use anyhow::Context as _;
use clap::Parser;
use keeper::cli::{Cli, RunContext};
use keeper::config::ConfigLoader;
use keeper::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{debug, error};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Command failed: {:#}", e);
            match e.downcast_ref::<keeper::ApiError>() {
                Some(api_error) => eprintln!("{}", keeper::cli::map_error(api_error)),
                None => eprintln!("{:#}", e),
            }
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .with_context(|| format!("loading workspace {}", cli.workspace.display()))?;
    debug!(workspace = %context.workspace_root().display(), "CLI context initialized");
    let output = context.execute(&cli.command)?;
    Ok(output)
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut loader = ConfigLoader::new(&cli.workspace);
    if let Some(path) = &cli.config {
        loader = loader.explicit_file(path);
    }
    let mut config = loader.load().map(|c| c.logging).unwrap_or_default();

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    } else if config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_logging_config_default() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().to_string_lossy();
        let cli = Cli::try_parse_from(["keeper", "--workspace", ws.as_ref(), "status"]).unwrap();
        let config = build_logging_config(&cli);
        assert_eq!(config.level, "info");
        assert_eq!(config.output, "stderr");
        assert_eq!(config.file, temp.path().join(".keeper/keeper.log"));
    }

    #[test]
    fn test_cli_flags_override_config() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().to_string_lossy();
        let cli = Cli::try_parse_from([
            "keeper",
            "--workspace",
            ws.as_ref(),
            "--verbose",
            "--log-format",
            "json",
            "snapshots",
        ])
        .unwrap();
        let config = build_logging_config(&cli);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, "json");
    }
}
