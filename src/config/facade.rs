//! Loading entry point: assembles every source in precedence order and
//! deserializes the result.

use super::merge::merge_policy::builder_with_defaults;
use super::sources::{env, global_file, workspace_file};
use super::KeeperConfig;
use crate::error::ApiError;
use config::{Config, File};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Builds a [`KeeperConfig`] for one workspace.
///
/// Precedence, lowest first: defaults, global file, `config/config.toml`,
/// `config/{env}.toml`, an explicit file (`--config`), `KEEPER_*` variables.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    workspace_root: PathBuf,
    global_path: Option<PathBuf>,
    env_name: String,
    explicit_file: Option<PathBuf>,
    env_vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            global_path: global_file::global_config_path(),
            env_name: workspace_file::env_name(),
            explicit_file: None,
            env_vars: None,
        }
    }

    /// Override (or disable with `None`) the global file location.
    pub fn global_file(mut self, path: Option<PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    pub fn env_name(mut self, name: impl Into<String>) -> Self {
        self.env_name = name.into();
        self
    }

    /// A file that must exist, layered above the workspace files.
    pub fn explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    /// Use these variables instead of the process environment.
    pub fn env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Load, resolve storage paths against the workspace root, and validate.
    pub fn load(self) -> Result<KeeperConfig, ApiError> {
        let mut builder = builder_with_defaults()?;
        builder = global_file::add_to_builder(builder, self.global_path.as_deref())?;
        builder = workspace_file::add_to_builder(builder, &self.workspace_root, &self.env_name)?;
        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                return Err(ApiError::ConfigError(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }
        builder = env::add_to_builder(builder, self.env_vars);

        let mut config: KeeperConfig = builder.build()?.try_deserialize()?;
        config.storage = config.storage.resolved(&self.workspace_root);
        config.validate()?;
        debug!(
            workspace = %self.workspace_root.display(),
            store = %config.storage.store_path.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load a single TOML file on top of the defaults, without other sources.
    pub fn load_from_file(path: &Path) -> Result<KeeperConfig, ApiError> {
        let config: KeeperConfig = Config::builder()
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
