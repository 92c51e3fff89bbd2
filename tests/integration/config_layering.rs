//! Layered configuration: defaults < global file < workspace files < env.

use keeper::config::{ConfigLoader, KeeperConfig};
use keeper::ApiError;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write(path: PathBuf, body: &str) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn later_sources_override_earlier_ones_key_by_key() {
    let home = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let global = write(
        home.path().join("keeper/config.toml"),
        "[checkpoint]\ninterval_secs = 120\nauto_start = false\n\n[recovery]\nstaleness_secs = 900\n",
    );
    write(
        workspace.path().join("config/config.toml"),
        "[checkpoint]\ninterval_secs = 60\n",
    );
    write(
        workspace.path().join("config/staging.toml"),
        "[recovery]\nstaleness_secs = 45\n",
    );
    let env = HashMap::from([(
        "KEEPER_CHECKPOINT__INTERVAL_SECS".to_string(),
        "5".to_string(),
    )]);

    let config = ConfigLoader::new(workspace.path())
        .global_file(Some(global))
        .env_name("staging")
        .env_vars(env)
        .load()
        .unwrap();

    assert_eq!(config.checkpoint.interval_secs, 5);
    assert!(!config.checkpoint.auto_start);
    assert_eq!(config.recovery.staleness_secs, 45);
    assert_eq!(
        config.storage.store_path,
        workspace.path().join(".keeper/store")
    );
}

#[test]
fn explicit_file_sits_above_workspace_files() {
    let workspace = TempDir::new().unwrap();
    write(
        workspace.path().join("config/config.toml"),
        "[storage]\nstore_path = \"data/store\"\n",
    );
    let explicit = write(
        workspace.path().join("ops.toml"),
        "[storage]\nstore_path = \"/srv/keeper/store\"\n",
    );

    let config = ConfigLoader::new(workspace.path())
        .global_file(None)
        .env_vars(HashMap::new())
        .explicit_file(explicit)
        .load()
        .unwrap();
    assert_eq!(config.storage.store_path, PathBuf::from("/srv/keeper/store"));
    assert_eq!(
        config.storage.emergency_dir,
        workspace.path().join(".keeper/emergency")
    );
}

#[test]
fn invalid_values_fail_validation() {
    let workspace = TempDir::new().unwrap();
    write(
        workspace.path().join("config/config.toml"),
        "[checkpoint]\ninterval_secs = 0\n",
    );
    let result = ConfigLoader::new(workspace.path())
        .global_file(None)
        .env_vars(HashMap::new())
        .load();
    match result {
        Err(ApiError::ConfigError(message)) => assert!(message.contains("interval_secs")),
        other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn effective_config_renders_as_toml() {
    let rendered = KeeperConfig::default().to_toml().unwrap();
    assert!(rendered.contains("[checkpoint]"));
    assert!(rendered.contains("staleness_secs = 300"));
}
