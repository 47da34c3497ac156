//! Unit tests for bootstrap configuration and root folder resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate YSEG_ROOT_FOLDER are marked with #[serial].

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;
use yseg_common::config::{
    default_root_folder, load_toml_config, resolve_root_folder, write_toml_config, LoggingConfig,
    TomlConfig, DATABASE_FILE_NAME, ROOT_FOLDER_ENV,
};

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = resolve_root_folder(None, &TomlConfig::default());

    assert!(!root_folder.as_os_str().is_empty());
    assert_eq!(root_folder, default_root_folder());
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/yseg-env-root");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/yseg-toml-root")),
        ..TomlConfig::default()
    };

    let cli = PathBuf::from("/tmp/yseg-cli-root");
    let root_folder = resolve_root_folder(Some(&cli), &toml);
    assert_eq!(root_folder, cli);

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/yseg-env-root");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/yseg-toml-root")),
        ..TomlConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/yseg-env-root"));

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/yseg-toml-root"));
}

#[test]
fn test_database_path_defaults_into_root_folder() {
    let root = PathBuf::from("/tmp/yseg-test-root");
    let config = TomlConfig::default();
    assert_eq!(config.database_path(&root), root.join(DATABASE_FILE_NAME));

    let explicit = TomlConfig {
        database_path: Some(PathBuf::from("/srv/yseg/custom.db")),
        ..TomlConfig::default()
    };
    assert_eq!(explicit.database_path(&root), PathBuf::from("/srv/yseg/custom.db"));
}

#[test]
fn test_missing_config_file_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();

    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.logging.level, "info");
    assert!(config.run_timeout_seconds.is_none());
}

#[test]
fn test_write_then_load_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/data/yseg")),
        database_path: None,
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: Some(PathBuf::from("/var/log/yseg.log")),
        },
        run_timeout_seconds: Some(600),
    };

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "run_timeout_seconds = 120\n").unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.run_timeout_seconds, Some(120));
    assert_eq!(config.logging.level, "info");
    assert!(config.root_folder.is_none());
}

#[test]
fn test_malformed_config_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "run_timeout_seconds = \"soon\"\n[logging\n").unwrap();

    let result = load_toml_config(&path);
    assert!(matches!(result, Err(yseg_common::Error::Config(_))));
}
