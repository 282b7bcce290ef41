//! Configuration loading and root folder resolution tests
//!
//! Tests that manipulate ALUMNI_* environment variables are marked #[serial]
//! so they run sequentially.

use alumni_common::config::{
    config_file_path, resolve_secret, write_toml_config, AuthMode, CompiledDefaults,
    RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_root_env() {
    env::remove_var("ALUMNI_ROOT_FOLDER");
    env::remove_var("ALUMNI_ROOT");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_root_env();

    let root_folder = RootFolderResolver::new("test-module").resolve();

    let defaults = CompiledDefaults::for_current_platform();
    assert_eq!(root_folder, defaults.root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    clear_root_env();
    env::set_var("ALUMNI_ROOT_FOLDER", "/tmp/alumni-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/alumni-test-env-folder"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_root_folder_takes_precedence_over_root() {
    clear_root_env();
    env::set_var("ALUMNI_ROOT_FOLDER", "/tmp/alumni-priority-1");
    env::set_var("ALUMNI_ROOT", "/tmp/alumni-priority-2");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/alumni-priority-1"));

    clear_root_env();
}

#[test]
#[serial]
fn test_cli_arg_beats_environment_and_config() {
    clear_root_env();
    env::set_var("ALUMNI_ROOT", "/tmp/alumni-from-env");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/alumni-from-config")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::new("test-module")
        .with_config(&config)
        .with_cli_arg(Some(PathBuf::from("/tmp/alumni-from-cli")));

    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/alumni-from-cli"));

    clear_root_env();
}

#[test]
#[serial]
fn test_config_root_used_when_env_absent() {
    clear_root_env();

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/alumni-from-config")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::new("test-module").with_config(&config);

    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/alumni-from-config"));
}

#[test]
fn test_initializer_database_path() {
    let root = PathBuf::from("/tmp/alumni-test-root");
    let initializer = RootFolderInitializer::new(root.clone());
    assert_eq!(initializer.database_path(), root.join("alumni.db"));
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(root.is_dir());
    assert!(!initializer.database_exists());
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("does-not-exist.toml");

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "[server\nbind_address = ").unwrap();

    assert!(TomlConfig::load_or_default(Some(&path)).is_err());
}

#[test]
fn test_written_config_round_trips() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("conf").join("config.toml");

    let mut config = TomlConfig::default();
    config.auth.mode = AuthMode::Disabled;
    config.auth.admin_emails = vec!["dean@example.org".to_string()];
    config.server.page_size = 50;

    write_toml_config(&config, &path).unwrap();
    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn test_config_file_path_priority() {
    env::remove_var("ALUMNI_CONFIG");
    let cli = PathBuf::from("/tmp/cli.toml");
    assert_eq!(config_file_path(Some(&cli)), Some(cli.clone()));

    env::set_var("ALUMNI_CONFIG", "/tmp/env.toml");
    assert_eq!(config_file_path(None), Some(PathBuf::from("/tmp/env.toml")));
    assert_eq!(config_file_path(Some(&cli)), Some(cli));
    env::remove_var("ALUMNI_CONFIG");
}

#[test]
#[serial]
fn test_resolve_secret_prefers_environment() {
    env::set_var("ALUMNI_TEST_SECRET", "from-env");
    assert_eq!(
        resolve_secret("test secret", "ALUMNI_TEST_SECRET", Some("from-toml")),
        Some("from-env".to_string())
    );

    env::set_var("ALUMNI_TEST_SECRET", "   ");
    assert_eq!(
        resolve_secret("test secret", "ALUMNI_TEST_SECRET", Some("from-toml")),
        Some("from-toml".to_string())
    );

    env::remove_var("ALUMNI_TEST_SECRET");
    assert_eq!(
        resolve_secret("test secret", "ALUMNI_TEST_SECRET", None),
        None
    );
}
