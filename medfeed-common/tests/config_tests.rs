//! Integration tests for configuration loading and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate MEDFEED_* variables are marked with #[serial].

use medfeed_common::config::{
    load_toml_config, write_toml_config, ConfigResolver, TomlConfig, API_URL_ENV_VAR,
    CONFIG_ENV_VAR, TOKEN_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(CONFIG_ENV_VAR);
    env::remove_var(API_URL_ENV_VAR);
    env::remove_var(TOKEN_ENV_VAR);
}

#[test]
fn test_write_then_load_preserves_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("medfeed.toml");

    let mut config = TomlConfig::default();
    config.api_base_url = "https://feed.example.org".to_string();
    config.auth_token = Some("secret".to_string());
    config.feed.k = 10;
    config.feed.stagger_ms = 50;
    config.logging.file = Some(PathBuf::from("/tmp/medfeed.log"));

    write_toml_config(&config, &path).unwrap();
    assert!(path.exists(), "parent directories should be created");
    assert!(
        !path.with_extension("toml.tmp").exists(),
        "temp file should be renamed away"
    );

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_malformed_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("medfeed.toml");
    std::fs::write(&path, "api_base_url = [not valid").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
#[serial]
fn test_missing_cli_file_falls_back_to_defaults() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let config = ConfigResolver::new(Some(path)).load().unwrap();
    assert_eq!(config.feed, TomlConfig::default().feed);
    assert_eq!(config.api_base_url, TomlConfig::default().api_base_url);
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let cli_path = temp_dir.path().join("cli.toml");
    let env_path = temp_dir.path().join("env.toml");

    std::fs::write(&cli_path, "api_base_url = \"http://cli.local\"\n").unwrap();
    std::fs::write(&env_path, "api_base_url = \"http://env.local\"\n").unwrap();
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let resolver = ConfigResolver::new(Some(cli_path.clone()));
    assert_eq!(resolver.resolve_path(), Some(cli_path));
    assert_eq!(resolver.load().unwrap().api_base_url, "http://cli.local");

    let resolver = ConfigResolver::new(None);
    assert_eq!(resolver.load().unwrap().api_base_url, "http://env.local");

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_apply_after_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("medfeed.toml");
    std::fs::write(
        &path,
        "api_base_url = \"http://file.local\"\nauth_token = \"file-token\"\n",
    )
    .unwrap();

    env::set_var(API_URL_ENV_VAR, "https://override.local");
    env::set_var(TOKEN_ENV_VAR, "env-token");

    let config = ConfigResolver::new(Some(path)).load().unwrap();
    assert_eq!(config.api_base_url, "https://override.local");
    assert_eq!(config.auth_token.as_deref(), Some("env-token"));

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_override_is_ignored() {
    clear_env();
    env::set_var(TOKEN_ENV_VAR, "   ");

    let temp_dir = TempDir::new().unwrap();
    let config = ConfigResolver::new(Some(temp_dir.path().join("none.toml")))
        .load()
        .unwrap();
    assert!(config.auth_token.is_none());

    clear_env();
}

#[test]
#[serial]
fn test_invalid_values_fail_validation_on_load() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("medfeed.toml");
    std::fs::write(&path, "[feed]\nrequest_timeout_ms = 0\n").unwrap();

    assert!(ConfigResolver::new(Some(path)).load().is_err());
}
