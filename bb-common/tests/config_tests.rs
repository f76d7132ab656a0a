//! Configuration resolution tests
//!
//! Tests that set BB_* variables are marked #[serial] so they never race.

use std::env;
use std::io::Write;
use std::path::PathBuf;

use bb_common::config::{BattleConfig, ENV_BRIDGE_ENDPOINT, ENV_CONFIG, ENV_DATABASE, ENV_WEB_BIND};
use serial_test::serial;

fn clear_env() {
    for var in [ENV_CONFIG, ENV_DATABASE, ENV_WEB_BIND, ENV_BRIDGE_ENDPOINT, "BB_BOT_PREFIX"] {
        env::remove_var(var);
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_explicit_file_is_loaded() {
    clear_env();
    let file = write_config(
        r#"
        database_path = "/tmp/explicit.db"

        [bot]
        prefix = "!bb"

        [lifecycle]
        sweep_interval_secs = 5
        "#,
    );

    let config = BattleConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.database_path, PathBuf::from("/tmp/explicit.db"));
    assert_eq!(config.bot.prefix, "!bb");
    assert_eq!(config.sweep_interval().as_secs(), 5);
    assert_eq!(config.web.bind, "127.0.0.1:5760");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = write_config(
        r#"
        database_path = "/tmp/from-file.db"

        [bridge]
        endpoint = "127.0.0.1:7000"
        "#,
    );
    env::set_var(ENV_DATABASE, "/tmp/from-env.db");
    env::set_var(ENV_BRIDGE_ENDPOINT, "127.0.0.1:7001");

    let config = BattleConfig::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(config.database_path, PathBuf::from("/tmp/from-env.db"));
    assert_eq!(config.bridge.endpoint, "127.0.0.1:7001");
}

#[test]
#[serial]
fn test_config_path_from_env() {
    clear_env();
    let file = write_config("[web]\nbind = \"0.0.0.0:8080\"\n");
    env::set_var(ENV_CONFIG, file.path());

    let config = BattleConfig::load(None).unwrap();
    clear_env();

    assert_eq!(config.web.bind, "0.0.0.0:8080");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = BattleConfig::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    clear_env();
    let file = write_config("[bridge\nendpoint = ");
    assert!(BattleConfig::load(Some(file.path())).is_err());
}
