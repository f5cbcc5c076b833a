use assert_fs::prelude::*;
use craft_runner::config::{Config, validate_config};
use craft_runner::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_parse_config() -> Result<()> {
    let config_str = r#"{
        "serversDir": "/srv/minecraft",
        "http": {
            "address": "127.0.0.1",
            "port": 8080,
            "workers": 2,
            "shutdownTimeoutSecs": 3
        },
        "supervisor": {
            "gracePeriodSecs": 30,
            "settleDelaySecs": 5,
            "javaPath": "/usr/lib/jvm/java-21/bin/java",
            "consoleBuffer": 64,
            "backlogLines": 0
        }
    }"#;

    let config = Config::parse_from_str(config_str)?;

    assert_eq!(config.servers_dir, PathBuf::from("/srv/minecraft"));
    assert_eq!(config.http.address, "127.0.0.1");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.http.workers, Some(2));
    assert_eq!(config.http.shutdown_timeout_secs, 3);
    assert_eq!(config.supervisor.grace_period(), Duration::from_secs(30));
    assert_eq!(config.supervisor.settle_delay(), Duration::from_secs(5));
    assert_eq!(config.supervisor.java_path, "/usr/lib/jvm/java-21/bin/java");
    assert_eq!(config.supervisor.console_buffer, 64);
    assert_eq!(config.supervisor.backlog_lines, 0);

    validate_config(&config)?;
    Ok(())
}

#[test]
fn test_partial_supervisor_section_keeps_defaults() -> Result<()> {
    let config = Config::parse_from_str(r#"{ "supervisor": { "gracePeriodSecs": 3 } }"#)?;

    assert_eq!(config.supervisor.grace_period_secs, 3);
    assert_eq!(config.supervisor.settle_delay_secs, 2);
    assert_eq!(config.supervisor.console_buffer, 256);
    assert_eq!(config.supervisor.backlog_lines, 100);
    Ok(())
}

#[test]
fn test_invalid_json() {
    let result = Config::parse_from_str(r#"{ "serversDir": "#);
    assert!(matches!(result, Err(Error::ConfigParse(_))));
}

#[test]
fn test_from_file_json_and_yaml() -> Result<()> {
    let temp = assert_fs::TempDir::new().unwrap();

    let json = temp.child("craft-runner.json");
    json.write_str(r#"{ "serversDir": "json-servers" }"#).unwrap();
    let config = Config::from_file(json.path())?;
    assert_eq!(config.servers_dir, PathBuf::from("json-servers"));

    let yaml = temp.child("craft-runner.yaml");
    yaml.write_str("serversDir: yaml-servers\nhttp:\n  port: 9100\n").unwrap();
    let config = Config::from_file(yaml.path())?;
    assert_eq!(config.servers_dir, PathBuf::from("yaml-servers"));
    assert_eq!(config.http.port, 9100);

    Ok(())
}

#[test]
fn test_from_missing_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let result = Config::from_file(temp.child("absent.json").path());
    assert!(matches!(result, Err(Error::ConfigParse(_))));
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut config = Config::default();
    config.http.port = 0;
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    let mut config = Config::default();
    config.http.workers = Some(0);
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    let mut config = Config::default();
    config.supervisor.console_buffer = 0;
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    let mut config = Config::default();
    config.supervisor.java_path = "  ".to_string();
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    let mut config = Config::default();
    config.servers_dir = PathBuf::new();
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    assert!(validate_config(&Config::default()).is_ok());
}
