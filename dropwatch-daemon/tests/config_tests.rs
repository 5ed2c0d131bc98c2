//! Configuration loading tests for the daemon entry path.
//!
//! Covers file fallback, environment overrides and CLI overrides.

use std::io::Write;

use clap::Parser;
use serial_test::serial;

use dropwatch_daemon::cli::DaemonCli;
use dropwatch_daemon::load_config;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[tokio::test]
#[serial]
async fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (config, found) = load_config(&dir.path().join("absent.toml")).await.unwrap();

    assert!(!found);
    assert_eq!(config.general.log_level, "info");
    assert!(config.monitor.sw_drops);
    assert!(config.monitor.hw_drops);
    assert_eq!(config.configured_exporters(), 0);
}

#[tokio::test]
#[serial]
async fn test_full_file_is_loaded() {
    let file = write_config(
        r#"
[general]
log_level = "debug"
log_format = "pretty"

[monitor]
alert_mode = "packet"
trunc_len = 256
sw_drops = false
hw_drops = true

[exporters]
queue_capacity = 512
drop_policy = "newest"

[exporters.console]
pretty = true

[exporters.pcap]
file_name = "/tmp/dropwatch-test.pcap"

[exporters.telegraf]
device_ip = "10.0.0.1"
conn_addr = "127.0.0.1:8094"
send_interval_ms = 1000
"#,
    );

    let (config, found) = load_config(file.path()).await.unwrap();
    assert!(found);
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.monitor.trunc_len, 256);
    assert!(!config.monitor.sw_drops);
    assert_eq!(config.exporters.queue_capacity, 512);
    assert_eq!(config.configured_exporters(), 3);
    assert_eq!(
        config.exporters.telegraf.as_ref().unwrap().send_interval_ms,
        1000
    );
}

#[tokio::test]
#[serial]
async fn test_malformed_file_is_an_error() {
    let file = write_config("[monitor\nsw_drops = true");
    let err = load_config(file.path()).await.unwrap_err();
    assert!(err.to_string().contains("failed to load config"));
}

#[tokio::test]
#[serial]
async fn test_env_override_applies_to_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    // SAFETY: serialized test, no other thread reads the environment
    unsafe { std::env::set_var("DROPWATCH_MONITOR_SW_DROPS", "false") };
    let result = load_config(&dir.path().join("absent.toml")).await;
    unsafe { std::env::remove_var("DROPWATCH_MONITOR_SW_DROPS") };

    let (config, _) = result.unwrap();
    assert!(!config.monitor.sw_drops);
    assert!(config.monitor.hw_drops);
}

#[tokio::test]
#[serial]
async fn test_cli_overrides_win_over_env() {
    let dir = tempfile::tempdir().unwrap();
    // SAFETY: serialized test, no other thread reads the environment
    unsafe { std::env::set_var("DROPWATCH_GENERAL_LOG_LEVEL", "warn") };
    let result = load_config(&dir.path().join("absent.toml")).await;
    unsafe { std::env::remove_var("DROPWATCH_GENERAL_LOG_LEVEL") };

    let (mut config, _) = result.unwrap();
    assert_eq!(config.general.log_level, "warn");

    let cli = DaemonCli::parse_from(["dropwatch", "--log-level", "trace"]);
    cli.apply_overrides(&mut config);
    assert_eq!(config.general.log_level, "trace");
    assert!(config.validate().is_ok());
}

#[tokio::test]
#[serial]
async fn test_invalid_cli_override_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, _) = load_config(&dir.path().join("absent.toml")).await.unwrap();

    let cli = DaemonCli::parse_from(["dropwatch", "--log-format", "xml"]);
    cli.apply_overrides(&mut config);
    assert!(config.validate().is_err());
}
