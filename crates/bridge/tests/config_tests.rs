//! Integration tests for configuration file handling

use bridge::config::{BridgeConfig, ConfigSource, load_config};
use std::fs;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[headset]
port = "/dev/rfcomm0"
montage = "P3,P4,Cz"
reference = "A1+A2"
verbosity = 4
library = "/opt/dsi/libDSI-Linux-x86_64.so"

[stream]
name = "Lab-EEG"

[logging]
level = "debug"
"#;

const PARTIAL_CONFIG: &str = r#"
[stream]
name = "Bedside"
"#;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, FULL_CONFIG);

    let config = BridgeConfig::load(Some(path)).unwrap();

    assert_eq!(config.headset.port.as_deref(), Some("/dev/rfcomm0"));
    assert_eq!(config.headset.montage.as_deref(), Some("P3,P4,Cz"));
    assert_eq!(config.headset.reference.as_deref(), Some("A1+A2"));
    assert_eq!(config.headset.verbosity, 4);
    assert_eq!(
        config.headset.library.as_deref(),
        Some(std::path::Path::new("/opt/dsi/libDSI-Linux-x86_64.so"))
    );
    assert_eq!(config.stream.name, "Lab-EEG");
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_partial_config_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, PARTIAL_CONFIG);

    let config = BridgeConfig::load(Some(path)).unwrap();

    assert_eq!(config.stream.name, "Bedside");
    assert_eq!(config.headset.port, None);
    assert_eq!(config.headset.verbosity, 2);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_invalid_log_level_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[logging]\nlevel = \"verbose\"\n");

    let err = BridgeConfig::load(Some(path)).unwrap_err();
    assert!(format!("{:#}", err).contains("Invalid log level"));
}

#[test]
fn test_malformed_toml_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[headset\nport = ");

    let err = BridgeConfig::load(Some(path)).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_missing_file_rejected() {
    let dir = TempDir::new().unwrap();
    let err = BridgeConfig::load(Some(dir.path().join("absent.toml"))).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_save_creates_parent_and_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("dsi2lsl").join("config.toml");

    let mut config = BridgeConfig::default();
    config.headset.montage = Some("C3,C4".to_string());
    config.save(&path).unwrap();

    let loaded = BridgeConfig::load(Some(path)).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_config_expands_env_vars() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, PARTIAL_CONFIG);

    // SAFETY: this test binary does not read the variable from another thread
    unsafe { std::env::set_var("DSI2LSL_TEST_CONFIG_DIR", dir.path()) };
    let (config, source) = load_config("$DSI2LSL_TEST_CONFIG_DIR/config.toml").unwrap();

    assert_eq!(config.stream.name, "Bedside");
    assert_eq!(source, ConfigSource::File(dir.path().join("config.toml")));
}

#[test]
fn test_load_config_reports_expanded_source() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, FULL_CONFIG);

    let (config, source) = load_config(path.to_str().unwrap()).unwrap();

    assert_eq!(config.stream.name, "Lab-EEG");
    assert_eq!(source, ConfigSource::File(path));
}
