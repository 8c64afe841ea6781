//! Tests for manager configuration.

use std::io::Write;

use crate::config::{DeviceConfig, LoggingConfig, ManagerConfig, DEFAULT_MEMORY_BUDGET_BYTES};
use crate::error::PlanError;

#[test]
fn test_config_default() {
    let config = ManagerConfig::default();
    assert_eq!(config.device.device_id, 0);
    assert_eq!(config.device.memory_budget_bytes, DEFAULT_MEMORY_BUDGET_BYTES);
    assert_eq!(config.device.alignment, 256);
    assert_eq!(config.logging.level, "info");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validate_zero_budget() {
    let config = DeviceConfig::with_budget(0);
    let err = config.validate().unwrap_err();
    assert!(matches!(err, PlanError::Config(_)));
    assert!(err.to_string().contains("memory_budget_bytes"));
}

#[test]
fn test_config_validate_alignment_not_power_of_two() {
    let config = DeviceConfig {
        alignment: 100,
        ..Default::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("power of two"));
}

#[test]
fn test_config_validate_unknown_log_format() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: "xml".to_string(),
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_from_file_partial() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[device]\nmemory_budget_bytes = 65536\n\n[logging]\nformat = \"json\""
    )
    .expect("write config");

    let config = ManagerConfig::from_file(file.path()).expect("config must load");
    assert_eq!(config.device.memory_budget_bytes, 65536);
    assert_eq!(config.device.alignment, 256, "unset fields keep defaults");
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_config_from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[device]\nalignment = 3").expect("write config");

    let result = ManagerConfig::from_file(file.path());
    assert!(matches!(result, Err(PlanError::Config(_))));
}

#[test]
fn test_config_from_file_reports_parse_errors() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[device\nbroken").expect("write config");

    let err = ManagerConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_config_from_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = ManagerConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_config_toml_round_trip() {
    let config = ManagerConfig {
        device: DeviceConfig::with_budget(1 << 20),
        logging: LoggingConfig::default(),
    };
    let toml_str = toml::to_string(&config).expect("Config must serialize to TOML");
    let back: ManagerConfig = toml::from_str(&toml_str).expect("Config must deserialize");
    assert_eq!(back, config);
}

#[test]
fn test_config_load_reads_environment() {
    std::env::set_var("DPP_PLAN__DEVICE__MEMORY_BUDGET_BYTES", "8192");
    let config = ManagerConfig::load();
    std::env::remove_var("DPP_PLAN__DEVICE__MEMORY_BUDGET_BYTES");

    let config = config.expect("environment config must load");
    assert_eq!(config.device.memory_budget_bytes, 8192);
}
