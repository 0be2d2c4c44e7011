//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use adb_transport::config::{AdbConfig, AuthConfig, ClientConfig, LoggingConfig};
use adb_transport::error::AdbError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = AdbConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_client_address() {
    let mut config = AdbConfig::default();
    config.client.address = "emulator-5554".to_string();

    let errors = config.validate();
    assert!(!errors.is_empty(), "Should have validation errors");
    assert!(errors.iter().any(|e| e.contains("Invalid client address")));
}

#[test]
fn test_empty_client_address() {
    let mut config = AdbConfig::default();
    config.client.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_short_connect_timeout() {
    let mut config = AdbConfig::default();
    config.client.connect_timeout = Duration::from_millis(50);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Connect timeout too short")));
}

#[test]
fn test_zero_timeouts_mean_blocking() {
    let config = AdbConfig::default_with_overrides(|c| {
        c.client.connect_timeout = Duration::ZERO;
        c.client.socket_timeout = Duration::ZERO;
    });
    assert!(config.validate().is_empty());
}

#[test]
fn test_short_socket_timeout() {
    let mut config = AdbConfig::default();
    config.client.socket_timeout = Duration::from_millis(5);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Socket timeout too short")));
}

#[test]
fn test_empty_private_key_path() {
    let mut config = AdbConfig::default();
    config.auth.private_key_path = Some(String::new());

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("private_key_path cannot be empty")));
}

#[test]
fn test_same_private_and_public_path() {
    let config = AdbConfig::default_with_overrides(|c| {
        c.auth.private_key_path = Some("/keys/adbkey".to_string());
        c.auth.public_key_path = Some("/keys/adbkey".to_string());
    });

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("must differ")));
}

#[test]
fn test_empty_app_name() {
    let mut config = AdbConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = AdbConfig::default();
    config.logging.app_name = "a".repeat(100);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Application name too long")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    assert!(AdbConfig::default().validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = AdbConfig::default();
    config.client.address = "invalid".to_string();

    match config.validate_strict() {
        Err(AdbError::ConfigError(msg)) => {
            assert!(msg.contains("Configuration validation failed"));
            assert!(msg.contains("Invalid client address"));
        }
        other => panic!("Expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_multiple_validation_errors() {
    let config = AdbConfig {
        client: ClientConfig {
            address: "bad".to_string(),
            connect_timeout: Duration::from_millis(1),
            socket_timeout: Duration::from_millis(1),
        },
        auth: AuthConfig {
            private_key_path: Some(String::new()),
            ..AuthConfig::default()
        },
        logging: LoggingConfig {
            app_name: String::new(),
            ..LoggingConfig::default()
        },
    };

    let errors = config.validate();
    assert_eq!(errors.len(), 5, "got: {errors:#?}");
}

#[test]
fn test_toml_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("adb.toml");
    let config = AdbConfig::default_with_overrides(|c| {
        c.client.address = "192.168.1.20:5555".to_string();
        c.client.socket_timeout = Duration::from_secs(3);
        c.auth.private_key_path = Some("/home/dev/.android/adbkey".to_string());
        c.auth.generate_if_missing = false;
        c.logging.log_level = Level::DEBUG;
        c.logging.json_format = true;
    });

    config.save_to_file(&path).unwrap();
    let loaded = AdbConfig::from_file(&path).unwrap();

    assert_eq!(loaded.client.address, "192.168.1.20:5555");
    assert_eq!(loaded.client.socket_timeout, Duration::from_secs(3));
    assert_eq!(
        loaded.auth.private_key_path.as_deref(),
        Some("/home/dev/.android/adbkey")
    );
    assert!(!loaded.auth.generate_if_missing);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(loaded.logging.json_format);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = AdbConfig::from_toml(
        r#"
        [client]
        address = "10.0.2.2:5557"
        connect_timeout = 2000
        socket_timeout = 0
        "#,
    )
    .unwrap();

    assert_eq!(config.client.address, "10.0.2.2:5557");
    assert_eq!(config.client.connect_timeout, Duration::from_secs(2));
    assert!(config.auth.generate_if_missing);
    assert_eq!(config.logging.app_name, "adb-transport");
}

#[test]
fn test_invalid_log_level_rejected() {
    let result = AdbConfig::from_toml(
        r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        json_format = false
        "#,
    );
    assert!(matches!(result, Err(AdbError::ConfigError(msg)) if msg.contains("Failed to parse TOML")));
}

#[test]
fn test_example_config_parses() {
    let example = AdbConfig::example_config();
    assert!(example.contains("[client]"));
    assert!(AdbConfig::from_toml(&example).is_ok());
}
