//! Table-driven tests for configuration loading and validation.

mod common;

use common::ConfigBuilder;
use designflow::config::{load_config, load_config_from_str};

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Expected error substring when loading fails.
    expected_error: Option<&'static str>,
}

const JSON_CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{ "version": "1.0", "asset_directory": "/srv/assets" }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "database_path": "~/.designflow/data/designflow.db",
            "asset_directory": "/srv/assets",
            "notification_capacity": 256,
            "simulation": { "step_delay_ms": 1500, "progress_ticks": 10 }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "2.0", "asset_directory": "/srv/assets" }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version"),
    },
    ConfigTestCase {
        name: "blank_asset_directory",
        config_json: r#"{ "version": "1.0", "asset_directory": "   " }"#,
        should_succeed: false,
        expected_error: Some("asset_directory"),
    },
    ConfigTestCase {
        name: "missing_asset_directory",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: false,
        expected_error: Some("asset_directory"),
    },
    ConfigTestCase {
        name: "zero_notification_capacity",
        config_json: r#"{ "version": "1.0", "asset_directory": "/a", "notification_capacity": 0 }"#,
        should_succeed: false,
        expected_error: Some("minimum"),
    },
    ConfigTestCase {
        name: "too_many_ticks",
        config_json: r#"{
            "version": "1.0",
            "asset_directory": "/a",
            "simulation": { "progress_ticks": 1000 }
        }"#,
        should_succeed: false,
        expected_error: Some("maximum"),
    },
    ConfigTestCase {
        name: "unknown_field",
        config_json: r#"{ "version": "1.0", "asset_directory": "/a", "workers": 4 }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "negative_step_delay",
        config_json: r#"{
            "version": "1.0",
            "asset_directory": "/a",
            "simulation": { "step_delay_ms": -5 }
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "malformed_json",
        config_json: r#"{ "version": "1.0", "#,
        should_succeed: false,
        expected_error: Some("parse"),
    },
];

#[test]
fn test_json_config_loading() {
    for test_case in JSON_CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_config_defaults_applied() {
    let config = load_config_from_str(r#"{ "version": "1.0", "asset_directory": "/a" }"#).unwrap();
    assert_eq!(config.notification_capacity, 64);
    assert_eq!(config.simulation.step_delay_ms, 500);
    assert_eq!(config.simulation.progress_ticks, 4);
    assert!(config.database_path.is_none());
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("designflow.json");
    let json = ConfigBuilder::new()
        .asset_directory("/srv/designs")
        .database_path("/srv/designflow.db")
        .notification_capacity(8)
        .simulation(0, 2)
        .to_json();
    std::fs::write(&path, json).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.asset_directory, "/srv/designs");
    assert_eq!(
        config.resolved_database_path().unwrap(),
        std::path::PathBuf::from("/srv/designflow.db")
    );
    assert_eq!(config.notification_capacity, 8);
    assert_eq!(config.simulation.progress_ticks, 2);
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = load_config(dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
