//! Integration tests for Settings loading with layered precedence.
//!
//! These tests use temp directories as the local layer; values set there
//! win over compiled defaults and any global config.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use orgchart::application::ApplicationError;
use orgchart::config::{local_config_path, Settings};
use orgchart::infrastructure::di::ServiceContainer;

#[test]
fn given_local_config_when_load_then_overrides_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let data_file = dir.path().join("org.json");
    fs::write(
        local_config_path(dir.path()),
        format!(
            r#"
data_file = "{}"
seed_sample_data = false

[sync]
enabled = true
timeout_ms = 250

[sync.columns]
phone = ""
"#,
            data_file.display()
        ),
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.data_file, data_file);
    assert!(!settings.seed_sample_data);
    assert!(settings.sync.enabled);
    assert_eq!(settings.sync.timeout().as_millis(), 250);
    assert_eq!(settings.sync.columns.phone, "");
    assert_eq!(settings.sync.columns.email, "email");
}

#[test]
fn given_directory_without_config_when_load_then_data_file_is_expanded() {
    let dir = TempDir::new().unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    assert!(!settings.data_file.to_string_lossy().starts_with('~'));
    assert!(settings.data_file.ends_with("employees.json"));
}

#[test]
fn given_malformed_local_config_when_load_then_reports_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "data_file = [not toml").unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }), "got {err:?}");
    assert!(err.to_string().contains(".orgchart.toml"));
}

#[test]
fn given_effective_settings_when_rendered_as_toml_then_parses_back() {
    let settings = Settings {
        data_file: PathBuf::from("/tmp/org/employees.json"),
        ..Settings::default()
    };

    let rendered = settings.to_toml().unwrap();
    let parsed: Settings = toml::from_str(&rendered).unwrap();

    assert_eq!(parsed, settings);
}

#[test]
fn given_sync_disabled_when_building_container_then_has_no_board() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let settings = Settings {
        data_file: dir.path().join("employees.json"),
        seed_sample_data: false,
        ..Settings::default()
    };

    // Act
    let container = ServiceContainer::new(settings);
    let store = container.open_store().unwrap();

    // Assert
    assert!(container.board.is_none());
    assert!(store.is_empty());
}
