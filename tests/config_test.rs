//! Integration tests for Settings config loading with layered precedence.
//!
//! These tests run without a global config (temp directories only),
//! so they test the local `.proptree.toml` layer on top of compiled defaults.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use proptree::application::ApplicationError;
use proptree::config::{local_config_path, Settings, StoreBackend};

#[test]
fn given_local_config_when_load_then_overrides_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "store_path = \"/srv/proptree/nodes.json\"\nbackend = \"memory\"\n",
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.store_path, PathBuf::from("/srv/proptree/nodes.json"));
    assert_eq!(settings.backend, StoreBackend::Memory);
    assert!(settings.pretty, "unspecified field keeps its default");
}

#[test]
fn given_tilde_in_local_config_when_load_then_path_is_expanded() {
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "store_path = \"~/proptree/nodes.json\"\n",
    )
    .unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    let home = std::env::var("HOME").expect("HOME should be set");
    assert_eq!(
        settings.store_path,
        PathBuf::from(home).join("proptree/nodes.json")
    );
}

#[test]
fn given_invalid_local_config_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "backend = [not toml").unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }));
}

#[test]
fn given_unknown_backend_in_local_config_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "backend = \"sqlite\"\n").unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }));
}

#[test]
fn given_template_written_as_local_config_when_load_then_defaults_apply() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), Settings::template()).unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    assert_eq!(settings.backend, StoreBackend::Json);
    assert!(settings.store_path.to_string_lossy().ends_with("nodes.json"));
}
