//! Configuration loading and output directory resolution tests
//!
//! Tests that manipulate MINIVGG_OUTPUT_DIR are marked with #[serial]
//! so they never race on the process environment.

use minivgg_common::config::{
    load_or_default, load_toml_config, CompiledDefaults, OutputDirResolver, TomlConfig,
    OUTPUT_DIR_ENV,
};
use minivgg_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn compiled_default_output_dir_is_not_empty() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.output_dir.as_os_str().is_empty());
    assert!(defaults.output_dir.ends_with("models"));
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn cli_argument_has_highest_priority() {
    env::set_var(OUTPUT_DIR_ENV, "/tmp/minivgg-env");
    let config = TomlConfig {
        output_dir: Some(PathBuf::from("/tmp/minivgg-toml")),
        ..Default::default()
    };

    let resolver = OutputDirResolver::new(Some(PathBuf::from("/tmp/minivgg-cli")));
    assert_eq!(resolver.resolve(&config), PathBuf::from("/tmp/minivgg-cli"));

    env::remove_var(OUTPUT_DIR_ENV);
}

#[test]
#[serial]
fn environment_beats_toml() {
    env::set_var(OUTPUT_DIR_ENV, "/tmp/minivgg-env");
    let config = TomlConfig {
        output_dir: Some(PathBuf::from("/tmp/minivgg-toml")),
        ..Default::default()
    };

    let resolver = OutputDirResolver::new(None);
    assert_eq!(resolver.resolve(&config), PathBuf::from("/tmp/minivgg-env"));

    env::remove_var(OUTPUT_DIR_ENV);
}

#[test]
#[serial]
fn toml_beats_compiled_default() {
    env::remove_var(OUTPUT_DIR_ENV);
    let config = TomlConfig {
        output_dir: Some(PathBuf::from("/tmp/minivgg-toml")),
        ..Default::default()
    };

    let resolver = OutputDirResolver::new(None);
    assert_eq!(resolver.resolve(&config), PathBuf::from("/tmp/minivgg-toml"));
}

#[test]
#[serial]
fn falls_back_to_compiled_default() {
    env::remove_var(OUTPUT_DIR_ENV);
    let resolver = OutputDirResolver::new(None);
    assert_eq!(
        resolver.resolve(&TomlConfig::default()),
        CompiledDefaults::for_current_platform().output_dir
    );
}

#[test]
fn missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_or_default(Some(&temp_dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn config_file_is_parsed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("minivgg-train.toml");
    fs::write(
        &path,
        r#"
port = 6123
output_dir = "/data/models"

[logging]
level = "debug"

[training]
image_size = 64
epochs = 5
stratified = true
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.port, Some(6123));
    assert_eq!(config.output_dir, Some(PathBuf::from("/data/models")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.training.image_size, 64);
    assert_eq!(config.training.epochs, 5);
    assert!(config.training.stratified);
    assert_eq!(config.training.channels, 3);
}

#[test]
fn invalid_training_section_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("minivgg-train.toml");
    fs::write(&path, "[training]\nchannels = 4\n").unwrap();

    let err = load_or_default(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn malformed_toml_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("minivgg-train.toml");
    fs::write(&path, "port = [not toml").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}
