//! Integration tests for configuration loading and validation

use everloop::backend::BackendKind;
use everloop::config::{BackendConfig, ConfigLoader, EverloopConfig, ValidationError};
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("everloop.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{contents}").unwrap();
    (dir, path)
}

#[test]
fn full_config_file_round_trips() {
    let (_dir, path) = write_config(
        r#"
backend = "kling"

[backends.kling]
kind = "kling"
access_key = "ak"
secret_key = "sk"
model = "kling-v1-6"
poll_interval_ms = 2000
timeout_secs = 300

[backends.luma]
kind = "luma"
api_key = "luma-key"

[scheduler]
swap_threshold_ms = 750
ready_wait_ms = 2500
visibility_delay_ms = 40

[logging]
level = "debug"
format = "json"
"#,
    );

    let config = ConfigLoader::load(Some(&path)).unwrap();
    assert!(config.validate().is_ok());

    let kling = config.selected_backend().unwrap();
    assert_eq!(kling.kind, BackendKind::Kling);
    assert_eq!(kling.model.as_deref(), Some("kling-v1-6"));
    assert_eq!(kling.timeout(), Duration::from_secs(300));

    let luma = &config.backends["luma"];
    assert_eq!(luma.kind, BackendKind::Luma);
    // unset fields fall back to their defaults
    assert_eq!(luma.poll_interval(), Duration::from_millis(3_000));
    assert_eq!(luma.timeout(), BackendKind::Luma.default_timeout());

    assert_eq!(config.scheduler.swap_threshold(), Duration::from_millis(750));
    assert_eq!(config.scheduler.ready_wait(), Duration::from_millis(2_500));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn validation_collects_every_problem() {
    let (_dir, path) = write_config(
        r#"
backend = "pika-does-not-exist"

[backends.kling]
kind = "kling"

[backends.fal]
kind = "fal"

[scheduler]
swap_threshold_ms = 0
"#,
    );

    let config = ConfigLoader::load(Some(&path)).unwrap();
    let errors = config.validate().unwrap_err();

    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::Selection(_))));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::Backend(name, _) if name == "kling")));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::Backend(name, _) if name == "fal")));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::Scheduler(_))));
    assert_eq!(errors.len(), 4);
}

#[test]
fn unknown_backend_kind_in_file_is_a_load_error() {
    let (_dir, path) = write_config(
        r#"
[backends.other]
kind = "pika"
"#,
    );
    assert!(ConfigLoader::load(Some(&path)).is_err());
}

#[test]
fn missing_file_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("does-not-exist.toml");
    assert!(ConfigLoader::load(Some(&path)).is_err());
}

#[test]
fn defaults_match_documented_values() {
    let config = EverloopConfig::default();
    assert_eq!(config.backend, "kling");
    assert_eq!(config.scheduler.swap_threshold_ms, 500);
    assert_eq!(config.scheduler.ready_wait_ms, 3_000);
    assert_eq!(config.scheduler.visibility_delay_ms, 50);

    let entry = BackendConfig::new(BackendKind::Fal);
    assert_eq!(entry.poll_interval_ms, 3_000);
    assert_eq!(entry.max_create_attempts, 3);
    assert_eq!(entry.timeout(), Duration::from_secs(120));
}
