//! Integration tests for rivulet-config.
//!
//! Settings files are written to temporary directories and read back, then
//! used to build a rendering context.

use rivulet_config::{ConfigError, EngineConfig, ValidationError};
use rivulet_core::{Buffer, Context};
use tempfile::TempDir;

#[test]
fn save_then_load_preserves_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("engine.toml");
    let config = EngineConfig {
        sample_rate: 96000,
        frames_per_block: 64,
        input_channels: 2,
        device_name: Some("USB Audio".to_string()),
        ..EngineConfig::default()
    };

    config.save(&path).unwrap();
    assert!(path.exists());
    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = EngineConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::load_or_default(dir.path().join("none.toml")).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn invalid_file_is_rejected_with_field_names() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "frames_per_block = 9\nring_padding_factor = 0\n").unwrap();

    let err = EngineConfig::load(&path).unwrap_err();
    let ConfigError::Validation(ValidationError::Multiple(errors)) = err else {
        panic!("expected collected validation errors, got {err:?}");
    };
    let text: Vec<String> = errors.iter().map(ToString::to_string).collect();
    assert!(text.iter().any(|t| t.contains("frames_per_block")));
    assert!(text.iter().any(|t| t.contains("ring_padding_factor")));
}

#[test]
fn loaded_settings_drive_a_context() {
    let config = EngineConfig::from_toml_str(
        r#"
        sample_rate = 32000
        frames_per_block = 32
        output_channels = 1
        default_ramp_seconds = 0.25
        "#,
    )
    .unwrap();
    let ctx = Context::new(config.into_context_options());
    assert_eq!(ctx.sample_rate(), 32000);
    assert_eq!(ctx.frames_per_block(), 32);
    assert!((ctx.options().default_ramp_seconds - 0.25).abs() < 1e-12);

    let mut out = Buffer::new(32, 1);
    ctx.render(&mut out);
    assert_eq!(ctx.processed_frames(), 32);
}
