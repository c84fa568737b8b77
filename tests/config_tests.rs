// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use camera_engine::config::EngineConfig;
use camera_engine::errors::ConfigError;
use camera_engine::{AspectMode, PreviewScaleMode, ResolutionPreset, Size};

#[test]
fn test_config_default() {
    let config = EngineConfig::default();

    assert_eq!(config.tall_zoom_bias, 1.2);
    assert_eq!(config.preview_scale_mode, PreviewScaleMode::Fill);
    assert_eq!(config.max_preview_size, Size::new(1920, 1080));
    assert_eq!(config.default_aspect_mode, AspectMode::Portrait3x4);
    assert_eq!(config.default_resolution_preset, ResolutionPreset::Mp12);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = EngineConfig {
        adaptive_resolution: true,
        jpeg_quality: 80,
        default_aspect_mode: AspectMode::Tall9x16,
        preview_scale_mode: PreviewScaleMode::Fit,
        photo_dir: dir.path().join("photos"),
        ..EngineConfig::default()
    };
    config.save_to(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains('\n'), "config should be pretty printed");

    let loaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        EngineConfig::load_from(&path),
        Err(ConfigError::Parse(_))
    ));
}
