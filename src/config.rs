// SPDX-License-Identifier: GPL-3.0-only

//! Engine configuration
//!
//! Tunables are stored as pretty-printed JSON in
//! `$XDG_CONFIG_HOME/camera-engine/config.json`. Missing fields take their
//! defaults so older files keep loading.

use crate::constants::{self, fps};
use crate::controls::{AspectMode, ResolutionPreset};
use crate::errors::ConfigError;
use crate::geometry::{PreviewScaleMode, Size};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name used under the config and pictures directories
pub const APP_DIR_NAME: &str = "camera-engine";

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Headroom kept between exposure time and frame duration (ns)
    pub exposure_margin_ns: i64,
    /// Shortest exposure the EV resolver may choose (ns)
    pub min_ev_exposure_ns: i64,
    /// Extra zoom multiplier in the 9:16 framing mode
    pub tall_zoom_bias: f32,
    pub preview_scale_mode: PreviewScaleMode,
    /// Largest preview buffer to negotiate (sensor orientation)
    pub max_preview_size: Size,
    /// Step the preview size up/down the ladder to hold the target frame rate
    pub adaptive_resolution: bool,
    pub fps_window_ms: u64,
    /// Weight of the newest FPS sample
    pub fps_smoothing_weight: f64,
    /// Dead band around the target frame rate (fps)
    pub adaptive_hysteresis: f64,
    pub adaptive_min_interval_ms: u64,
    pub jpeg_quality: u8,
    pub default_target_fps: u32,
    pub default_aspect_mode: AspectMode,
    pub default_resolution_preset: ResolutionPreset,
    /// Where [`crate::storage::DirectorySink`] writes photos
    pub photo_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exposure_margin_ns: constants::EXPOSURE_MARGIN_NS,
            min_ev_exposure_ns: constants::MIN_EV_EXPOSURE_NS,
            tall_zoom_bias: constants::DEFAULT_TALL_ZOOM_BIAS,
            preview_scale_mode: PreviewScaleMode::Fill,
            max_preview_size: constants::MAX_PREVIEW_SIZE,
            adaptive_resolution: false,
            fps_window_ms: fps::MEASUREMENT_WINDOW.as_millis() as u64,
            fps_smoothing_weight: fps::SMOOTHING_WEIGHT,
            adaptive_hysteresis: fps::ADAPTIVE_HYSTERESIS,
            adaptive_min_interval_ms: fps::ADAPTIVE_MIN_INTERVAL.as_millis() as u64,
            jpeg_quality: constants::DEFAULT_JPEG_QUALITY,
            default_target_fps: fps::DEFAULT_TARGET,
            default_aspect_mode: AspectMode::default(),
            default_resolution_preset: ResolutionPreset::default(),
            photo_dir: default_photo_dir(),
        }
    }
}

impl EngineConfig {
    pub fn fps_window(&self) -> Duration {
        Duration::from_millis(self.fps_window_ms.max(1))
    }

    pub fn adaptive_min_interval(&self) -> Duration {
        Duration::from_millis(self.adaptive_min_interval_ms)
    }

    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write to `path` as pretty-printed JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }
}

/// Default photo directory: `~/Pictures/camera-engine`
pub fn default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.exposure_margin_ns, 300_000);
        assert_eq!(config.fps_window(), Duration::from_millis(500));
        assert_eq!(config.adaptive_min_interval(), Duration::from_millis(1200));
        assert_eq!(config.jpeg_quality, 95);
        assert!(!config.adaptive_resolution);
        assert!(config.photo_dir.ends_with(APP_DIR_NAME));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "tall_zoom_bias": 1.5, "adaptive_resolution": true }"#)
                .unwrap();
        assert_eq!(config.tall_zoom_bias, 1.5);
        assert!(config.adaptive_resolution);
        assert_eq!(config.default_target_fps, 60);
    }
}
