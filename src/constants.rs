// SPDX-License-Identifier: GPL-3.0-only

//! Engine-wide constants
//!
//! Defaults for the tunables in [`crate::config::EngineConfig`] live here,
//! together with the fixed values the control math relies on.

use crate::geometry::Size;
use std::time::Duration;

/// Nanoseconds per second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Headroom kept between exposure time and frame duration (ns)
pub const EXPOSURE_MARGIN_NS: i64 = 300_000;

/// Shortest exposure the EV resolver will pick (ns)
pub const MIN_EV_EXPOSURE_NS: i64 = 200_000;

/// Zoom factors at or below this are treated as 1.0
pub const ZOOM_NOOP_THRESHOLD: f64 = 1.0001;

/// Extra zoom applied in the 9:16 framing mode
pub const DEFAULT_TALL_ZOOM_BIAS: f32 = 1.2;

/// Largest preview buffer the engine negotiates
pub const MAX_PREVIEW_SIZE: Size = Size::new(1920, 1080);

/// White balance temperature limits (Kelvin)
pub const MIN_KELVIN: u32 = 2000;
pub const MAX_KELVIN: u32 = 10_000;
pub const DEFAULT_KELVIN: u32 = 4400;

/// Initial manual exposure values before the first device query
pub const DEFAULT_ISO: i32 = 200;
pub const DEFAULT_EXPOSURE_NS: i64 = 3_000_000;

/// Still output encoding quality (0-100)
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Frame rate measurement
pub mod fps {
    use super::Duration;

    /// Minimum time between two FPS samples
    pub const MEASUREMENT_WINDOW: Duration = Duration::from_millis(500);

    /// Weight of the newest sample in the exponential smoothing
    pub const SMOOTHING_WEIGHT: f64 = 0.6;

    /// Dead band around the target frame rate for adaptive resolution
    pub const ADAPTIVE_HYSTERESIS: f64 = 2.0;

    /// Minimum interval between two adaptive resolution changes
    pub const ADAPTIVE_MIN_INTERVAL: Duration = Duration::from_millis(1200);

    /// Supported target frame rates
    pub const TARGET_RATES: [u32; 2] = [60, 120];

    /// Default target frame rate
    pub const DEFAULT_TARGET: u32 = 60;
}

/// Frame duration for a target frame rate (ns)
pub fn frame_duration_ns(target_fps: u32) -> i64 {
    NANOS_PER_SECOND / target_fps.max(1) as i64
}

/// Longest exposure that fits inside a frame at `target_fps` (ns)
pub fn max_exposure_for_fps(target_fps: u32, margin_ns: i64) -> i64 {
    frame_duration_ns(target_fps) - margin_ns
}
