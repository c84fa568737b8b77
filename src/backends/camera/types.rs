// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the capture device abstraction

//! Shared types for capture devices

use crate::geometry::{Rect, Size};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Inclusive range of a device control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange<T> {
    pub lower: T,
    pub upper: T,
}

impl<T: PartialOrd + Copy> ValueRange<T> {
    /// Create a range; swapped bounds are put back in order
    pub fn new(lower: T, upper: T) -> Self {
        if upper < lower {
            Self {
                lower: upper,
                upper: lower,
            }
        } else {
            Self { lower, upper }
        }
    }

    /// Clamp `value` into the range
    pub fn clamp(&self, value: T) -> T {
        if value < self.lower {
            self.lower
        } else if value > self.upper {
            self.upper
        } else {
            value
        }
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.lower && value <= self.upper
    }
}

impl<T: std::fmt::Display> std::fmt::Display for ValueRange<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// Which way the lens points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    #[default]
    Back,
    Front,
}

impl LensFacing {
    /// The opposite facing
    pub fn toggled(self) -> Self {
        match self {
            LensFacing::Back => LensFacing::Front,
            LensFacing::Front => LensFacing::Back,
        }
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Back => write!(f, "back"),
            LensFacing::Front => write!(f, "front"),
        }
    }
}

/// Rotation in degrees (clockwise), quantized to quarter turns
///
/// Used both for the sensor mounting angle and for the orientation tag that
/// comes back with an encoded still.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorRotation {
    /// No rotation
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value
    ///
    /// The value is normalised to 0-360 and rounded to the nearest quarter turn.
    pub fn from_degrees_int(degrees: i32) -> Self {
        let quarter = ((degrees.rem_euclid(360) as f64) / 90.0).round() as i32 % 4;
        match quarter {
            1 => SensorRotation::Rotate90,
            2 => SensorRotation::Rotate180,
            3 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Static limits of one camera, valid for the lifetime of one device open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub facing: LensFacing,
    /// Clockwise mounting angle of the sensor relative to the natural
    /// (portrait) device orientation
    pub sensor_orientation: SensorRotation,
    pub iso_range: ValueRange<i32>,
    pub exposure_time_range: ValueRange<i64>,
    /// AE compensation range in stops
    pub ae_compensation_range: ValueRange<f64>,
    pub max_digital_zoom: f32,
    pub sensor_active_rect: Rect,
    /// Output sizes in sensor orientation
    pub supported_output_sizes: Vec<Size>,
    pub flash_available: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            facing: LensFacing::Back,
            sensor_orientation: SensorRotation::Rotate90,
            iso_range: ValueRange::new(100, 3200),
            exposure_time_range: ValueRange::new(100_000, 200_000_000),
            ae_compensation_range: ValueRange::new(-2.0, 2.0),
            max_digital_zoom: 4.0,
            sensor_active_rect: Rect::new(0, 0, 4000, 3000),
            supported_output_sizes: vec![
                Size::new(1600, 1200),
                Size::new(1280, 960),
                Size::new(1280, 720),
                Size::new(960, 720),
                Size::new(640, 480),
            ],
            flash_available: false,
        }
    }
}

/// Surface sizes requested when a session is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Preview buffer size, sensor orientation
    pub preview_size: Size,
    /// Encoded still size, sensor orientation
    pub still_size: Size,
}

impl std::fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "preview {} / still {}", self.preview_size, self.still_size)
    }
}

/// Asynchronous notifications emitted by an open device
#[derive(Debug, Clone)]
pub enum DeviceEventKind {
    /// A preview frame reached the preview surface
    FrameDelivered { timestamp_ns: u64 },
    /// A still request completed with an encoded image
    StillCaptured {
        jpeg: Arc<[u8]>,
        orientation: SensorRotation,
    },
    /// A still request failed on the device
    StillFailed(String),
    /// Access to the device was revoked
    Disconnected,
}

/// Device event tagged with the open that produced it
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    /// Generation of the device open this event belongs to
    pub generation: u64,
    pub kind: DeviceEventKind,
}

/// Sending half handed to a device on open
///
/// Events from a stale open carry an old generation and are dropped by the
/// session worker.
#[derive(Debug, Clone)]
pub struct DeviceEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<DeviceEvent>,
}

impl DeviceEventSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<DeviceEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Send an event; returns false once the session worker is gone
    pub fn send(&self, kind: DeviceEventKind) -> bool {
        self.tx
            .send(DeviceEvent {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }
}

/// Result type for device operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for device operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The platform refused access to the camera
    PermissionDenied(String),
    /// No camera with the requested facing
    DeviceNotFound(String),
    /// Opening the device failed
    OpenFailed(String),
    /// Surfaces could not be configured
    ConfigureFailed(String),
    /// A request was refused by the device
    RequestFailed(String),
    /// Operation needs an open device
    NotOpen,
    /// Access to the device was revoked
    Disconnected,
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::OpenFailed(msg) => write!(f, "Open failed: {}", msg),
            BackendError::ConfigureFailed(msg) => write!(f, "Configure failed: {}", msg),
            BackendError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            BackendError::NotOpen => write!(f, "Device is not open"),
            BackendError::Disconnected => write!(f, "Device disconnected"),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_range_clamp() {
        let range = ValueRange::new(100, 3200);
        assert_eq!(range.clamp(50), 100);
        assert_eq!(range.clamp(5000), 3200);
        assert_eq!(range.clamp(800), 800);
        assert!(range.contains(100));
        assert!(!range.contains(3201));
    }

    #[test]
    fn test_value_range_swapped_bounds() {
        let range = ValueRange::new(4.0, -4.0);
        assert_eq!(range.lower, -4.0);
        assert_eq!(range.upper, 4.0);
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(SensorRotation::from_degrees_int(90), SensorRotation::Rotate90);
        assert_eq!(SensorRotation::from_degrees_int(-90), SensorRotation::Rotate270);
        assert_eq!(SensorRotation::from_degrees_int(450), SensorRotation::Rotate90);
        assert_eq!(SensorRotation::from_degrees_int(100), SensorRotation::Rotate90);
        assert_eq!(SensorRotation::from_degrees_int(350), SensorRotation::None);
        assert!(SensorRotation::Rotate270.swaps_dimensions());
        assert!(!SensorRotation::Rotate180.swaps_dimensions());
    }

    #[test]
    fn test_stale_sender_reports_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = DeviceEventSender::new(3, tx);
        drop(rx);
        assert!(!sender.send(DeviceEventKind::Disconnected));
        assert_eq!(sender.generation(), 3);
    }
}
