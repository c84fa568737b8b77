// SPDX-License-Identifier: GPL-3.0-only

//! Virtual capture device
//!
//! A software camera with a back and a front lens. It emits frame-delivered
//! events at the rate the repeating request asks for (optionally limited by a
//! simulated pixel throughput) and answers still requests with a synthetic
//! gradient JPEG cut to the requested crop region.
//!
//! Faults can be injected through a [`VirtualCameraHandle`], which stays
//! usable after the device itself has been moved into an engine.

use super::frame_loop::{FrameLoopController, FramePacing, LoopAction};
use super::types::*;
use super::CaptureDevice;
use crate::geometry::{Rect, Size};
use crate::request::FrameRequest;
use image::{ImageBuffer, Rgb};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// JPEG blocks the virtual encoder aligns still dimensions to
const CODEC_BLOCK: u32 = 16;

/// Faults to inject into the next operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// `open` fails with a permission error
    pub permission_denied: bool,
    /// `open` fails
    pub fail_open: bool,
    /// `configure` fails
    pub fail_configure: bool,
    /// Still requests complete with a failure event
    pub fail_capture: bool,
}

/// Calls observed by the virtual device
#[derive(Debug, Clone, Default)]
pub struct VirtualStats {
    /// Facings passed to `query_capabilities`, in call order
    pub capability_queries: Vec<LensFacing>,
    pub opens: u32,
    pub closes: u32,
    /// Stream configurations, in call order
    pub configurations: Vec<StreamConfig>,
    /// Number of `set_repeating` calls
    pub repeating_requests: u32,
    pub last_repeating: Option<FrameRequest>,
    pub captures: u32,
    pub last_capture: Option<FrameRequest>,
}

#[derive(Debug, Default)]
struct Shared {
    faults: FaultPlan,
    stats: VirtualStats,
    /// Event sender of the current open
    events: Option<DeviceEventSender>,
    disconnected: bool,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Test/control handle for a [`VirtualCamera`]
#[derive(Debug, Clone)]
pub struct VirtualCameraHandle {
    shared: Arc<Mutex<Shared>>,
}

impl VirtualCameraHandle {
    pub fn set_faults(&self, faults: FaultPlan) {
        lock(&self.shared).faults = faults;
    }

    pub fn stats(&self) -> VirtualStats {
        lock(&self.shared).stats.clone()
    }

    /// Revoke access to the open device
    ///
    /// Returns false when no device is open.
    pub fn disconnect(&self) -> bool {
        let mut shared = lock(&self.shared);
        let Some(events) = shared.events.clone() else {
            return false;
        };
        shared.disconnected = true;
        drop(shared);
        info!("Virtual camera disconnected");
        events.send(DeviceEventKind::Disconnected)
    }
}

struct OpenState {
    facing: LensFacing,
    caps: DeviceCapabilities,
    events: DeviceEventSender,
    streams: Option<StreamConfig>,
    pacing: Arc<FramePacing>,
    frame_loop: FrameLoopController,
}

/// Software camera implementing [`CaptureDevice`]
pub struct VirtualCamera {
    back: DeviceCapabilities,
    front: Option<DeviceCapabilities>,
    /// Simulated preview throughput in pixels per second
    pixel_rate: Option<u64>,
    shared: Arc<Mutex<Shared>>,
    open: Option<OpenState>,
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualCamera {
    /// Back camera with flash plus a flashless front camera
    pub fn new() -> Self {
        let back = DeviceCapabilities {
            flash_available: true,
            ..DeviceCapabilities::default()
        };
        let front = DeviceCapabilities {
            facing: LensFacing::Front,
            sensor_orientation: SensorRotation::Rotate270,
            iso_range: ValueRange::new(100, 1600),
            ae_compensation_range: ValueRange::new(-2.0, 2.0),
            max_digital_zoom: 2.0,
            sensor_active_rect: Rect::new(0, 0, 3264, 2448),
            supported_output_sizes: vec![
                Size::new(1280, 960),
                Size::new(1280, 720),
                Size::new(640, 480),
            ],
            flash_available: false,
            ..DeviceCapabilities::default()
        };
        Self::with_capabilities(back, Some(front))
    }

    /// Custom lenses; the facing fields are forced to match their slot
    pub fn with_capabilities(
        mut back: DeviceCapabilities,
        front: Option<DeviceCapabilities>,
    ) -> Self {
        back.facing = LensFacing::Back;
        let front = front.map(|mut caps| {
            caps.facing = LensFacing::Front;
            caps
        });
        Self {
            back,
            front,
            pixel_rate: None,
            shared: Arc::new(Mutex::new(Shared::default())),
            open: None,
        }
    }

    /// Limit the preview frame rate to `pixels_per_second / preview pixels`
    pub fn with_pixel_rate(mut self, pixels_per_second: u64) -> Self {
        self.pixel_rate = Some(pixels_per_second);
        self
    }

    pub fn handle(&self) -> VirtualCameraHandle {
        VirtualCameraHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn caps_for(&self, facing: LensFacing) -> BackendResult<&DeviceCapabilities> {
        match facing {
            LensFacing::Back => Ok(&self.back),
            LensFacing::Front => self
                .front
                .as_ref()
                .ok_or_else(|| BackendError::DeviceNotFound(format!("no {} camera", facing))),
        }
    }

    fn open_state(&mut self) -> BackendResult<&mut OpenState> {
        if lock(&self.shared).disconnected {
            return Err(BackendError::Disconnected);
        }
        self.open.as_mut().ok_or(BackendError::NotOpen)
    }

    fn frame_interval(&self, request: &FrameRequest, preview: Size) -> Duration {
        let mut fps = request.target_fps_range.upper.max(1) as f64;
        if let Some(rate) = self.pixel_rate {
            fps = fps.min(rate as f64 / preview.pixels().max(1) as f64);
        }
        Duration::from_secs_f64(1.0 / fps.max(0.5))
    }
}

impl CaptureDevice for VirtualCamera {
    fn name(&self) -> &str {
        "virtual"
    }

    fn query_capabilities(&mut self, facing: LensFacing) -> BackendResult<DeviceCapabilities> {
        lock(&self.shared).stats.capability_queries.push(facing);
        self.caps_for(facing).cloned()
    }

    fn open(&mut self, facing: LensFacing, events: DeviceEventSender) -> BackendResult<()> {
        if self.open.is_some() {
            self.close();
        }
        let caps = self.caps_for(facing)?.clone();
        {
            let mut shared = lock(&self.shared);
            if shared.faults.permission_denied {
                return Err(BackendError::PermissionDenied(
                    "camera access not granted".to_string(),
                ));
            }
            if shared.faults.fail_open {
                return Err(BackendError::OpenFailed(format!("{} camera busy", facing)));
            }
            shared.stats.opens += 1;
            shared.events = Some(events.clone());
            shared.disconnected = false;
        }

        let pacing = FramePacing::new();
        let frame_events = events.clone();
        let frame_loop = FrameLoopController::start(
            "virtual-frames",
            Arc::clone(&pacing),
            move |timestamp_ns| {
                if frame_events.send(DeviceEventKind::FrameDelivered { timestamp_ns }) {
                    LoopAction::Continue
                } else {
                    LoopAction::Stop
                }
            },
        );

        info!(facing = %facing, generation = events.generation(), "Virtual camera opened");
        self.open = Some(OpenState {
            facing,
            caps,
            events,
            streams: None,
            pacing,
            frame_loop,
        });
        Ok(())
    }

    fn configure(&mut self, config: &StreamConfig) -> BackendResult<()> {
        let fail = lock(&self.shared).faults.fail_configure;
        let open = self.open_state()?;
        if fail {
            return Err(BackendError::ConfigureFailed(format!(
                "cannot create surfaces for {}",
                config
            )));
        }
        let supported = &open.caps.supported_output_sizes;
        for size in [config.preview_size, config.still_size] {
            if !supported.contains(&size) {
                return Err(BackendError::ConfigureFailed(format!(
                    "unsupported output size {}",
                    size
                )));
            }
        }
        open.pacing.park();
        open.streams = Some(*config);
        lock(&self.shared).stats.configurations.push(*config);
        debug!(streams = %config, "Virtual camera configured");
        Ok(())
    }

    fn set_repeating(&mut self, request: &FrameRequest) -> BackendResult<()> {
        let open = self.open_state()?;
        let streams = open.streams.ok_or_else(|| {
            BackendError::RequestFailed("session not configured".to_string())
        })?;
        let pacing = Arc::clone(&open.pacing);
        let interval = self.frame_interval(request, streams.preview_size);
        pacing.set_interval(interval);

        let mut shared = lock(&self.shared);
        shared.stats.repeating_requests += 1;
        shared.stats.last_repeating = Some(request.clone());
        Ok(())
    }

    fn stop_repeating(&mut self) -> BackendResult<()> {
        let open = self.open_state()?;
        open.pacing.park();
        Ok(())
    }

    fn capture(&mut self, request: &FrameRequest) -> BackendResult<()> {
        let fail = lock(&self.shared).faults.fail_capture;
        let open = self.open_state()?;
        let streams = open.streams.ok_or_else(|| {
            BackendError::RequestFailed("session not configured".to_string())
        })?;
        // A still suspends the repeating request until it is re-issued
        open.pacing.park();

        let events = open.events.clone();
        let active = open.caps.sensor_active_rect;
        let orientation = request.jpeg_orientation.unwrap_or_default();
        let crop = request.crop_region;
        let facing = open.facing;

        {
            let mut shared = lock(&self.shared);
            shared.stats.captures += 1;
            shared.stats.last_capture = Some(request.clone());
        }

        let spawn = std::thread::Builder::new()
            .name("virtual-still".to_string())
            .spawn(move || {
                let kind = if fail {
                    DeviceEventKind::StillFailed("injected capture failure".to_string())
                } else {
                    match render_still(active, crop, streams.still_size) {
                        Ok(jpeg) => DeviceEventKind::StillCaptured {
                            jpeg: jpeg.into(),
                            orientation,
                        },
                        Err(e) => DeviceEventKind::StillFailed(e),
                    }
                };
                debug!(facing = %facing, "Virtual still finished");
                events.send(kind);
            });
        spawn
            .map(|_| ())
            .map_err(|e| BackendError::RequestFailed(e.to_string()))
    }

    fn close(&mut self) {
        if let Some(mut open) = self.open.take() {
            open.frame_loop.stop();
            let mut shared = lock(&self.shared);
            shared.stats.closes += 1;
            shared.events = None;
            shared.disconnected = false;
            info!(facing = %open.facing, "Virtual camera closed");
        } else {
            warn!("Virtual camera close without open device");
        }
    }
}

/// Size of the encoded still for a sensor crop
///
/// The crop is mapped from active-array coordinates onto the still output and
/// aligned down to whole codec blocks, so the ratio is only approximate.
pub fn still_output_size(active: Rect, crop: Rect, still: Size) -> Size {
    let sx = still.width as f64 / active.width.max(1) as f64;
    let sy = still.height as f64 / active.height.max(1) as f64;
    let w = (crop.width as f64 * sx).round() as u32;
    let h = (crop.height as f64 * sy).round() as u32;
    let align = |v: u32| (v / CODEC_BLOCK * CODEC_BLOCK).max(CODEC_BLOCK);
    Size::new(align(w.min(still.width)), align(h.min(still.height)))
}

fn render_still(active: Rect, crop: Rect, still: Size) -> Result<Vec<u8>, String> {
    let size = still_output_size(active, crop, still);
    let (w, h) = (size.width, size.height);
    let image: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(w, h, |x, y| {
        Rgb([
            (x * 255 / w.max(1)) as u8,
            (y * 255 / h.max(1)) as u8,
            128,
        ])
    });

    let mut buffer = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, 90);
    encoder
        .encode(image.as_raw(), w, h, image::ExtendedColorType::Rgb8)
        .map_err(|e| format!("virtual JPEG encoding failed: {}", e))?;
    Ok(buffer)
}
