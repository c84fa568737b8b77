// SPDX-License-Identifier: GPL-3.0-only

//! Public control surface
//!
//! Every method only enqueues an intent for the session worker and returns.
//! The exceptions are [`CameraEngine::pause`] and [`CameraEngine::shutdown`],
//! which block until the worker has released the device.

use super::machine::SessionState;
use super::runner::{Callbacks, Command, Published, SessionRunner};
use crate::backends::camera::CaptureDevice;
use crate::config::EngineConfig;
use crate::controls::{AspectMode, CaptureParameters, FlashMode, ParameterState, ResolutionPreset};
use crate::errors::{AppError, AppResult, CameraError};
use crate::geometry::{PreviewScaleMode, PreviewTransform, Size};
use crate::monitor::SharedFps;
use crate::pipelines::photo::{PhotoEncoder, PhotoOutcome, PhotoPipeline};
use crate::storage::ImageSink;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Pending result of [`CameraEngine::take_picture`]
pub struct PhotoTicket {
    rx: oneshot::Receiver<AppResult<PhotoOutcome>>,
}

impl PhotoTicket {
    /// Block until the photo is saved or the capture failed
    ///
    /// Must not be called from inside an async runtime; use [`Self::recv`]
    /// there.
    pub fn wait(self) -> AppResult<PhotoOutcome> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(CameraError::EngineStopped.into()))
    }

    /// Await the photo
    pub async fn recv(self) -> AppResult<PhotoOutcome> {
        self.rx
            .await
            .unwrap_or(Err(CameraError::EngineStopped.into()))
    }
}

/// Camera control engine
///
/// Created closed; call [`Self::resume`] to open the device.
pub struct CameraEngine {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    params: watch::Receiver<CaptureParameters>,
    transform: watch::Receiver<PreviewTransform>,
    fps: SharedFps,
    callbacks: Callbacks,
    /// Mirror of the framing mode so cycling can answer synchronously
    aspect: Mutex<AspectMode>,
    worker: Option<JoinHandle<()>>,
}

impl CameraEngine {
    /// Spawn the session worker for `device`
    pub fn start(
        device: impl CaptureDevice + 'static,
        sink: Arc<dyn ImageSink>,
        config: EngineConfig,
    ) -> AppResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AppError::Other(format!("Failed to build session runtime: {}", e)))?;

        let initial = *ParameterState::new(&config).params();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Closed);
        let (params_tx, params_rx) = watch::channel(initial);
        let (transform_tx, transform_rx) = watch::channel(PreviewTransform::default());
        let fps = SharedFps::new();
        let callbacks = Callbacks::default();

        let pipeline = PhotoPipeline::new(PhotoEncoder::new(config.jpeg_quality), sink);
        let published = Published {
            state: state_tx,
            params: params_tx,
            transform: transform_tx,
            fps: fps.clone(),
            callbacks: callbacks.clone(),
        };
        let runner = SessionRunner::new(Box::new(device), config, pipeline, published, event_tx);

        let worker = std::thread::Builder::new()
            .name("camera-session".to_string())
            .spawn(move || runtime.block_on(runner.run(command_rx, event_rx)))
            .map_err(|e| AppError::Other(format!("Failed to spawn session worker: {}", e)))?;

        info!("Camera engine started");
        Ok(Self {
            commands: command_tx,
            state: state_rx,
            params: params_rx,
            transform: transform_rx,
            fps,
            callbacks,
            aspect: Mutex::new(initial.aspect_mode),
            worker: Some(worker),
        })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Command dropped, session worker has stopped");
        }
    }

    // ===== Lifecycle =====

    /// Open the device (or retry after an error)
    pub fn resume(&self) {
        self.send(Command::Open);
    }

    /// Release the device; blocks until it is closed and every photo
    /// already in the pipeline has been saved and answered
    pub fn pause(&self) -> AppResult<()> {
        let (ack_tx, ack_rx) = std::sync::mpsc::sync_channel(1);
        self.send(Command::Pause(ack_tx));
        ack_rx
            .recv()
            .map_err(|_| AppError::Camera(CameraError::EngineStopped))
    }

    /// Release the device, wait for pending photos and stop the worker
    pub fn shutdown(&mut self) -> AppResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let (ack_tx, ack_rx) = std::sync::mpsc::sync_channel(1);
        self.send(Command::Shutdown(ack_tx));
        if ack_rx.recv().is_err() {
            warn!("Session worker exited before acknowledging shutdown");
        }
        worker
            .join()
            .map_err(|_| AppError::Other("Session worker panicked".to_string()))?;
        info!("Camera engine stopped");
        Ok(())
    }

    pub fn switch_camera_facing(&self) {
        self.send(Command::SwitchFacing);
    }

    /// Queue a still capture
    ///
    /// Rejected with `CaptureInProgress` while another still is in flight and
    /// with `NotStreaming` when the session is not streaming.
    pub fn take_picture(&self) -> PhotoTicket {
        let (tx, rx) = oneshot::channel();
        self.send(Command::TakePicture(tx));
        PhotoTicket { rx }
    }

    // ===== Parameters =====

    pub fn set_manual_enabled(&self, enabled: bool) {
        self.send(Command::SetManualEnabled(enabled));
    }

    pub fn set_iso(&self, iso: i32) {
        self.send(Command::SetIso(iso));
    }

    pub fn set_exposure_time_ns(&self, ns: i64) {
        self.send(Command::SetExposureTimeNs(ns));
    }

    /// EV compensation in stops
    pub fn set_ev_compensation(&self, ev: f64) {
        self.send(Command::SetEvCompensation(ev));
    }

    /// Fixed white balance temperature; also enables manual mode
    pub fn set_white_balance_kelvin(&self, kelvin: u32) {
        self.send(Command::SetWhiteBalanceKelvin(kelvin));
    }

    pub fn set_white_balance_auto(&self) {
        self.send(Command::SetWhiteBalanceAuto);
    }

    pub fn set_zoom(&self, zoom: f32) {
        self.send(Command::SetZoom(zoom));
    }

    pub fn on_pinch_delta(&self, factor: f32) {
        self.send(Command::PinchDelta(factor));
    }

    /// Advance to the next framing mode; rebuilds the session
    pub fn cycle_aspect_mode(&self) -> AspectMode {
        let mut aspect = match self.aspect.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *aspect = aspect.next();
        self.send(Command::SetAspectMode(*aspect));
        *aspect
    }

    pub fn set_aspect_mode(&self, mode: AspectMode) {
        let mut aspect = match self.aspect.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *aspect = mode;
        self.send(Command::SetAspectMode(mode));
    }

    pub fn set_flash_mode(&self, mode: FlashMode) {
        self.send(Command::SetFlashMode(mode));
    }

    pub fn set_resolution_preset(&self, preset: ResolutionPreset) {
        self.send(Command::SetResolutionPreset(preset));
    }

    /// Snapped to 60 or 120
    pub fn set_target_fps(&self, fps: u32) {
        self.send(Command::SetTargetFps(fps));
    }

    pub fn set_all_auto(&self) {
        self.send(Command::SetAllAuto);
    }

    pub fn set_all_manual(&self) {
        self.send(Command::SetAllManual);
    }

    pub fn set_min_iso_floor(&self, iso: i32) {
        self.send(Command::SetMinIsoFloor(iso));
    }

    // ===== Preview =====

    pub fn set_adaptive_resolution_enabled(&self, enabled: bool) {
        self.send(Command::SetAdaptiveResolution(enabled));
    }

    pub fn set_preview_scale_mode(&self, mode: PreviewScaleMode) {
        self.send(Command::SetPreviewScaleMode(mode));
    }

    /// On-screen preview size; zero in either dimension means "same as the
    /// buffer"
    pub fn set_viewport_size(&self, width: u32, height: u32) {
        let viewport = (width > 0 && height > 0).then(|| Size::new(width, height));
        self.send(Command::SetViewportSize(viewport));
    }

    /// Device rotation in degrees clockwise, used for the still orientation
    pub fn set_device_orientation(&self, degrees: i32) {
        self.send(Command::SetDeviceOrientation(degrees));
    }

    // ===== Readback =====

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Poll until the session reaches `target`; false on timeout
    pub fn wait_for_state(&self, target: SessionState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state() == target {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Snapshot of the parameters as last applied by the worker
    pub fn parameters(&self) -> CaptureParameters {
        *self.params.borrow()
    }

    /// Latest smoothed preview frame rate (0 before the first sample)
    pub fn smoothed_fps(&self) -> f64 {
        self.fps.load()
    }

    /// Called on the session worker for every FPS sample
    pub fn on_fps_changed(&self, callback: impl Fn(f64) + Send + Sync + 'static) {
        self.callbacks.set_fps(Box::new(callback));
    }

    /// Called on the session worker for session and capture failures
    pub fn on_error(&self, callback: impl Fn(&AppError) + Send + Sync + 'static) {
        self.callbacks.set_error(Box::new(callback));
    }

    pub fn preview_transform(&self) -> PreviewTransform {
        *self.transform.borrow()
    }

    /// Overlay feed; changes on every transform recomputation
    pub fn subscribe_preview_transform(&self) -> watch::Receiver<PreviewTransform> {
        self.transform.clone()
    }
}

impl Drop for CameraEngine {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.shutdown() {
                warn!(error = %e, "Camera engine shutdown on drop failed");
            }
        }
    }
}
