// SPDX-License-Identifier: GPL-3.0-only

//! Session worker
//!
//! Owns the device, the parameter state and the state machine. Commands from
//! [`super::CameraEngine`] and events from the device are drained by one
//! loop, so device calls are never made concurrently.
//!
//! Setters in one drained batch are folded together: the strongest
//! [`ApplyScope`] of the batch is applied once, before the next lifecycle
//! command or at the end of the batch.

use super::formats::{select_preview_size, select_still_size};
use super::machine::{Effect, ReconfigureReason, SessionEvent, SessionMachine, SessionState};
use crate::backends::camera::{
    BackendError, CaptureDevice, DeviceCapabilities, DeviceEvent, DeviceEventKind,
    DeviceEventSender, LensFacing, StreamConfig,
};
use crate::config::EngineConfig;
use crate::controls::{
    ApplyScope, AspectMode, CaptureParameters, FlashMode, ParameterState, ResolutionPreset,
};
use crate::errors::{AppError, AppResult, CameraError, PhotoError};
use crate::geometry::{CropGeometry, PreviewScaleMode, PreviewTransform, Rect, Size, crop_region};
use crate::monitor::{AdaptiveResolution, FpsMonitor, SharedFps, build_size_ladder};
use crate::pipelines::photo::{PhotoOutcome, PhotoPipeline, StillJob};
use crate::request::{FrameRequest, RequestMode, jpeg_orientation};
use std::collections::VecDeque;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub(crate) type PhotoReply = oneshot::Sender<AppResult<PhotoOutcome>>;

/// Intents queued by the control surface
pub(crate) enum Command {
    SetManualEnabled(bool),
    SetIso(i32),
    SetExposureTimeNs(i64),
    SetEvCompensation(f64),
    SetWhiteBalanceKelvin(u32),
    SetWhiteBalanceAuto,
    SetZoom(f32),
    PinchDelta(f32),
    SetAspectMode(AspectMode),
    SetFlashMode(FlashMode),
    SetResolutionPreset(ResolutionPreset),
    SetTargetFps(u32),
    SetAllAuto,
    SetAllManual,
    SetMinIsoFloor(i32),
    SetAdaptiveResolution(bool),
    SetPreviewScaleMode(PreviewScaleMode),
    SetViewportSize(Option<Size>),
    SetDeviceOrientation(i32),
    TakePicture(PhotoReply),
    SwitchFacing,
    Open,
    /// Release the device, then acknowledge
    Pause(SyncSender<()>),
    /// Release the device, finish pending photos, acknowledge and exit
    Shutdown(SyncSender<()>),
}

type FpsCallback = Box<dyn Fn(f64) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&AppError) + Send + Sync>;

/// Caller-registered callbacks, invoked on the session worker
#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    fps: Arc<Mutex<Option<FpsCallback>>>,
    error: Arc<Mutex<Option<ErrorCallback>>>,
}

impl Callbacks {
    pub(crate) fn set_fps(&self, callback: FpsCallback) {
        *recover(self.fps.lock()) = Some(callback);
    }

    pub(crate) fn set_error(&self, callback: ErrorCallback) {
        *recover(self.error.lock()) = Some(callback);
    }

    fn fps_changed(&self, fps: f64) {
        let slot = recover(self.fps.lock());
        if let Some(callback) = slot.as_ref() {
            callback(fps);
        }
    }

    fn report_error(&self, err: &AppError) {
        let slot = recover(self.error.lock());
        if let Some(callback) = slot.as_ref() {
            callback(err);
        }
    }
}

/// Keep using a callback slot after a callback panicked while holding it
fn recover<'a, T>(
    result: std::sync::LockResult<std::sync::MutexGuard<'a, T>>,
) -> std::sync::MutexGuard<'a, T> {
    result.unwrap_or_else(|poisoned| {
        warn!("Callback slot poisoned by a panicking callback, recovering");
        poisoned.into_inner()
    })
}

/// Sending halves of the state the engine handle reads
pub(crate) struct Published {
    pub state: watch::Sender<SessionState>,
    pub params: watch::Sender<CaptureParameters>,
    pub transform: watch::Sender<PreviewTransform>,
    pub fps: SharedFps,
    pub callbacks: Callbacks,
}

/// Device open plus the streams negotiated for it
struct ActiveSession {
    caps: DeviceCapabilities,
    streams: StreamConfig,
}

/// Still accepted by the device and not yet answered
struct InFlightStill {
    reply: PhotoReply,
    aspect: AspectMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub(crate) struct SessionRunner {
    device: Box<dyn CaptureDevice>,
    machine: SessionMachine,
    params: ParameterState,
    config: EngineConfig,
    pipeline: PhotoPipeline,
    published: Published,
    event_tx: mpsc::UnboundedSender<DeviceEvent>,
    /// Incremented on every release; events of older opens are dropped
    generation: u64,
    device_open: bool,
    session: Option<ActiveSession>,
    /// Reply of the capture currently asking for admission
    admitting: Option<PhotoReply>,
    still: Option<InFlightStill>,
    monitor: FpsMonitor,
    adaptive: AdaptiveResolution,
    adaptive_enabled: bool,
    /// Preview size chosen by adaptive resolution, used on the next open
    preview_rung: Option<Size>,
    viewport: Option<Size>,
    scale_mode: PreviewScaleMode,
    device_rotation: i32,
    pending_scope: ApplyScope,
    pending_reason: Option<ReconfigureReason>,
    photos: JoinSet<()>,
}

impl SessionRunner {
    pub(crate) fn new(
        device: Box<dyn CaptureDevice>,
        config: EngineConfig,
        pipeline: PhotoPipeline,
        published: Published,
        event_tx: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        let params = ParameterState::new(&config);
        published.params.send_replace(*params.params());
        Self {
            device,
            machine: SessionMachine::new(LensFacing::Back),
            monitor: FpsMonitor::new(config.fps_window(), config.fps_smoothing_weight),
            adaptive: AdaptiveResolution::new(
                config.adaptive_hysteresis,
                config.adaptive_min_interval(),
            ),
            adaptive_enabled: config.adaptive_resolution,
            scale_mode: config.preview_scale_mode,
            params,
            config,
            pipeline,
            published,
            event_tx,
            generation: 0,
            device_open: false,
            session: None,
            admitting: None,
            still: None,
            preview_rung: None,
            viewport: None,
            device_rotation: 0,
            pending_scope: ApplyScope::Unchanged,
            pending_reason: None,
            photos: JoinSet::new(),
        }
    }

    /// Worker loop; returns after shutdown or when the engine handle is gone
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<DeviceEvent>,
    ) {
        info!(device = self.device.name(), "Camera session worker started");
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("Engine handle dropped, closing session");
                        self.close_and_drain().await;
                        break;
                    };
                    let mut batch = vec![command];
                    while let Ok(next) = commands.try_recv() {
                        batch.push(next);
                    }
                    if self.handle_batch(batch).await == Flow::Stop {
                        break;
                    }
                }
                Some(event) = events.recv() => self.on_device_event(event),
                Some(joined) = self.photos.join_next(), if !self.photos.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Photo task ended abnormally");
                    }
                }
            }
        }
        info!("Camera session worker stopped");
    }

    async fn handle_batch(&mut self, batch: Vec<Command>) -> Flow {
        for command in batch {
            match command {
                Command::TakePicture(reply) => {
                    self.flush();
                    self.admitting = Some(reply);
                    self.feed(SessionEvent::TakePicture);
                }
                Command::SwitchFacing => {
                    self.flush();
                    self.switch_facing();
                }
                Command::Open => {
                    self.flush();
                    self.feed(SessionEvent::Open);
                }
                Command::Pause(ack) => {
                    self.flush();
                    self.feed(SessionEvent::Close);
                    self.drain_photos().await;
                    let _ = ack.send(());
                }
                Command::Shutdown(ack) => {
                    self.close_and_drain().await;
                    let _ = ack.send(());
                    return Flow::Stop;
                }
                setter => self.apply_setter(setter),
            }
        }
        self.flush();
        Flow::Continue
    }

    fn apply_setter(&mut self, command: Command) {
        let params = &mut self.params;
        let scope = match command {
            Command::SetManualEnabled(enabled) => params.set_manual_enabled(enabled),
            Command::SetIso(iso) => params.set_iso(iso),
            Command::SetExposureTimeNs(ns) => params.set_exposure_time_ns(ns),
            Command::SetEvCompensation(ev) => params.set_ev_compensation(ev),
            Command::SetWhiteBalanceKelvin(kelvin) => params.set_white_balance_kelvin(kelvin),
            Command::SetWhiteBalanceAuto => params.set_white_balance_auto(),
            Command::SetZoom(zoom) => params.set_zoom(zoom),
            Command::PinchDelta(factor) => params.on_pinch_delta(factor),
            Command::SetFlashMode(mode) => params.set_flash_mode(mode),
            Command::SetTargetFps(fps) => params.set_target_fps(fps),
            Command::SetAllAuto => params.set_all_auto(),
            Command::SetAllManual => params.set_all_manual(),
            Command::SetMinIsoFloor(iso) => params.set_min_iso_floor(iso),
            Command::SetAspectMode(mode) => {
                let scope = params.set_aspect_mode(mode);
                if scope == ApplyScope::Reconfigure {
                    self.preview_rung = None;
                    self.pending_reason = Some(ReconfigureReason::AspectMode);
                }
                scope
            }
            Command::SetResolutionPreset(preset) => {
                let scope = params.set_resolution_preset(preset);
                if scope == ApplyScope::Reconfigure {
                    self.pending_reason = Some(ReconfigureReason::Resolution);
                }
                scope
            }
            Command::SetAdaptiveResolution(enabled) => {
                self.set_adaptive(enabled);
                ApplyScope::Unchanged
            }
            Command::SetPreviewScaleMode(mode) => {
                self.scale_mode = mode;
                self.publish_transform();
                ApplyScope::Unchanged
            }
            Command::SetViewportSize(viewport) => {
                self.viewport = viewport;
                self.publish_transform();
                ApplyScope::Unchanged
            }
            Command::SetDeviceOrientation(degrees) => {
                self.device_rotation = degrees;
                ApplyScope::Unchanged
            }
            Command::TakePicture(_)
            | Command::SwitchFacing
            | Command::Open
            | Command::Pause(_)
            | Command::Shutdown(_) => ApplyScope::Unchanged,
        };
        self.pending_scope = self.pending_scope.merge(scope);
    }

    /// Apply the folded scope of the setters seen so far
    fn flush(&mut self) {
        let scope = std::mem::replace(&mut self.pending_scope, ApplyScope::Unchanged);
        self.publish_params();
        match scope {
            ApplyScope::Unchanged => {}
            ApplyScope::HotApply => self.feed(SessionEvent::HotApply),
            ApplyScope::Reconfigure => {
                let reason = self
                    .pending_reason
                    .take()
                    .unwrap_or(ReconfigureReason::AspectMode);
                info!(reason = ?reason, state = ?self.machine.state(), "Session reconfiguration requested");
                self.feed(SessionEvent::Reconfigure(reason));
            }
        }
    }

    fn switch_facing(&mut self) {
        let facing = self.machine.toggle_facing();
        self.params.reset_zoom();
        self.preview_rung = None;
        self.publish_params();
        info!(facing = %facing, "Switching camera facing, zoom reset to 1.0");
        self.feed(SessionEvent::Reconfigure(ReconfigureReason::Facing));
    }

    fn set_adaptive(&mut self, enabled: bool) {
        self.adaptive_enabled = enabled;
        if !enabled {
            self.preview_rung = None;
            return;
        }
        if let Some(session) = &self.session {
            let ladder = self.ladder_for(&session.caps);
            self.adaptive
                .set_ladder(ladder, session.streams.preview_size, Instant::now());
        }
        info!(enabled, "Adaptive resolution toggled");
    }

    /// Run an event through the machine and execute the resulting effects,
    /// feeding their outcomes back until the machine settles
    fn feed(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let effects = self.machine.handle(event);
            self.publish_state();
            for effect in effects {
                if let Some(next) = self.execute(effect) {
                    queue.push_back(next);
                }
            }
        }
    }

    fn execute(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::OpenDevice(facing) => Some(match self.open_device(facing) {
                Ok(()) => SessionEvent::DeviceReady,
                Err(err) => SessionEvent::Failed(err),
            }),
            Effect::StartRepeating | Effect::UpdateRepeating | Effect::ResumeRepeating => {
                self.issue_repeating()
            }
            Effect::IssueStill => self.issue_still(),
            Effect::ReleaseDevice => {
                self.release_device();
                (self.machine.state() == SessionState::Closing).then_some(SessionEvent::Released)
            }
            Effect::RejectCapture(err) => {
                warn!(error = %err, "Still capture rejected");
                if let Some(reply) = self.admitting.take() {
                    let _ = reply.send(Err(err));
                }
                None
            }
            Effect::AbortStill(err) => {
                if let Some(still) = self.still.take() {
                    error!(error = %err, "In-flight still aborted");
                    let _ = still.reply.send(Err(err.into()));
                }
                None
            }
            Effect::ReportError(err) => {
                error!(error = %err, "Camera session error");
                self.published.callbacks.report_error(&AppError::Camera(err));
                None
            }
        }
    }

    fn open_device(&mut self, facing: LensFacing) -> Result<(), CameraError> {
        let caps = self.device.query_capabilities(facing)?;
        self.params.apply_capabilities(&caps);
        self.publish_params();
        let streams = self.select_streams(&caps)?;

        let events = DeviceEventSender::new(self.generation, self.event_tx.clone());
        self.device.open(facing, events)?;
        self.device_open = true;
        self.device.configure(&streams)?;
        info!(
            facing = %facing,
            device = self.device.name(),
            streams = %streams,
            "Camera opened"
        );

        self.monitor.reset();
        if self.adaptive_enabled {
            let ladder = self.ladder_for(&caps);
            self.adaptive
                .set_ladder(ladder, streams.preview_size, Instant::now());
        }
        self.session = Some(ActiveSession { caps, streams });
        self.publish_transform();
        Ok(())
    }

    fn target_long_over_short(&self, caps: &DeviceCapabilities) -> f64 {
        self.params
            .params()
            .aspect_mode
            .long_over_short(caps.sensor_active_rect.size())
    }

    fn ladder_for(&self, caps: &DeviceCapabilities) -> Vec<Size> {
        build_size_ladder(
            &caps.supported_output_sizes,
            self.target_long_over_short(caps),
            self.config.max_preview_size,
        )
    }

    fn select_streams(&self, caps: &DeviceCapabilities) -> Result<StreamConfig, CameraError> {
        let sizes = &caps.supported_output_sizes;
        let target = self.target_long_over_short(caps);
        let rung = self.preview_rung.filter(|size| sizes.contains(size));
        let preview = match rung {
            Some(size) => Some(size),
            None => select_preview_size(sizes, target, self.config.max_preview_size),
        };
        let still = select_still_size(sizes, target, self.params.params().resolution_preset);
        match (preview, still) {
            (Some(preview_size), Some(still_size)) => Ok(StreamConfig {
                preview_size,
                still_size,
            }),
            _ => Err(CameraError::SessionConfigureFailed(format!(
                "no output size for {} framing",
                self.params.params().aspect_mode
            ))),
        }
    }

    fn release_device(&mut self) {
        if self.device_open {
            if let Err(e) = self.device.stop_repeating() {
                debug!(error = %e, "Stop repeating before close failed");
            }
            self.device.close();
            self.device_open = false;
            info!(device = self.device.name(), "Camera closed");
        }
        self.session = None;
        self.generation += 1;
        self.monitor.reset();
    }

    fn crop_for(&self, caps: &DeviceCapabilities) -> Rect {
        let params = self.params.params();
        crop_region(
            caps.sensor_active_rect,
            &CropGeometry {
                aspect: params.aspect_mode,
                zoom: params.zoom_factor,
                max_zoom: caps.max_digital_zoom,
                tall_zoom_bias: self.config.tall_zoom_bias,
            },
        )
    }

    fn device_failure(err: BackendError) -> SessionEvent {
        match err {
            BackendError::Disconnected => SessionEvent::Disconnected,
            other => SessionEvent::Failed(other.into()),
        }
    }

    fn issue_repeating(&mut self) -> Option<SessionEvent> {
        let session = self.session.as_ref()?;
        let crop = self.crop_for(&session.caps);
        let request = FrameRequest::build(&self.params, &session.caps, crop, RequestMode::Preview);
        match self.device.set_repeating(&request) {
            Ok(()) => {
                debug!(
                    crop = %crop,
                    manual = self.params.params().manual_enabled,
                    fps = self.params.params().target_fps,
                    "Repeating request issued"
                );
                None
            }
            Err(e) => {
                error!(error = %e, "Repeating request failed");
                Some(Self::device_failure(e))
            }
        }
    }

    fn issue_still(&mut self) -> Option<SessionEvent> {
        let Some(reply) = self.admitting.take() else {
            return Some(SessionEvent::StillFinished);
        };
        let Some(session) = self.session.as_ref() else {
            let _ = reply.send(Err(CameraError::NotStreaming.into()));
            return Some(SessionEvent::StillFinished);
        };

        let orientation = jpeg_orientation(&session.caps, self.device_rotation);
        let crop = self.crop_for(&session.caps);
        let request = FrameRequest::build(&self.params, &session.caps, crop, RequestMode::Still)
            .with_jpeg_orientation(orientation);
        let aspect = self.params.params().aspect_mode;
        info!(crop = %crop, orientation = %orientation, aspect = %aspect, "Capturing still");

        match self.device.capture(&request) {
            Ok(()) => {
                self.still = Some(InFlightStill { reply, aspect });
                None
            }
            Err(BackendError::Disconnected) => {
                // Failed by the abort of the disconnect transition
                self.still = Some(InFlightStill { reply, aspect });
                Some(SessionEvent::Disconnected)
            }
            Err(e) => {
                error!(error = %e, "Still request failed");
                let err = AppError::Photo(PhotoError::CaptureFailed(e.to_string()));
                self.published.callbacks.report_error(&err);
                let _ = reply.send(Err(err));
                Some(SessionEvent::StillFinished)
            }
        }
    }

    fn on_device_event(&mut self, event: DeviceEvent) {
        if event.generation != self.generation {
            return;
        }
        match event.kind {
            DeviceEventKind::FrameDelivered { .. } => self.on_frame(),
            DeviceEventKind::StillCaptured { jpeg, orientation } => {
                match self.still.take() {
                    Some(still) => {
                        let job = StillJob {
                            jpeg,
                            orientation,
                            aspect: still.aspect,
                        };
                        self.spawn_photo(still, job);
                    }
                    None => debug!("Still result without a pending capture"),
                }
                self.feed(SessionEvent::StillFinished);
            }
            DeviceEventKind::StillFailed(reason) => {
                if let Some(still) = self.still.take() {
                    error!(reason = %reason, "Still capture failed");
                    let err = AppError::Photo(PhotoError::CaptureFailed(reason));
                    self.published.callbacks.report_error(&err);
                    let _ = still.reply.send(Err(err));
                }
                self.feed(SessionEvent::StillFinished);
            }
            DeviceEventKind::Disconnected => {
                warn!("Camera device disconnected");
                self.feed(SessionEvent::Disconnected);
            }
        }
    }

    fn spawn_photo(&mut self, still: InFlightStill, job: StillJob) {
        let pipeline = self.pipeline.clone();
        let callbacks = self.published.callbacks.clone();
        self.photos.spawn(async move {
            let result = pipeline.process(job).await.map_err(AppError::from);
            if let Err(e) = &result {
                error!(error = %e, "Photo pipeline failed");
                callbacks.report_error(e);
            }
            let _ = still.reply.send(result);
        });
    }

    fn on_frame(&mut self) {
        let now = Instant::now();
        let Some(sample) = self.monitor.on_frame(now) else {
            return;
        };
        self.published.fps.store(sample.smoothed_fps);
        self.published.callbacks.fps_changed(sample.smoothed_fps);
        debug!(
            instantaneous = sample.instantaneous_fps,
            smoothed = sample.smoothed_fps,
            "Frame rate sample"
        );

        if !self.adaptive_enabled || self.machine.state() != SessionState::Streaming {
            return;
        }
        let target = self.params.params().target_fps;
        if let Some(switch) = self.adaptive.evaluate(sample.smoothed_fps, target, now) {
            self.params.reset_zoom();
            self.preview_rung = Some(switch.size);
            self.publish_params();
            info!(
                size = %switch.size,
                change = ?switch.change,
                smoothed_fps = sample.smoothed_fps,
                target_fps = target,
                "Adaptive resolution changed preview size, zoom reset to 1.0"
            );
            self.feed(SessionEvent::Reconfigure(ReconfigureReason::AdaptiveResolution));
        }
    }

    async fn close_and_drain(&mut self) {
        self.pending_scope = ApplyScope::Unchanged;
        self.feed(SessionEvent::Close);
        self.drain_photos().await;
    }

    /// Wait for every photo task to save and answer its ticket
    async fn drain_photos(&mut self) {
        if !self.photos.is_empty() {
            debug!(pending = self.photos.len(), "Waiting for photo tasks");
        }
        while let Some(joined) = self.photos.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Photo task ended abnormally");
            }
        }
    }

    fn publish_state(&self) {
        let state = self.machine.state();
        self.published.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn publish_params(&self) {
        let params = *self.params.params();
        self.published.params.send_if_modified(|current| {
            if *current == params {
                return false;
            }
            *current = params;
            true
        });
    }

    /// Recompute the buffer-to-viewport mapping for the open session
    fn publish_transform(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let mut buffer = session.streams.preview_size;
        if session.caps.sensor_orientation.swaps_dimensions() {
            buffer = buffer.transposed();
        }
        let viewport = self.viewport.unwrap_or(buffer);
        let transform = PreviewTransform::compute(buffer, viewport, self.scale_mode);
        debug!(
            buffer = %buffer,
            viewport = %viewport,
            scale = transform.scale,
            "Preview transform updated"
        );
        self.published.transform.send_replace(transform);
    }
}
