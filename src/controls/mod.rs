// SPDX-License-Identifier: GPL-3.0-only

//! Capture parameter state
//!
//! [`ParameterState`] owns the mutable control vector (manual/auto, ISO,
//! exposure, EV, white balance, zoom, framing, flash, resolution, frame rate)
//! together with the EV baseline and the manual white balance gains.
//!
//! Every setter clamps its argument against the current device limits and
//! reports an [`ApplyScope`]: whether the change can be hot-applied to the
//! repeating request or needs the session to be reconfigured. Setters never
//! touch the device.

pub mod exposure;
pub mod white_balance;

pub use exposure::{EvBaseline, ExposureLimits, ResolvedExposure, resolve_ev};
pub use white_balance::{WbGains, WhiteBalance, clamp_kelvin};

use crate::backends::camera::{DeviceCapabilities, ValueRange};
use crate::config::EngineConfig;
use crate::constants::{self, DEFAULT_EXPOSURE_NS, DEFAULT_ISO, frame_duration_ns};
use crate::geometry::Size;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Framing (aspect ratio) mode, named in portrait terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectMode {
    /// Whole sensor, no aspect crop
    Full,
    /// 1:1
    Square,
    /// 3:4
    #[default]
    Portrait3x4,
    /// 9:16
    Tall9x16,
}

impl AspectMode {
    /// Cycle order used by [`ParameterState::cycle_aspect_mode`]
    pub const ALL: [AspectMode; 4] = [
        AspectMode::Full,
        AspectMode::Square,
        AspectMode::Portrait3x4,
        AspectMode::Tall9x16,
    ];

    /// Next mode in the cycle
    pub fn next(self) -> Self {
        match self {
            AspectMode::Full => AspectMode::Square,
            AspectMode::Square => AspectMode::Portrait3x4,
            AspectMode::Portrait3x4 => AspectMode::Tall9x16,
            AspectMode::Tall9x16 => AspectMode::Full,
        }
    }

    /// Width / height in portrait orientation, `None` for the full sensor
    pub fn portrait_ratio(self) -> Option<f64> {
        match self {
            AspectMode::Full => None,
            AspectMode::Square => Some(1.0),
            AspectMode::Portrait3x4 => Some(3.0 / 4.0),
            AspectMode::Tall9x16 => Some(9.0 / 16.0),
        }
    }

    /// Long side over short side this mode asks for, given the sensor size
    pub fn long_over_short(self, sensor: Size) -> f64 {
        match self.portrait_ratio() {
            Some(ratio) => 1.0 / ratio,
            None => sensor.long_over_short(),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AspectMode::Full => "FULL",
            AspectMode::Square => "1:1",
            AspectMode::Portrait3x4 => "3:4",
            AspectMode::Tall9x16 => "9:16",
        }
    }
}

impl std::fmt::Display for AspectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Flash operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlashMode {
    /// Flash never fires
    #[default]
    Off,
    /// Flash fires on stills when the AE decides it is needed
    Auto,
    /// Flash always fires on stills
    On,
    /// Continuous illumination in preview and stills
    Torch,
}

impl FlashMode {
    /// Cycle to the next mode: Off -> Auto -> On -> Torch -> Off
    pub fn next(self) -> Self {
        match self {
            FlashMode::Off => FlashMode::Auto,
            FlashMode::Auto => FlashMode::On,
            FlashMode::On => FlashMode::Torch,
            FlashMode::Torch => FlashMode::Off,
        }
    }
}

/// Still capture resolution target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolutionPreset {
    /// 12 megapixels (4000x3000)
    #[default]
    Mp12,
    /// 50 megapixels (8160x6120)
    Mp50,
}

impl ResolutionPreset {
    pub const ALL: [ResolutionPreset; 2] = [ResolutionPreset::Mp12, ResolutionPreset::Mp50];

    /// Nominal sensor-oriented output size
    pub fn size(self) -> Size {
        match self {
            ResolutionPreset::Mp12 => Size::new(4000, 3000),
            ResolutionPreset::Mp50 => Size::new(8160, 6120),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ResolutionPreset::Mp12 => ResolutionPreset::Mp50,
            ResolutionPreset::Mp50 => ResolutionPreset::Mp12,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ResolutionPreset::Mp12 => "12M",
            ResolutionPreset::Mp50 => "50M",
        }
    }
}

/// What a parameter change requires from the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApplyScope {
    /// Nothing changed
    Unchanged,
    /// Re-issue the repeating request
    HotApply,
    /// Rebuild the session surfaces
    Reconfigure,
}

impl ApplyScope {
    /// Combine two scopes, keeping the stronger requirement
    pub fn merge(self, other: ApplyScope) -> ApplyScope {
        self.max(other)
    }

    fn changed(changed: bool) -> ApplyScope {
        if changed {
            ApplyScope::HotApply
        } else {
            ApplyScope::Unchanged
        }
    }
}

/// Snapshot of the user-controlled capture parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureParameters {
    pub manual_enabled: bool,
    pub iso: i32,
    pub exposure_time_ns: i64,
    /// EV compensation in stops
    pub ev_compensation: f64,
    pub white_balance: WhiteBalance,
    pub zoom_factor: f32,
    pub aspect_mode: AspectMode,
    pub flash_mode: FlashMode,
    pub resolution_preset: ResolutionPreset,
    pub target_fps: u32,
}

impl CaptureParameters {
    /// Frame duration implied by the target frame rate (ns)
    pub fn frame_duration_ns(&self) -> i64 {
        frame_duration_ns(self.target_fps)
    }
}

/// Device limits the setters clamp against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLimits {
    pub iso_range: ValueRange<i32>,
    pub exposure_time_range: ValueRange<i64>,
    pub ae_compensation_range: ValueRange<f64>,
    pub max_digital_zoom: f32,
}

impl Default for ControlLimits {
    fn default() -> Self {
        // Conservative limits used until the first device query
        Self {
            iso_range: ValueRange::new(100, 1600),
            exposure_time_range: ValueRange::new(1_000_000, 100_000_000),
            ae_compensation_range: ValueRange::new(0.0, 0.0),
            max_digital_zoom: 1.0,
        }
    }
}

impl ControlLimits {
    fn from_capabilities(caps: &DeviceCapabilities) -> Self {
        Self {
            iso_range: caps.iso_range,
            exposure_time_range: caps.exposure_time_range,
            ae_compensation_range: caps.ae_compensation_range,
            max_digital_zoom: caps.max_digital_zoom.max(1.0),
        }
    }
}

/// Mutable control state owned by the session worker
#[derive(Debug, Clone)]
pub struct ParameterState {
    params: CaptureParameters,
    limits: ControlLimits,
    /// Lower ISO bound requested by the user, applied on top of the device range
    min_iso_floor: Option<i32>,
    baseline: Option<EvBaseline>,
    wb_gains: Option<WbGains>,
    margin_ns: i64,
    min_ev_exposure_ns: i64,
}

impl ParameterState {
    /// Fresh state seeded from the engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        let mut state = Self {
            params: CaptureParameters {
                manual_enabled: false,
                iso: DEFAULT_ISO,
                exposure_time_ns: DEFAULT_EXPOSURE_NS,
                ev_compensation: 0.0,
                white_balance: WhiteBalance::Auto,
                zoom_factor: 1.0,
                aspect_mode: config.default_aspect_mode,
                flash_mode: FlashMode::Off,
                resolution_preset: config.default_resolution_preset,
                target_fps: snap_target_fps(config.default_target_fps),
            },
            limits: ControlLimits::default(),
            min_iso_floor: None,
            baseline: None,
            wb_gains: None,
            margin_ns: config.exposure_margin_ns,
            min_ev_exposure_ns: config.min_ev_exposure_ns,
        };
        state.reclamp();
        state
    }

    /// Current parameter snapshot
    pub fn params(&self) -> &CaptureParameters {
        &self.params
    }

    pub fn limits(&self) -> &ControlLimits {
        &self.limits
    }

    /// EV baseline, if an EV move has happened since the last direct change
    pub fn ev_baseline(&self) -> Option<EvBaseline> {
        self.baseline
    }

    /// Manual white balance gains, present only for a fixed temperature
    pub fn wb_gains(&self) -> Option<WbGains> {
        self.wb_gains
    }

    /// Exposure headroom below the frame duration (ns)
    pub fn margin_ns(&self) -> i64 {
        self.margin_ns
    }

    /// ISO range after the user floor is applied
    pub fn effective_iso_range(&self) -> ValueRange<i32> {
        let range = self.limits.iso_range;
        match self.min_iso_floor {
            Some(floor) => ValueRange::new(floor.clamp(range.lower, range.upper), range.upper),
            None => range,
        }
    }

    /// Limits handed to the EV resolver
    pub fn exposure_limits(&self) -> ExposureLimits {
        ExposureLimits {
            min_exposure_ns: self
                .min_ev_exposure_ns
                .max(self.limits.exposure_time_range.lower),
            max_device_exposure_ns: self.limits.exposure_time_range.upper,
            iso_range: self.effective_iso_range(),
            frame_budget_ns: self.params.frame_duration_ns(),
            margin_ns: self.margin_ns,
        }
    }

    /// Longest exposure allowed at the current frame rate (ns)
    pub fn max_exposure_ns(&self) -> i64 {
        self.exposure_limits().exposure_window().upper
    }

    /// Adopt the limits of a freshly opened device and re-clamp everything
    pub fn apply_capabilities(&mut self, caps: &DeviceCapabilities) {
        self.limits = ControlLimits::from_capabilities(caps);
        self.reclamp();
        debug!(
            iso = self.params.iso,
            exposure_ns = self.params.exposure_time_ns,
            max_zoom = self.limits.max_digital_zoom,
            "Parameter limits updated from device"
        );
    }

    fn reclamp(&mut self) {
        let iso_range = self.effective_iso_range();
        self.params.iso = iso_range.clamp(self.params.iso);
        self.params.exposure_time_ns = self.clamp_exposure(self.params.exposure_time_ns);
        self.params.ev_compensation = self
            .limits
            .ae_compensation_range
            .clamp(self.params.ev_compensation);
        self.params.zoom_factor = self.clamp_zoom(self.params.zoom_factor);
    }

    fn clamp_exposure(&self, ns: i64) -> i64 {
        let device = self.limits.exposure_time_range;
        let max = self.max_exposure_ns().min(device.upper);
        ns.min(max).max(device.lower.min(max))
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        if zoom.is_nan() {
            return 1.0;
        }
        zoom.clamp(1.0, self.limits.max_digital_zoom.max(1.0))
    }

    // ===== Setters =====

    pub fn set_manual_enabled(&mut self, enabled: bool) -> ApplyScope {
        if enabled {
            return ApplyScope::changed(self.enter_manual());
        }
        let changed = self.params.manual_enabled;
        self.params.manual_enabled = false;
        ApplyScope::changed(changed)
    }

    /// Switch manual mode on, carrying a pending EV into explicit values
    ///
    /// Returns false when manual mode was already on.
    fn enter_manual(&mut self) -> bool {
        if self.params.manual_enabled {
            return false;
        }
        self.params.manual_enabled = true;
        if self.params.ev_compensation != 0.0 {
            self.resolve_manual_ev();
        }
        true
    }

    /// Resolve the stored EV against the baseline, taking the baseline from
    /// the current values on first use
    fn resolve_manual_ev(&mut self) {
        let baseline = *self.baseline.get_or_insert(EvBaseline {
            exposure_time_ns: self.params.exposure_time_ns,
            iso: self.params.iso,
        });
        let resolved = resolve_ev(
            self.params.ev_compensation,
            baseline,
            &self.exposure_limits(),
        );
        debug!(
            ev = self.params.ev_compensation,
            exposure_ns = resolved.exposure_time_ns,
            iso = resolved.iso,
            "EV resolved into manual exposure"
        );
        self.params.exposure_time_ns = resolved.exposure_time_ns;
        self.params.iso = resolved.iso;
    }

    pub fn set_iso(&mut self, iso: i32) -> ApplyScope {
        self.params.iso = self.effective_iso_range().clamp(iso);
        self.baseline = None;
        ApplyScope::HotApply
    }

    pub fn set_exposure_time_ns(&mut self, ns: i64) -> ApplyScope {
        self.params.exposure_time_ns = self.clamp_exposure(ns);
        self.baseline = None;
        ApplyScope::HotApply
    }

    /// Set EV compensation in stops
    ///
    /// In manual mode the value is resolved against the EV baseline right
    /// away so the preview reflects it; in auto mode it is passed to the AE.
    pub fn set_ev_compensation(&mut self, ev: f64) -> ApplyScope {
        let ev = if ev.is_nan() { 0.0 } else { ev };
        self.params.ev_compensation = self.limits.ae_compensation_range.clamp(ev);

        if self.params.manual_enabled {
            self.resolve_manual_ev();
        }
        ApplyScope::HotApply
    }

    /// Fix the white balance temperature (switches manual mode on)
    pub fn set_white_balance_kelvin(&mut self, kelvin: u32) -> ApplyScope {
        let kelvin = clamp_kelvin(kelvin);
        self.params.white_balance = WhiteBalance::Kelvin(kelvin);
        self.wb_gains = Some(WbGains::for_kelvin(kelvin));
        self.enter_manual();
        ApplyScope::HotApply
    }

    pub fn set_white_balance_auto(&mut self) -> ApplyScope {
        let changed = self.params.white_balance != WhiteBalance::Auto;
        self.params.white_balance = WhiteBalance::Auto;
        self.wb_gains = None;
        ApplyScope::changed(changed)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> ApplyScope {
        let zoom = self.clamp_zoom(zoom);
        let changed = zoom != self.params.zoom_factor;
        self.params.zoom_factor = zoom;
        ApplyScope::changed(changed)
    }

    /// Multiply the zoom by a pinch gesture's scale delta
    pub fn on_pinch_delta(&mut self, factor: f32) -> ApplyScope {
        if !factor.is_finite() || factor <= 0.0 {
            return ApplyScope::Unchanged;
        }
        self.set_zoom(self.params.zoom_factor * factor)
    }

    pub fn reset_zoom(&mut self) -> ApplyScope {
        self.set_zoom(1.0)
    }

    pub fn set_flash_mode(&mut self, mode: FlashMode) -> ApplyScope {
        let changed = self.params.flash_mode != mode;
        self.params.flash_mode = mode;
        ApplyScope::changed(changed)
    }

    /// Advance to the next framing mode and return it
    pub fn cycle_aspect_mode(&mut self) -> (AspectMode, ApplyScope) {
        let next = self.params.aspect_mode.next();
        self.params.aspect_mode = next;
        (next, ApplyScope::Reconfigure)
    }

    pub fn set_aspect_mode(&mut self, mode: AspectMode) -> ApplyScope {
        if self.params.aspect_mode == mode {
            return ApplyScope::Unchanged;
        }
        self.params.aspect_mode = mode;
        ApplyScope::Reconfigure
    }

    pub fn set_resolution_preset(&mut self, preset: ResolutionPreset) -> ApplyScope {
        if self.params.resolution_preset == preset {
            return ApplyScope::Unchanged;
        }
        self.params.resolution_preset = preset;
        ApplyScope::Reconfigure
    }

    /// Set the target frame rate, snapped to a supported rate
    pub fn set_target_fps(&mut self, fps: u32) -> ApplyScope {
        let fps = snap_target_fps(fps);
        let changed = fps != self.params.target_fps;
        self.params.target_fps = fps;
        self.params.exposure_time_ns = self.clamp_exposure(self.params.exposure_time_ns);
        ApplyScope::changed(changed)
    }

    /// Raise the lower ISO bound
    pub fn set_min_iso_floor(&mut self, iso: i32) -> ApplyScope {
        self.min_iso_floor = Some(iso);
        self.params.iso = self.effective_iso_range().clamp(self.params.iso);
        ApplyScope::HotApply
    }

    /// Everything automatic: AE on, AWB on, EV back to zero
    pub fn set_all_auto(&mut self) -> ApplyScope {
        self.params.manual_enabled = false;
        self.params.white_balance = WhiteBalance::Auto;
        self.wb_gains = None;
        self.params.ev_compensation = self.limits.ae_compensation_range.clamp(0.0);
        ApplyScope::HotApply
    }

    /// Manual exposure while keeping automatic white balance
    pub fn set_all_manual(&mut self) -> ApplyScope {
        self.enter_manual();
        self.params.white_balance = WhiteBalance::Auto;
        self.wb_gains = None;
        ApplyScope::HotApply
    }
}

/// Snap a requested frame rate onto the supported set
pub fn snap_target_fps(fps: u32) -> u32 {
    let rates = constants::fps::TARGET_RATES;
    rates
        .iter()
        .copied()
        .find(|&rate| fps <= rate)
        .unwrap_or(rates[rates.len() - 1])
}
