// SPDX-License-Identifier: GPL-3.0-only

//! Frame request synthesis
//!
//! Folds the parameter state, the device limits and the current crop region
//! into one immutable [`FrameRequest`]. The same builder serves the repeating
//! preview request and the one-shot still request; they differ only in the
//! quality flags, flash firing and the orientation tag.
//!
//! ```text
//! ParameterState ──┐
//! Capabilities  ───┼──► FrameRequest::build(mode) ──► device
//! CropRegion    ───┘
//! ```

use crate::backends::camera::{DeviceCapabilities, LensFacing, SensorRotation, ValueRange};
use crate::controls::{FlashMode, ParameterState, WbGains, WhiteBalance, resolve_ev};
use crate::geometry::Rect;

/// Which stream a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Repeating request driving the preview surface
    Preview,
    /// One-shot high quality still
    Still,
}

/// Overall 3A control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Auto,
    Off,
}

/// Auto exposure mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeMode {
    Off,
    On,
    OnAutoFlash,
    OnAlwaysFlash,
}

/// Auto white balance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwbMode {
    Auto,
    /// Fixed gains from [`FrameRequest::wb_gains`]
    Off,
}

/// Flash unit behavior for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashFiring {
    Off,
    /// Fire once for this frame
    Single,
    /// Continuous illumination
    Torch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfMode {
    ContinuousPicture,
}

/// Noise reduction / edge enhancement / hot pixel processing level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingQuality {
    Fast,
    HighQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Antibanding {
    Hz60,
}

/// Complete, immutable set of controls for one capture request
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub mode: RequestMode,
    pub control_mode: ControlMode,
    pub ae_mode: AeMode,
    /// Explicit sensor exposure, manual mode only (ns)
    pub exposure_time_ns: Option<i64>,
    /// Explicit sensitivity, manual mode only
    pub iso: Option<i32>,
    /// Explicit frame duration, manual mode only (ns)
    pub frame_duration_ns: Option<i64>,
    pub target_fps_range: ValueRange<u32>,
    /// AE compensation in stops, auto mode only
    pub ev_compensation: Option<f64>,
    pub awb_mode: AwbMode,
    pub wb_gains: Option<WbGains>,
    /// `None` when the device has no flash unit
    pub flash: Option<FlashFiring>,
    pub af_mode: AfMode,
    pub antibanding: Option<Antibanding>,
    pub noise_reduction: Option<ProcessingQuality>,
    pub edge: Option<ProcessingQuality>,
    pub hot_pixel: Option<ProcessingQuality>,
    pub crop_region: Rect,
    /// Rotation the encoded still must be turned by, still mode only
    pub jpeg_orientation: Option<SensorRotation>,
}

impl FrameRequest {
    /// Build a request from the current state
    pub fn build(
        state: &ParameterState,
        caps: &DeviceCapabilities,
        crop_region: Rect,
        mode: RequestMode,
    ) -> Self {
        let params = state.params();
        let still = mode == RequestMode::Still;
        let fps = params.target_fps;

        let mut request = FrameRequest {
            mode,
            control_mode: ControlMode::Auto,
            ae_mode: AeMode::On,
            exposure_time_ns: None,
            iso: None,
            frame_duration_ns: None,
            target_fps_range: ValueRange::new(fps, fps),
            ev_compensation: None,
            awb_mode: AwbMode::Auto,
            wb_gains: None,
            flash: None,
            af_mode: AfMode::ContinuousPicture,
            antibanding: None,
            noise_reduction: None,
            edge: None,
            hot_pixel: None,
            crop_region,
            jpeg_orientation: None,
        };

        if params.manual_enabled {
            let limits = state.exposure_limits();
            let (mut exposure, mut iso) = (params.exposure_time_ns, params.iso);

            if still && params.ev_compensation != 0.0 {
                if let Some(baseline) = state.ev_baseline() {
                    let resolved = resolve_ev(params.ev_compensation, baseline, &limits);
                    exposure = resolved.exposure_time_ns;
                    iso = resolved.iso;
                }
            }

            request.control_mode = ControlMode::Off;
            request.ae_mode = AeMode::Off;
            request.frame_duration_ns = Some(params.frame_duration_ns());
            request.exposure_time_ns = Some(exposure.min(limits.exposure_window().upper));
            request.iso = Some(limits.iso_range.clamp(iso));
            request.antibanding = Some(Antibanding::Hz60);

            if !still {
                request.noise_reduction = Some(ProcessingQuality::Fast);
                request.edge = Some(ProcessingQuality::Fast);
            }
        } else {
            request.ev_compensation = Some(params.ev_compensation);
        }

        if let (WhiteBalance::Kelvin(_), Some(gains)) = (params.white_balance, state.wb_gains()) {
            request.awb_mode = AwbMode::Off;
            request.wb_gains = Some(gains);
        }

        if caps.flash_available {
            apply_flash(&mut request, params.flash_mode, params.manual_enabled, still);
        }

        if still {
            request.edge = Some(ProcessingQuality::HighQuality);
            request.noise_reduction = Some(ProcessingQuality::HighQuality);
            request.hot_pixel = Some(ProcessingQuality::HighQuality);
        }

        request
    }

    /// Attach the capture-time orientation tag
    pub fn with_jpeg_orientation(mut self, orientation: SensorRotation) -> Self {
        self.jpeg_orientation = Some(orientation);
        self
    }
}

fn apply_flash(request: &mut FrameRequest, mode: FlashMode, manual: bool, still: bool) {
    let fire = if still {
        FlashFiring::Single
    } else {
        FlashFiring::Off
    };
    match mode {
        FlashMode::Off => {
            request.flash = Some(FlashFiring::Off);
            if manual {
                request.ae_mode = AeMode::Off;
            }
        }
        FlashMode::Torch => {
            request.flash = Some(FlashFiring::Torch);
            request.ae_mode = AeMode::On;
        }
        FlashMode::Auto => {
            request.flash = Some(fire);
            request.ae_mode = AeMode::OnAutoFlash;
        }
        FlashMode::On => {
            request.flash = Some(fire);
            request.ae_mode = AeMode::OnAlwaysFlash;
        }
    }
}

/// Orientation tag for a still taken while the device is rotated by
/// `device_rotation_deg` (clockwise from its natural orientation)
///
/// Front sensors are mirrored, so the device rotation is subtracted instead
/// of added.
pub fn jpeg_orientation(caps: &DeviceCapabilities, device_rotation_deg: i32) -> SensorRotation {
    let device = SensorRotation::from_degrees_int(device_rotation_deg).degrees() as i32;
    let device = match caps.facing {
        LensFacing::Front => -device,
        LensFacing::Back => device,
    };
    let sensor = caps.sensor_orientation.degrees() as i32;
    SensorRotation::from_degrees_int((sensor + device + 360) % 360)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::controls::AspectMode;
    use crate::geometry::{CropGeometry, crop_region};

    fn caps(flash: bool) -> DeviceCapabilities {
        DeviceCapabilities {
            iso_range: ValueRange::new(100, 3200),
            exposure_time_range: ValueRange::new(100_000, 200_000_000),
            ae_compensation_range: ValueRange::new(-4.0, 4.0),
            max_digital_zoom: 8.0,
            flash_available: flash,
            ..DeviceCapabilities::default()
        }
    }

    fn setup(flash: bool) -> (ParameterState, DeviceCapabilities) {
        let caps = caps(flash);
        let mut state = ParameterState::new(&EngineConfig::default());
        state.apply_capabilities(&caps);
        (state, caps)
    }

    fn crop(state: &ParameterState, caps: &DeviceCapabilities) -> Rect {
        let params = state.params();
        crop_region(
            caps.sensor_active_rect,
            &CropGeometry {
                aspect: params.aspect_mode,
                zoom: params.zoom_factor,
                max_zoom: caps.max_digital_zoom,
                tall_zoom_bias: 1.2,
            },
        )
    }

    #[test]
    fn test_auto_request_passes_ev_through() {
        let (mut state, caps) = setup(false);
        state.set_ev_compensation(1.5);
        let req = FrameRequest::build(&state, &caps, crop(&state, &caps), RequestMode::Preview);
        assert_eq!(req.control_mode, ControlMode::Auto);
        assert_eq!(req.ae_mode, AeMode::On);
        assert_eq!(req.ev_compensation, Some(1.5));
        assert_eq!(req.exposure_time_ns, None);
        assert_eq!(req.awb_mode, AwbMode::Auto);
        assert_eq!(req.flash, None);
    }

    #[test]
    fn test_manual_request_sets_explicit_timing() {
        let (mut state, caps) = setup(false);
        state.set_manual_enabled(true);
        state.set_target_fps(60);
        state.set_exposure_time_ns(10_000_000);
        state.set_iso(640);
        let req = FrameRequest::build(&state, &caps, crop(&state, &caps), RequestMode::Preview);
        assert_eq!(req.control_mode, ControlMode::Off);
        assert_eq!(req.ae_mode, AeMode::Off);
        assert_eq!(req.frame_duration_ns, Some(16_666_666));
        assert_eq!(req.exposure_time_ns, Some(10_000_000));
        assert_eq!(req.iso, Some(640));
        assert_eq!(req.target_fps_range, ValueRange::new(60, 60));
        assert_eq!(req.antibanding, Some(Antibanding::Hz60));
        assert_eq!(req.noise_reduction, Some(ProcessingQuality::Fast));
        assert_eq!(req.ev_compensation, None);
    }

    #[test]
    fn test_ev_set_before_manual_reaches_preview_and_still() {
        let (mut state, caps) = setup(false);
        state.set_target_fps(60);
        state.set_exposure_time_ns(4_000_000);
        state.set_iso(200);
        state.set_ev_compensation(1.0);
        state.set_manual_enabled(true);

        let crop = crop(&state, &caps);
        let preview = FrameRequest::build(&state, &caps, crop, RequestMode::Preview);
        let still = FrameRequest::build(&state, &caps, crop, RequestMode::Still);
        for req in [preview, still] {
            assert_eq!(req.exposure_time_ns, Some(8_000_000));
            assert_eq!(req.iso, Some(200));
            assert_eq!(req.ev_compensation, None);
        }
    }

    #[test]
    fn test_still_request_is_high_quality() {
        let (state, caps) = setup(false);
        let req = FrameRequest::build(&state, &caps, crop(&state, &caps), RequestMode::Still)
            .with_jpeg_orientation(SensorRotation::Rotate90);
        assert_eq!(req.edge, Some(ProcessingQuality::HighQuality));
        assert_eq!(req.noise_reduction, Some(ProcessingQuality::HighQuality));
        assert_eq!(req.hot_pixel, Some(ProcessingQuality::HighQuality));
        assert_eq!(req.jpeg_orientation, Some(SensorRotation::Rotate90));
    }

    #[test]
    fn test_kelvin_sets_fixed_gains() {
        let (mut state, caps) = setup(false);
        state.set_white_balance_kelvin(2800);
        let req = FrameRequest::build(&state, &caps, crop(&state, &caps), RequestMode::Preview);
        assert_eq!(req.awb_mode, AwbMode::Off);
        assert_eq!(req.wb_gains, Some(WbGains::for_kelvin(2800)));
        assert_eq!(req.control_mode, ControlMode::Off);
    }

    #[test]
    fn test_flash_never_fires_in_preview() {
        let (mut state, caps) = setup(true);
        for mode in [FlashMode::Auto, FlashMode::On] {
            state.set_flash_mode(mode);
            let crop = crop(&state, &caps);
            let preview = FrameRequest::build(&state, &caps, crop, RequestMode::Preview);
            let still = FrameRequest::build(&state, &caps, crop, RequestMode::Still);
            assert_eq!(preview.flash, Some(FlashFiring::Off));
            assert_eq!(still.flash, Some(FlashFiring::Single));
        }
        state.set_flash_mode(FlashMode::On);
        let req = FrameRequest::build(&state, &caps, crop(&state, &caps), RequestMode::Still);
        assert_eq!(req.ae_mode, AeMode::OnAlwaysFlash);
    }

    #[test]
    fn test_torch_in_both_streams() {
        let (mut state, caps) = setup(true);
        state.set_manual_enabled(true);
        state.set_flash_mode(FlashMode::Torch);
        let crop = crop(&state, &caps);
        for mode in [RequestMode::Preview, RequestMode::Still] {
            let req = FrameRequest::build(&state, &caps, crop, mode);
            assert_eq!(req.flash, Some(FlashFiring::Torch));
            assert_eq!(req.ae_mode, AeMode::On);
        }
    }

    #[test]
    fn test_flash_off_keeps_manual_ae_off() {
        let (mut state, caps) = setup(true);
        state.set_manual_enabled(true);
        let req = FrameRequest::build(&state, &caps, crop(&state, &caps), RequestMode::Preview);
        assert_eq!(req.flash, Some(FlashFiring::Off));
        assert_eq!(req.ae_mode, AeMode::Off);
    }

    #[test]
    fn test_still_rederives_ev_from_baseline() {
        let (mut state, caps) = setup(false);
        state.set_manual_enabled(true);
        state.set_target_fps(60);
        state.set_exposure_time_ns(4_000_000);
        state.set_iso(200);
        state.set_ev_compensation(1.0);
        let req = FrameRequest::build(&state, &caps, crop(&state, &caps), RequestMode::Still);
        assert_eq!(req.exposure_time_ns, Some(8_000_000));
        assert_eq!(req.iso, Some(200));
    }

    #[test]
    fn test_crop_region_is_carried() {
        let (mut state, caps) = setup(false);
        state.set_aspect_mode(AspectMode::Square);
        state.set_zoom(2.0);
        let region = crop(&state, &caps);
        let req = FrameRequest::build(&state, &caps, region, RequestMode::Preview);
        assert_eq!(req.crop_region, region);
        assert_eq!((region.width, region.height), (1500, 1500));
    }

    #[test]
    fn test_jpeg_orientation_mirrors_front() {
        let back = DeviceCapabilities {
            sensor_orientation: SensorRotation::Rotate90,
            ..DeviceCapabilities::default()
        };
        let front = DeviceCapabilities {
            facing: LensFacing::Front,
            sensor_orientation: SensorRotation::Rotate270,
            ..DeviceCapabilities::default()
        };
        assert_eq!(jpeg_orientation(&back, 0), SensorRotation::Rotate90);
        assert_eq!(jpeg_orientation(&back, 90), SensorRotation::Rotate180);
        assert_eq!(jpeg_orientation(&front, 0), SensorRotation::Rotate270);
        assert_eq!(jpeg_orientation(&front, 90), SensorRotation::Rotate180);
        // Rounded to the nearest quarter turn
        assert_eq!(jpeg_orientation(&back, 80), SensorRotation::Rotate180);
    }
}
