// SPDX-License-Identifier: GPL-3.0-only

//! EV compensation resolver
//!
//! Splits a brightness change expressed in stops into an exposure time and
//! a sensor gain, shutter first: the exposure time absorbs as much of the
//! change as the frame budget allows and ISO covers the remainder.

use crate::backends::camera::ValueRange;

/// Exposure/ISO pair that EV moves are relative to
///
/// Captured lazily from the current manual values on the first EV move and
/// dropped whenever exposure time or ISO is set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvBaseline {
    pub exposure_time_ns: i64,
    pub iso: i32,
}

/// Device and timing limits the resolver has to respect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureLimits {
    /// Shortest exposure the resolver may choose (ns)
    pub min_exposure_ns: i64,
    /// Longest exposure the device supports (ns)
    pub max_device_exposure_ns: i64,
    /// Sensor sensitivity range
    pub iso_range: ValueRange<i32>,
    /// Frame duration at the target frame rate (ns)
    pub frame_budget_ns: i64,
    /// Headroom kept below the frame duration (ns)
    pub margin_ns: i64,
}

impl ExposureLimits {
    /// Exposure range usable under the current frame budget
    pub fn exposure_window(&self) -> ValueRange<i64> {
        let upper = (self.frame_budget_ns - self.margin_ns)
            .min(self.max_device_exposure_ns)
            .max(1);
        let lower = self.min_exposure_ns.clamp(1, upper);
        ValueRange::new(lower, upper)
    }
}

/// Result of an EV resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedExposure {
    pub exposure_time_ns: i64,
    pub iso: i32,
}

/// Resolve `ev` stops against `baseline` under `limits`
pub fn resolve_ev(ev: f64, baseline: EvBaseline, limits: &ExposureLimits) -> ResolvedExposure {
    let factor = 2f64.powf(ev);
    let base_exposure = baseline.exposure_time_ns.max(1) as f64;

    let window = limits.exposure_window();
    let raw_exposure = (base_exposure * factor) as i64;
    let exposure_time_ns = window.clamp(raw_exposure);

    let used_factor = exposure_time_ns as f64 / base_exposure;
    let remaining_factor = factor / used_factor;
    let iso = (baseline.iso as f64 * remaining_factor).round();
    let iso = limits
        .iso_range
        .clamp(iso.clamp(i32::MIN as f64, i32::MAX as f64) as i32);

    ResolvedExposure {
        exposure_time_ns,
        iso,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{EXPOSURE_MARGIN_NS, MIN_EV_EXPOSURE_NS, frame_duration_ns};

    fn limits_at(fps: u32) -> ExposureLimits {
        ExposureLimits {
            min_exposure_ns: MIN_EV_EXPOSURE_NS,
            max_device_exposure_ns: 100_000_000,
            iso_range: ValueRange::new(100, 3200),
            frame_budget_ns: frame_duration_ns(fps),
            margin_ns: EXPOSURE_MARGIN_NS,
        }
    }

    #[test]
    fn test_shutter_absorbs_whole_stop() {
        let baseline = EvBaseline {
            exposure_time_ns: 8_000_000,
            iso: 200,
        };
        let resolved = resolve_ev(1.0, baseline, &limits_at(30));
        assert_eq!(resolved.exposure_time_ns, 16_000_000);
        assert_eq!(resolved.iso, 200);
    }

    #[test]
    fn test_gain_covers_remainder_past_frame_budget() {
        let baseline = EvBaseline {
            exposure_time_ns: 20_000_000,
            iso: 200,
        };
        let resolved = resolve_ev(1.0, baseline, &limits_at(30));
        assert_eq!(resolved.exposure_time_ns, 33_033_333);
        assert_eq!(resolved.iso, 242);
    }

    #[test]
    fn test_negative_ev_shortens_exposure() {
        let baseline = EvBaseline {
            exposure_time_ns: 8_000_000,
            iso: 400,
        };
        let resolved = resolve_ev(-2.0, baseline, &limits_at(60));
        assert_eq!(resolved.exposure_time_ns, 2_000_000);
        assert_eq!(resolved.iso, 400);
    }

    #[test]
    fn test_min_exposure_pushes_into_gain() {
        let baseline = EvBaseline {
            exposure_time_ns: 400_000,
            iso: 800,
        };
        let resolved = resolve_ev(-2.0, baseline, &limits_at(60));
        assert_eq!(resolved.exposure_time_ns, MIN_EV_EXPOSURE_NS);
        assert_eq!(resolved.iso, 400);
    }

    #[test]
    fn test_iso_clamped_to_range() {
        let baseline = EvBaseline {
            exposure_time_ns: 16_000_000,
            iso: 1600,
        };
        let resolved = resolve_ev(4.0, baseline, &limits_at(60));
        assert_eq!(resolved.iso, 3200);
    }

    #[test]
    fn test_every_ev_in_range_respects_budget() {
        let baseline = EvBaseline {
            exposure_time_ns: 12_000_000,
            iso: 300,
        };
        for fps in [30, 60, 120] {
            let limits = limits_at(fps);
            let budget = frame_duration_ns(fps) - EXPOSURE_MARGIN_NS;
            let mut ev = -4.0;
            while ev <= 4.0 {
                let resolved = resolve_ev(ev, baseline, &limits);
                assert!(resolved.exposure_time_ns <= budget, "fps {} ev {}", fps, ev);
                assert!(limits.iso_range.contains(resolved.iso), "fps {} ev {}", fps, ev);
                ev += 0.1;
            }
        }
    }
}
