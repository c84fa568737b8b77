// SPDX-License-Identifier: GPL-3.0-only

//! Crop/zoom geometry
//!
//! The sensor crop is derived in two independent steps:
//!
//! 1. **Aspect crop**: the active array is cut down to the target aspect ratio
//!    by shrinking whichever dimension is in excess, anchored at the center.
//! 2. **Zoom crop**: the aspect crop is shrunk by `1 / zoom` around its own
//!    center. Zoom factors at or below [`ZOOM_NOOP_THRESHOLD`] leave the
//!    aspect crop untouched so repeated rebuilds cannot drift.
//!
//! Aspect ratios are expressed in portrait terms (3:4, 9:16) while sensors
//! are normally mounted landscape, so the comparison is done on long/short
//! side ratios and mapped back onto the sensor's own orientation.

use super::Rect;
use crate::constants::ZOOM_NOOP_THRESHOLD;
use crate::controls::AspectMode;

/// Inputs for a full crop computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropGeometry {
    /// Framing mode selected by the user
    pub aspect: AspectMode,
    /// Stored zoom factor (already clamped to `[1, max_zoom]`)
    pub zoom: f32,
    /// Device-reported maximum digital zoom
    pub max_zoom: f32,
    /// Extra zoom multiplier applied in the tall (9:16) mode
    pub tall_zoom_bias: f32,
}

impl CropGeometry {
    /// Zoom factor actually used for the zoom step
    ///
    /// The tall mode multiplies the stored zoom by the configured bias. The
    /// result is kept inside the device range.
    pub fn effective_zoom(&self) -> f64 {
        let mut zoom = self.zoom as f64;
        if self.aspect == AspectMode::Tall9x16 {
            zoom *= self.tall_zoom_bias as f64;
        }
        zoom.clamp(1.0, (self.max_zoom as f64).max(1.0))
    }
}

/// Cut `active` down to the aspect ratio of `aspect`, center-anchored
pub fn aspect_crop(active: Rect, aspect: AspectMode) -> Rect {
    let Some(portrait_ratio) = aspect.portrait_ratio() else {
        return active;
    };
    if active.width <= 0 || active.height <= 0 {
        return active;
    }

    let target = 1.0 / portrait_ratio; // long / short, >= 1
    let landscape = active.width >= active.height;
    let (long, short) = if landscape {
        (active.width as f64, active.height as f64)
    } else {
        (active.height as f64, active.width as f64)
    };
    let current = long / short;

    let (new_long, new_short) = if (current - target).abs() < 1e-6 {
        (long, short)
    } else if current > target {
        ((short * target).round(), short)
    } else {
        (long, (long / target).round())
    };

    let (width, height) = if landscape {
        (new_long as i32, new_short as i32)
    } else {
        (new_short as i32, new_long as i32)
    };
    active.centered_sub_rect(width, height)
}

/// Shrink `base` by `1 / zoom` around its own center
pub fn zoom_crop(base: Rect, zoom: f64) -> Rect {
    if zoom <= ZOOM_NOOP_THRESHOLD {
        return base;
    }
    let width = (base.width as f64 / zoom).round() as i32;
    let height = (base.height as f64 / zoom).round() as i32;
    base.centered_sub_rect(width, height)
}

/// Full crop region: aspect crop followed by zoom crop
pub fn crop_region(active: Rect, geometry: &CropGeometry) -> Rect {
    zoom_crop(aspect_crop(active, geometry.aspect), geometry.effective_zoom())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSOR: Rect = Rect::new(0, 0, 4000, 3000);

    fn geometry(aspect: AspectMode, zoom: f32) -> CropGeometry {
        CropGeometry {
            aspect,
            zoom,
            max_zoom: 10.0,
            tall_zoom_bias: 1.2,
        }
    }

    fn assert_centered(outer: &Rect, inner: &Rect) {
        let (ocx, ocy) = outer.center_x2();
        let (icx, icy) = inner.center_x2();
        // Doubled coordinates: 2 units == 1 px
        assert!((ocx - icx).abs() <= 2, "x center off: {} vs {}", outer, inner);
        assert!((ocy - icy).abs() <= 2, "y center off: {} vs {}", outer, inner);
    }

    #[test]
    fn test_full_mode_keeps_sensor() {
        assert_eq!(aspect_crop(SENSOR, AspectMode::Full), SENSOR);
    }

    #[test]
    fn test_square_crop_shrinks_long_side() {
        let crop = aspect_crop(SENSOR, AspectMode::Square);
        assert_eq!(crop.width, 3000);
        assert_eq!(crop.height, 3000);
        assert_eq!(crop.left, 500);
        assert_centered(&SENSOR, &crop);
    }

    #[test]
    fn test_three_four_on_four_three_sensor_is_noop() {
        assert_eq!(aspect_crop(SENSOR, AspectMode::Portrait3x4), SENSOR);
    }

    #[test]
    fn test_tall_crop_shrinks_short_side() {
        let crop = aspect_crop(SENSOR, AspectMode::Tall9x16);
        assert_eq!(crop.width, 4000);
        assert_eq!(crop.height, 2250);
        assert!(SENSOR.contains(&crop));
        assert_centered(&SENSOR, &crop);
    }

    #[test]
    fn test_portrait_sensor_orientation_is_respected() {
        let portrait = Rect::new(0, 0, 3000, 4000);
        let crop = aspect_crop(portrait, AspectMode::Square);
        assert_eq!((crop.width, crop.height), (3000, 3000));
        assert_eq!(crop.top, 500);
    }

    #[test]
    fn test_zoom_noop_below_threshold() {
        assert_eq!(zoom_crop(SENSOR, 1.0), SENSOR);
        assert_eq!(zoom_crop(SENSOR, 1.00005), SENSOR);
    }

    #[test]
    fn test_zoom_divides_dimensions() {
        let crop = crop_region(SENSOR, &geometry(AspectMode::Full, 4.0));
        assert_eq!((crop.width, crop.height), (1000, 750));
        assert_centered(&SENSOR, &crop);
    }

    #[test]
    fn test_tall_mode_applies_bias() {
        let crop = crop_region(SENSOR, &geometry(AspectMode::Tall9x16, 1.0));
        let aspect = aspect_crop(SENSOR, AspectMode::Tall9x16);
        assert_eq!(crop.width, (aspect.width as f64 / 1.2).round() as i32);
        assert!(aspect.contains(&crop));
    }

    #[test]
    fn test_effective_zoom_never_exceeds_device_max() {
        let geometry = geometry(AspectMode::Tall9x16, 10.0);
        assert!((geometry.effective_zoom() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_crop_always_inside_and_centered() {
        let modes = [
            AspectMode::Full,
            AspectMode::Square,
            AspectMode::Portrait3x4,
            AspectMode::Tall9x16,
        ];
        let sensor = Rect::new(16, 12, 4032, 3024);
        for aspect in modes {
            for step in 0..40 {
                let zoom = 1.0 + step as f32 * 0.25;
                let crop = crop_region(sensor, &geometry(aspect, zoom));
                assert!(sensor.contains(&crop), "{:?} zoom {}: {}", aspect, zoom, crop);
                assert!(crop.width <= sensor.width && crop.height <= sensor.height);
                assert_centered(&sensor, &crop);
            }
        }
    }
}
