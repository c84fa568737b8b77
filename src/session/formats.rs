// SPDX-License-Identifier: GPL-3.0-only

//! Output size selection
//!
//! Sizes are compared on their long/short side ratio so portrait framing
//! modes match landscape-mounted sensor outputs.

use crate::controls::ResolutionPreset;
use crate::geometry::Size;
use std::cmp::Reverse;
use tracing::debug;

/// Width of the aspect distance buckets; sizes in one bucket count as equal
const ASPECT_EPSILON: f64 = 1e-3;

/// Aspect distance to the target, quantized so the ordering stays total
fn aspect_bucket(size: Size, target_long_over_short: f64) -> u64 {
    let distance = (size.long_over_short() - target_long_over_short).abs();
    (distance / ASPECT_EPSILON).round() as u64
}

/// Preview size: within `max`, closest aspect to the target, larger on ties
pub fn select_preview_size(sizes: &[Size], target_long_over_short: f64, max: Size) -> Option<Size> {
    let selected = sizes
        .iter()
        .copied()
        .filter(|s| s.fits_within(max) && s.width > 0 && s.height > 0)
        .min_by_key(|s| (aspect_bucket(*s, target_long_over_short), Reverse(s.pixels())));
    debug!(target = target_long_over_short, selected = ?selected, "Selected preview size");
    selected
}

/// Still size: closest aspect to the target, then pixel count closest to
/// the resolution preset
pub fn select_still_size(
    sizes: &[Size],
    target_long_over_short: f64,
    preset: ResolutionPreset,
) -> Option<Size> {
    let wanted = preset.size().pixels() as i64;
    let selected = sizes
        .iter()
        .copied()
        .filter(|s| s.width > 0 && s.height > 0)
        .min_by_key(|s| {
            (
                aspect_bucket(*s, target_long_over_short),
                (s.pixels() as i64 - wanted).abs(),
                Reverse(s.pixels()),
            )
        });
    debug!(
        target = target_long_over_short,
        preset = preset.display_name(),
        selected = ?selected,
        "Selected still size"
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> Vec<Size> {
        vec![
            Size::new(8160, 6120),
            Size::new(4000, 3000),
            Size::new(3840, 2160),
            Size::new(1920, 1080),
            Size::new(1440, 1080),
            Size::new(1080, 1080),
            Size::new(1280, 960),
            Size::new(640, 480),
        ]
    }

    #[test]
    fn test_preview_prefers_larger_on_tie() {
        let size = select_preview_size(&sizes(), 4.0 / 3.0, Size::new(1920, 1080));
        assert_eq!(size, Some(Size::new(1440, 1080)));
    }

    #[test]
    fn test_preview_respects_max() {
        let size = select_preview_size(&sizes(), 16.0 / 9.0, Size::new(1280, 720));
        assert_eq!(size, Some(Size::new(640, 480)));
        assert_eq!(select_preview_size(&[Size::new(4000, 3000)], 1.0, Size::new(1920, 1080)), None);
    }

    #[test]
    fn test_square_preview() {
        let size = select_preview_size(&sizes(), 1.0, Size::new(1920, 1080));
        assert_eq!(size, Some(Size::new(1080, 1080)));
    }

    #[test]
    fn test_still_follows_preset() {
        let four_three = 4.0 / 3.0;
        assert_eq!(
            select_still_size(&sizes(), four_three, ResolutionPreset::Mp12),
            Some(Size::new(4000, 3000))
        );
        assert_eq!(
            select_still_size(&sizes(), four_three, ResolutionPreset::Mp50),
            Some(Size::new(8160, 6120))
        );
        assert_eq!(
            select_still_size(&sizes(), 16.0 / 9.0, ResolutionPreset::Mp12),
            Some(Size::new(3840, 2160))
        );
    }

    #[test]
    fn test_near_equal_aspects_ignore_input_order() {
        let candidates = [
            Size::new(1200, 900),
            Size::new(1334, 1000),
            Size::new(1335, 1000),
        ];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        let max = Size::new(1920, 1080);
        for order in orders {
            let sizes: Vec<Size> = order.iter().map(|&i| candidates[i]).collect();
            assert_eq!(
                select_preview_size(&sizes, 4.0 / 3.0, max),
                Some(Size::new(1200, 900)),
                "order {:?}",
                order
            );
            assert_eq!(
                select_still_size(&sizes, 4.0 / 3.0, ResolutionPreset::Mp12),
                Some(Size::new(1200, 900)),
                "order {:?}",
                order
            );
        }
    }
}
