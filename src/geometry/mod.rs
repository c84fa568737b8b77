// SPDX-License-Identifier: GPL-3.0-only

//! Sensor and viewport geometry
//!
//! Two pure computations live here:
//!
//! - [`crop`]: sensor crop region from (active array, zoom, aspect mode)
//! - [`preview`]: scale/offset mapping from the preview buffer to the viewport
//!
//! Both are recomputed by the session worker whenever their inputs change and
//! never touch the device.

pub mod crop;
pub mod preview;

pub use crop::{CropGeometry, aspect_crop, crop_region, zoom_crop};
pub use preview::{PreviewScaleMode, PreviewTransform, ViewRect};

use serde::{Deserialize, Serialize};

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width divided by height (0.0 for degenerate sizes)
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    /// Long side over short side, independent of orientation
    pub fn long_over_short(&self) -> f64 {
        let long = self.width.max(self.height) as f64;
        let short = self.width.min(self.height).max(1) as f64;
        long / short
    }

    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }

    /// Swap width and height (for 90°/270° rotations)
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    pub fn fits_within(&self, bound: Size) -> bool {
        self.width <= bound.width && self.height <= bound.height
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in sensor pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle of `size` anchored at the origin
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width as i32, size.height as i32)
    }

    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    /// Center in doubled coordinates so odd sizes stay exact
    pub fn center_x2(&self) -> (i64, i64) {
        (
            2 * self.left as i64 + self.width as i64,
            2 * self.top as i64 + self.height as i64,
        )
    }

    pub fn size(&self) -> Size {
        Size::new(self.width.max(0) as u32, self.height.max(0) as u32)
    }

    /// True when `other` lies entirely inside `self`
    pub fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Rectangle of the given size sharing this rectangle's center
    pub fn centered_sub_rect(&self, width: i32, height: i32) -> Rect {
        let width = width.clamp(1, self.width.max(1));
        let height = height.clamp(1, self.height.max(1));
        Rect::new(
            self.left + (self.width - width) / 2,
            self.top + (self.height - height) / 2,
            width,
            height,
        )
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{},{} {}x{}]",
            self.left, self.top, self.width, self.height
        )
    }
}
