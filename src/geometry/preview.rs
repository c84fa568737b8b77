// SPDX-License-Identifier: GPL-3.0-only

//! Preview surface transform
//!
//! Maps preview buffer pixels onto the on-screen viewport. Fill mode covers
//! the whole viewport (cropping the buffer edges), fit mode letterboxes.
//! The visible part of the mapped buffer is published for overlay renderers
//! such as the rule-of-thirds guide grid.

use super::Size;
use serde::{Deserialize, Serialize};

/// How the preview buffer is scaled into the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewScaleMode {
    /// Cover the viewport, cropping overflow
    #[default]
    Fill,
    /// Show the whole buffer, letterboxing as needed
    Fit,
}

/// Rectangle in viewport (screen) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewRect {
    fn intersect(&self, other: &ViewRect) -> ViewRect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        ViewRect {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0.0),
            height: (y1 - y0).max(0.0),
        }
    }
}

/// Buffer-to-viewport mapping
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviewTransform {
    /// Uniform scale applied to buffer pixels
    pub scale: f32,
    /// Horizontal offset of the scaled buffer inside the viewport
    pub offset_x: f32,
    /// Vertical offset of the scaled buffer inside the viewport
    pub offset_y: f32,
    /// Part of the scaled buffer that is actually on screen
    pub visible_rect: ViewRect,
}

impl PreviewTransform {
    /// Compute the transform for a buffer shown inside a viewport
    ///
    /// `buffer` must already be in display orientation. Degenerate sizes yield
    /// the identity transform with an empty visible rect.
    pub fn compute(buffer: Size, viewport: Size, mode: PreviewScaleMode) -> Self {
        if buffer.width == 0 || buffer.height == 0 || viewport.width == 0 || viewport.height == 0
        {
            return Self {
                scale: 1.0,
                ..Self::default()
            };
        }

        let sx = viewport.width as f32 / buffer.width as f32;
        let sy = viewport.height as f32 / buffer.height as f32;
        let scale = match mode {
            PreviewScaleMode::Fill => sx.max(sy),
            PreviewScaleMode::Fit => sx.min(sy),
        };

        let scaled_w = buffer.width as f32 * scale;
        let scaled_h = buffer.height as f32 * scale;
        let offset_x = (viewport.width as f32 - scaled_w) / 2.0;
        let offset_y = (viewport.height as f32 - scaled_h) / 2.0;

        let mapped = ViewRect {
            x: offset_x,
            y: offset_y,
            width: scaled_w,
            height: scaled_h,
        };
        let viewport_rect = ViewRect {
            x: 0.0,
            y: 0.0,
            width: viewport.width as f32,
            height: viewport.height as f32,
        };

        Self {
            scale,
            offset_x,
            offset_y,
            visible_rect: mapped.intersect(&viewport_rect),
        }
    }

    /// Map a buffer coordinate to viewport coordinates
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }
}
