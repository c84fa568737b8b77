// SPDX-License-Identifier: GPL-3.0-only

//! Frame rate monitoring
//!
//! [`FpsMonitor`] turns frame-delivered events into smoothed FPS samples;
//! [`AdaptiveResolution`] optionally uses them to walk the preview size
//! ladder.

pub mod adaptive;
pub mod fps;

pub use adaptive::{AdaptiveResolution, RungChange, RungSwitch, build_size_ladder};
pub use fps::{FpsMonitor, FrameSample, SharedFps};
