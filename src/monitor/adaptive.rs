// SPDX-License-Identifier: GPL-3.0-only

//! Adaptive preview resolution
//!
//! Walks a ladder of preview sizes (largest first) to keep the measured frame
//! rate near the target: headroom above the target moves one rung toward
//! larger sizes, a deficit moves one rung toward smaller sizes. Changes are
//! rate limited and never happen while the smoothed rate sits inside the
//! hysteresis band.
//!
//! A rung change invalidates the crop math of the old buffer, so the session
//! resets the zoom factor to 1.0 whenever this controller picks a new size.

use crate::geometry::Size;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RungChange {
    /// Moved toward larger sizes
    Up,
    /// Moved toward smaller sizes
    Down,
}

/// Outcome of one evaluation that changed the rung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RungSwitch {
    pub size: Size,
    pub index: usize,
    pub change: RungChange,
}

#[derive(Debug, Clone)]
pub struct AdaptiveResolution {
    ladder: Vec<Size>,
    index: usize,
    hysteresis: f64,
    min_interval: Duration,
    last_change: Option<Instant>,
}

impl AdaptiveResolution {
    pub fn new(hysteresis: f64, min_interval: Duration) -> Self {
        Self {
            ladder: Vec::new(),
            index: 0,
            hysteresis,
            min_interval,
            last_change: None,
        }
    }

    /// Install a new ladder positioned at `current` (or the top rung)
    ///
    /// `now` starts the rate-limit interval so a fresh session settles first.
    pub fn set_ladder(&mut self, ladder: Vec<Size>, current: Size, now: Instant) {
        self.index = ladder.iter().position(|s| *s == current).unwrap_or(0);
        self.ladder = ladder;
        self.last_change = Some(now);
    }

    pub fn ladder(&self) -> &[Size] {
        &self.ladder
    }

    pub fn current(&self) -> Option<Size> {
        self.ladder.get(self.index).copied()
    }

    /// Decide whether to move one rung
    pub fn evaluate(&mut self, smoothed_fps: f64, target_fps: u32, now: Instant) -> Option<RungSwitch> {
        if self.ladder.len() < 2 {
            return None;
        }
        if let Some(last) = self.last_change {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }

        let target = target_fps as f64;
        let (index, change) = if smoothed_fps > target + self.hysteresis && self.index > 0 {
            (self.index - 1, RungChange::Up)
        } else if smoothed_fps < target - self.hysteresis && self.index + 1 < self.ladder.len() {
            (self.index + 1, RungChange::Down)
        } else {
            return None;
        };

        self.index = index;
        self.last_change = Some(now);
        Some(RungSwitch {
            size: self.ladder[index],
            index,
            change,
        })
    }
}

/// Preview ladder: sizes within `max`, matching `target_long_over_short`
/// when possible, largest pixel count first
pub fn build_size_ladder(sizes: &[Size], target_long_over_short: f64, max: Size) -> Vec<Size> {
    let bounded: Vec<Size> = sizes.iter().copied().filter(|s| s.fits_within(max)).collect();
    let mut ladder: Vec<Size> = bounded
        .iter()
        .copied()
        .filter(|s| (s.long_over_short() - target_long_over_short).abs() < 0.02)
        .collect();
    if ladder.is_empty() {
        ladder = bounded;
    }
    ladder.sort_by(|a, b| b.pixels().cmp(&a.pixels()));
    ladder.dedup();
    ladder
}
