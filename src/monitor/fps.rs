// SPDX-License-Identifier: GPL-3.0-only

//! Smoothed frame rate measurement

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub timestamp: Instant,
    pub instantaneous_fps: f64,
    pub smoothed_fps: f64,
}

/// Counts frames and emits an exponentially smoothed FPS every window
#[derive(Debug, Clone)]
pub struct FpsMonitor {
    window: Duration,
    weight: f64,
    count: u32,
    window_start: Option<Instant>,
    smoothed: Option<f64>,
}

impl FpsMonitor {
    /// `weight` is the share of the newest sample in the smoothed value
    pub fn new(window: Duration, weight: f64) -> Self {
        Self {
            window,
            weight: weight.clamp(0.0, 1.0),
            count: 0,
            window_start: None,
            smoothed: None,
        }
    }

    /// Forget all history (new session)
    pub fn reset(&mut self) {
        self.count = 0;
        self.window_start = None;
        self.smoothed = None;
    }

    /// Last smoothed value, if a window has completed
    pub fn smoothed(&self) -> Option<f64> {
        self.smoothed
    }

    /// Record a delivered frame
    ///
    /// The first frame only opens the window. Returns a sample once the
    /// window has elapsed.
    pub fn on_frame(&mut self, now: Instant) -> Option<FrameSample> {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return None;
        };

        self.count += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.window {
            return None;
        }

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let instantaneous = self.count as f64 * 1000.0 / elapsed_ms;
        let smoothed = match self.smoothed {
            None => instantaneous,
            Some(previous) => self.weight * instantaneous + (1.0 - self.weight) * previous,
        };

        self.smoothed = Some(smoothed);
        self.count = 0;
        self.window_start = Some(now);

        Some(FrameSample {
            timestamp: now,
            instantaneous_fps: instantaneous,
            smoothed_fps: smoothed,
        })
    }
}

/// Lock-free f64 cell for handing the smoothed FPS to other threads
#[derive(Debug, Clone, Default)]
pub struct SharedFps {
    bits: Arc<AtomicU64>,
}

impl SharedFps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, fps: f64) {
        self.bits.store(fps.to_bits(), Ordering::Release);
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
