// SPDX-License-Identifier: GPL-3.0-only
//! Paced frame loop threads
//!
//! A [`FrameLoopController`] owns a thread that ticks at a frame interval
//! read from a shared [`FramePacing`] cell. A zero interval parks the loop
//! (no repeating request active) without stopping the thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Poll interval while the loop is parked
const PARKED_POLL: Duration = Duration::from_millis(5);

/// Action returned by the tick callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Keep ticking
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Frame interval shared between the device and its frame loop
#[derive(Debug, Default)]
pub struct FramePacing {
    interval_ns: AtomicU64,
}

impl FramePacing {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Tick every `interval`
    pub fn set_interval(&self, interval: Duration) {
        let ns = interval.as_nanos().min(u64::MAX as u128) as u64;
        self.interval_ns.store(ns.max(1), Ordering::SeqCst);
    }

    /// Stop ticking until a new interval is set
    pub fn park(&self) {
        self.interval_ns.store(0, Ordering::SeqCst);
    }

    pub fn interval(&self) -> Option<Duration> {
        match self.interval_ns.load(Ordering::SeqCst) {
            0 => None,
            ns => Some(Duration::from_nanos(ns)),
        }
    }
}

/// Controller for a paced loop running in its own thread
///
/// ```ignore
/// let pacing = FramePacing::new();
/// pacing.set_interval(Duration::from_millis(16));
/// let controller = FrameLoopController::start("preview", pacing, |timestamp_ns| {
///     emit_frame(timestamp_ns);
///     LoopAction::Continue
/// });
/// ```
pub struct FrameLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl FrameLoopController {
    /// Start ticking `on_tick` with the loop-relative timestamp (ns)
    pub fn start<F>(name: &str, pacing: Arc<FramePacing>, mut on_tick: F) -> Self
    where
        F: FnMut(u64) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting frame loop");

        let spawn = thread::Builder::new().name(name.to_string()).spawn(move || {
            let origin = Instant::now();
            let mut next_deadline: Option<Instant> = None;

            while !stop.load(Ordering::SeqCst) {
                let Some(interval) = pacing.interval() else {
                    next_deadline = None;
                    thread::sleep(PARKED_POLL);
                    continue;
                };

                let deadline = next_deadline.unwrap_or_else(|| Instant::now() + interval);
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                }
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                // Late ticks re-anchor instead of bursting to catch up
                let after = Instant::now();
                next_deadline = Some(if after > deadline + interval {
                    after + interval
                } else {
                    deadline + interval
                });

                let timestamp_ns = after.duration_since(origin).as_nanos() as u64;
                if on_tick(timestamp_ns) == LoopAction::Stop {
                    debug!(name = %thread_name, "Frame loop requested stop");
                    break;
                }
            }

            debug!(name = %thread_name, "Frame loop thread exiting");
        });

        let thread_handle = match spawn {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn frame loop thread");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            name: name.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Frame loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Frame loop thread finished");
            }
        }
    }
}

impl Drop for FrameLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}
