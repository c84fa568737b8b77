// SPDX-License-Identifier: GPL-3.0-only

//! Capture device abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    CameraEngine     │  ← Control surface (any thread)
//! └──────────┬──────────┘
//!            │ commands
//!            ▼
//! ┌─────────────────────┐
//! │   Session worker    │  ← Single owner of the device
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureDevice trait │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!            ▼
//!     ┌─────────────┐
//!     │VirtualCamera│  ← Software implementation
//!     └─────────────┘
//! ```
//!
//! Devices report asynchronous results (frames, stills, disconnects) through
//! the [`DeviceEventSender`] they receive on open.

pub mod frame_loop;
pub mod types;
pub mod virtual_device;

pub use types::*;
pub use virtual_device::{FaultPlan, VirtualCamera, VirtualCameraHandle, VirtualStats};

use crate::request::FrameRequest;

/// Capture device driven by the session worker
///
/// All calls come from the single session worker thread. Implementations
/// must not call back into the engine synchronously; results travel through
/// the event sender.
pub trait CaptureDevice: Send {
    /// Short name for logging
    fn name(&self) -> &str;

    // ===== Capabilities =====

    /// Static limits of the camera with the given facing
    ///
    /// Called once per device open, before [`CaptureDevice::open`].
    fn query_capabilities(&mut self, facing: LensFacing) -> BackendResult<DeviceCapabilities>;

    // ===== Lifecycle =====

    /// Open the camera with the given facing
    ///
    /// Any previously open camera is closed first. Events for this open are
    /// sent through `events`.
    fn open(&mut self, facing: LensFacing, events: DeviceEventSender) -> BackendResult<()>;

    /// Create the preview and still surfaces
    fn configure(&mut self, config: &StreamConfig) -> BackendResult<()>;

    /// Release the camera; must not emit events afterwards
    fn close(&mut self);

    // ===== Requests =====

    /// Replace the repeating preview request
    fn set_repeating(&mut self, request: &FrameRequest) -> BackendResult<()>;

    /// Stop the repeating preview request
    fn stop_repeating(&mut self) -> BackendResult<()>;

    /// Issue a one-shot still request
    ///
    /// Suspends the repeating request. The outcome arrives as
    /// [`DeviceEventKind::StillCaptured`] or [`DeviceEventKind::StillFailed`].
    fn capture(&mut self, request: &FrameRequest) -> BackendResult<()>;
}
