// SPDX-License-Identifier: GPL-3.0-only

//! Session lifecycle state machine
//!
//! A pure `(state, event) -> (state, effects)` table. The runner executes the
//! effects against the device and feeds the outcomes back in as events.
//!
//! ```text
//!            open                 ready
//!  Closed ─────────► Opening ─────────────► Streaming ◄──────┐
//!    ▲  ▲              │  ▲                 │   │  │         │ still done
//!    │  │       failed │  └── reconfigure ──┘   │  │ picture │
//!    │  │              ▼                        │  ▼         │
//!    │  │            Error                      │ Capturing ─┘
//!    │  │                                       │  │
//!    │  └──── released ─── Closing ◄── close ───┴──┘
//!    │
//!    └──────── disconnected (from any open state)
//! ```

use crate::backends::camera::LensFacing;
use crate::errors::{AppError, CameraError, PhotoError};
use tracing::debug;

/// Lifecycle state of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Closed,
    Opening,
    Streaming,
    Capturing,
    Closing,
    Error,
}

impl SessionState {
    /// True while the device is held
    pub fn holds_device(self) -> bool {
        matches!(
            self,
            SessionState::Opening | SessionState::Streaming | SessionState::Capturing
        )
    }
}

/// Why the session is being rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigureReason {
    AspectMode,
    Resolution,
    Facing,
    AdaptiveResolution,
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Caller asked to open (or resume)
    Open,
    /// Device opened and surfaces configured
    DeviceReady,
    /// Opening or streaming failed
    Failed(CameraError),
    /// Output sizes or facing changed
    Reconfigure(ReconfigureReason),
    /// Hot-applicable parameters changed
    HotApply,
    TakePicture,
    /// The in-flight still completed or failed
    StillFinished,
    Close,
    /// Device resources were released
    Released,
    Disconnected,
}

/// Work for the runner
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Query capabilities, open and configure
    OpenDevice(LensFacing),
    StartRepeating,
    UpdateRepeating,
    ResumeRepeating,
    IssueStill,
    ReleaseDevice,
    /// Fail the still waiting for admission
    RejectCapture(AppError),
    /// Fail the still already in flight
    AbortStill(PhotoError),
    ReportError(CameraError),
}

#[derive(Debug, Clone, Default)]
pub struct SessionMachine {
    state: SessionState,
    facing: LensFacing,
    /// Reconfigure requested while a still was in flight
    pending_reconfigure: bool,
}

impl SessionMachine {
    pub fn new(facing: LensFacing) -> Self {
        Self {
            facing,
            ..Self::default()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn facing(&self) -> LensFacing {
        self.facing
    }

    /// Flip the lens; takes effect with the next (re)open
    pub fn toggle_facing(&mut self) -> LensFacing {
        self.facing = self.facing.toggled();
        self.facing
    }

    /// Apply `event` and return the effects to execute in order
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        use SessionEvent as Ev;
        use SessionState as St;

        let from = self.state;
        let (next, effects) = match (from, event) {
            (St::Closed | St::Error, Ev::Open) => {
                self.pending_reconfigure = false;
                (St::Opening, vec![Effect::OpenDevice(self.facing)])
            }
            (_, Ev::Open) => (from, vec![]),

            (St::Opening, Ev::DeviceReady) => (St::Streaming, vec![Effect::StartRepeating]),
            (_, Ev::DeviceReady) => (from, vec![]),

            (St::Opening | St::Streaming, Ev::Failed(err)) => (
                St::Error,
                vec![Effect::ReleaseDevice, Effect::ReportError(err)],
            ),
            (St::Capturing, Ev::Failed(err)) => (
                St::Error,
                vec![
                    Effect::AbortStill(PhotoError::CaptureFailed(err.to_string())),
                    Effect::ReleaseDevice,
                    Effect::ReportError(err),
                ],
            ),
            (_, Ev::Failed(_)) => (from, vec![]),

            (St::Streaming | St::Opening, Ev::Reconfigure(reason)) => {
                debug!(reason = ?reason, "Reconfiguring session");
                (
                    St::Opening,
                    vec![Effect::ReleaseDevice, Effect::OpenDevice(self.facing)],
                )
            }
            (St::Capturing, Ev::Reconfigure(reason)) => {
                debug!(reason = ?reason, "Reconfigure deferred until the still completes");
                self.pending_reconfigure = true;
                (St::Capturing, vec![])
            }
            (_, Ev::Reconfigure(_)) => (from, vec![]),

            (St::Streaming, Ev::HotApply) => (St::Streaming, vec![Effect::UpdateRepeating]),
            // Capturing picks the new values up on resume
            (_, Ev::HotApply) => (from, vec![]),

            (St::Streaming, Ev::TakePicture) => (St::Capturing, vec![Effect::IssueStill]),
            (St::Capturing, Ev::TakePicture) => (
                St::Capturing,
                vec![Effect::RejectCapture(PhotoError::CaptureInProgress.into())],
            ),
            (_, Ev::TakePicture) => (
                from,
                vec![Effect::RejectCapture(CameraError::NotStreaming.into())],
            ),

            (St::Capturing, Ev::StillFinished) => {
                if self.pending_reconfigure {
                    self.pending_reconfigure = false;
                    (
                        St::Opening,
                        vec![Effect::ReleaseDevice, Effect::OpenDevice(self.facing)],
                    )
                } else {
                    (St::Streaming, vec![Effect::ResumeRepeating])
                }
            }
            (_, Ev::StillFinished) => (from, vec![]),

            (St::Opening | St::Streaming, Ev::Close) => (St::Closing, vec![Effect::ReleaseDevice]),
            (St::Capturing, Ev::Close) => (
                St::Closing,
                vec![
                    Effect::AbortStill(PhotoError::CaptureFailed("session closed".to_string())),
                    Effect::ReleaseDevice,
                ],
            ),
            (St::Error, Ev::Close) => (St::Closed, vec![]),
            (_, Ev::Close) => (from, vec![]),

            (St::Closing, Ev::Released) => (St::Closed, vec![]),
            (_, Ev::Released) => (from, vec![]),

            (St::Opening | St::Streaming | St::Closing, Ev::Disconnected) => (
                St::Closed,
                vec![
                    Effect::ReleaseDevice,
                    Effect::ReportError(CameraError::DeviceDisconnected),
                ],
            ),
            (St::Capturing, Ev::Disconnected) => (
                St::Closed,
                vec![
                    Effect::AbortStill(PhotoError::CaptureFailed(
                        "camera disconnected".to_string(),
                    )),
                    Effect::ReleaseDevice,
                    Effect::ReportError(CameraError::DeviceDisconnected),
                ],
            ),
            (_, Ev::Disconnected) => (from, vec![]),
        };

        if next != from {
            debug!(from = ?from, to = ?next, "Session state transition");
            if from == St::Capturing {
                self.pending_reconfigure = false;
            }
        }
        self.state = next;
        effects
    }
}
