// SPDX-License-Identifier: GPL-3.0-only

//! Device session management
//!
//! - [`machine`]: pure lifecycle state machine
//! - [`formats`]: output size negotiation
//! - `runner`: the single worker executing machine effects against the device
//! - [`engine`]: the public handle

pub mod engine;
pub mod formats;
pub mod machine;
mod runner;

pub use engine::{CameraEngine, PhotoTicket};
pub use formats::{select_preview_size, select_still_size};
pub use machine::{Effect, ReconfigureReason, SessionEvent, SessionMachine, SessionState};
