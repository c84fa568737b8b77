// SPDX-License-Identifier: GPL-3.0-only

//! Camera Engine - manual-control camera session engine
//!
//! This library drives a capture device through its session lifecycle,
//! turns user intent (manual exposure, EV, white balance, zoom, framing,
//! flash) into per-frame capture requests and runs still captures through an
//! async processing pipeline.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`controls`]: Parameter state model and its setters
//! - [`geometry`]: Crop/zoom math and the preview transform
//! - [`request`]: Capture request synthesis
//! - [`session`]: Lifecycle state machine, session worker and [`CameraEngine`]
//! - [`monitor`]: Frame rate measurement and adaptive preview resolution
//! - [`pipelines`]: Still decoding, re-cropping, encoding and saving
//! - [`backends`]: Capture device abstraction and the virtual camera
//! - [`config`]: Engine configuration
//! - [`storage`]: Image sinks
//!
//! # Example
//!
//! ```no_run
//! use camera_engine::backends::camera::VirtualCamera;
//! use camera_engine::storage::DirectorySink;
//! use camera_engine::{CameraEngine, EngineConfig};
//! use std::sync::Arc;
//!
//! let config = EngineConfig::default();
//! let sink = Arc::new(DirectorySink::new(config.photo_dir.clone()));
//! let mut engine = CameraEngine::start(VirtualCamera::new(), sink, config)?;
//! engine.resume();
//! let photo = engine.take_picture().wait()?;
//! println!("{}", photo.locator);
//! engine.shutdown()?;
//! # Ok::<(), camera_engine::AppError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod controls;
pub mod errors;
pub mod geometry;
pub mod monitor;
pub mod pipelines;
pub mod request;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::EngineConfig;
pub use controls::{AspectMode, CaptureParameters, FlashMode, ParameterState, ResolutionPreset};
pub use errors::{AppError, AppResult, CameraError, PhotoError};
pub use geometry::{PreviewScaleMode, PreviewTransform, Rect, Size};
pub use pipelines::photo::PhotoOutcome;
pub use session::{CameraEngine, PhotoTicket, SessionState};
