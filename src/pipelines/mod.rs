// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! Heavy work on captured media runs here, off the session worker, so the
//! live preview keeps streaming while a photo is processed and saved.
//!
//! # Modules
//!
//! - [`photo`]: still decoding, framing re-crop, JPEG encoding and saving

pub mod photo;
