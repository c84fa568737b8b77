// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer
//!
//! - [`camera`]: capture device trait, shared device types and the virtual
//!   camera used by tests and the CLI

pub mod camera;
