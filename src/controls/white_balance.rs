// SPDX-License-Identifier: GPL-3.0-only

//! Manual white balance gains

use crate::constants::{MAX_KELVIN, MIN_KELVIN};
use serde::{Deserialize, Serialize};

/// White balance setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WhiteBalance {
    /// Let the ISP pick gains
    #[default]
    Auto,
    /// Fixed color temperature
    Kelvin(u32),
}

/// Per-channel color correction gains (RGGB order)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WbGains {
    pub red: f32,
    pub green_even: f32,
    pub green_odd: f32,
    pub blue: f32,
}

impl WbGains {
    /// Gains for a color temperature
    ///
    /// Stepwise mapping: warm light gets a strong red boost and weak blue
    /// boost, cool light the reverse. Red is non-increasing and blue
    /// non-decreasing in Kelvin.
    pub fn for_kelvin(kelvin: u32) -> Self {
        let kelvin = clamp_kelvin(kelvin);
        let (red, blue) = match kelvin {
            k if k < 3500 => (2.2, 1.1),
            k if k < 4500 => (1.8, 1.3),
            k if k < 5500 => (1.5, 1.5),
            k if k < 6500 => (1.3, 1.8),
            _ => (1.1, 2.2),
        };
        Self {
            red,
            green_even: 1.0,
            green_odd: 1.0,
            blue,
        }
    }
}

/// Clamp a color temperature to the supported range
pub fn clamp_kelvin(kelvin: u32) -> u32 {
    kelvin.clamp(MIN_KELVIN, MAX_KELVIN)
}
