//! Color derivation for a single base color: contrast, shades and textual
//! representations.

mod contrast;
mod format;
mod shades;

pub use contrast::{
    contrast_ratio, relative_luminance, text_color, DARK_FOREGROUND, LIGHT_FOREGROUND,
};
pub use format::{hsl_string, rgb_string, to_hsl};
pub use shades::{shade_ramp, ShadeRamp};

use crate::error::ColorError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An opaque sRGB color, written as six hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl HexColor {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn channels(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }

    /// Channels scaled to `[0, 1]`.
    pub fn normalized(self) -> [f64; 3] {
        self.channels().map(|c| c as f64 / 255.0)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    /// Accepts `#rrggbb` or `rrggbb`, in either case.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let hex = input.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorError(input.to_string()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ColorError(input.to_string()))
        };

        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything derived from one base color.
#[derive(Debug, Clone, Serialize)]
pub struct ColorProfile {
    pub hex: HexColor,
    pub luminance: f64,
    pub foreground: &'static str,
    pub rgb: String,
    pub hsl: String,
    pub shades: ShadeRamp,
}

impl ColorProfile {
    pub fn derive(color: HexColor) -> Self {
        Self {
            hex: color,
            luminance: relative_luminance(color),
            foreground: text_color(color),
            rgb: rgb_string(color),
            hsl: hsl_string(color),
            shades: shade_ramp(color),
        }
    }
}
