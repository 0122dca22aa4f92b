use super::HexColor;
use palette::{convert::IntoColorUnclamped, IntoColor, Lab, Srgb};
use serde::{Serialize, Serializer};
use std::ops::Index;

/// Step labels of a ramp, lightest first.
pub const SHADE_STEPS: [u16; 11] = [50, 100, 200, 300, 400, 500, 600, 700, 800, 900, 950];

/// Lab lightness moved per unit of brighten/darken amount.
const LAB_STEP: f32 = 18.0;
const GAMUT_EPSILON: f32 = 1e-4;
const GAMUT_SEARCH_STEPS: usize = 24;

#[derive(Debug, Clone, Copy)]
enum Adjust {
    Brighten(f32),
    Base,
    Darken(f32),
}

/// Adjustment applied at each of [`SHADE_STEPS`].
const ADJUSTMENTS: [Adjust; 11] = [
    Adjust::Brighten(3.0),
    Adjust::Brighten(2.5),
    Adjust::Brighten(2.0),
    Adjust::Brighten(1.5),
    Adjust::Brighten(1.0),
    Adjust::Base,
    Adjust::Darken(0.5),
    Adjust::Darken(1.0),
    Adjust::Darken(1.5),
    Adjust::Darken(2.0),
    Adjust::Darken(3.0),
];

/// Tints and tones of one base color keyed by design-system step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadeRamp {
    shades: [(u16, HexColor); 11],
}

impl ShadeRamp {
    pub fn iter(&self) -> impl Iterator<Item = (u16, HexColor)> + '_ {
        self.shades.iter().copied()
    }
}

impl Index<u16> for ShadeRamp {
    type Output = HexColor;

    fn index(&self, step: u16) -> &HexColor {
        self.shades
            .iter()
            .find(|(key, _)| *key == step)
            .map(|(_, color)| color)
            .unwrap_or_else(|| panic!("{step} is not a shade step"))
    }
}

impl Serialize for ShadeRamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.shades.iter().map(|(step, color)| (step, color)))
    }
}

pub fn shade_ramp(base: HexColor) -> ShadeRamp {
    let shades = std::array::from_fn(|i| {
        let color = match ADJUSTMENTS[i] {
            Adjust::Base => base,
            Adjust::Brighten(amount) => shift_lightness(base, LAB_STEP * amount),
            Adjust::Darken(amount) => shift_lightness(base, -LAB_STEP * amount),
        };
        (SHADE_STEPS[i], color)
    });

    ShadeRamp { shades }
}

fn to_lab(color: HexColor) -> Lab {
    let rgb: Srgb<f32> = Srgb::new(color.red, color.green, color.blue).into_format();
    rgb.into_color()
}

fn shift_lightness(color: HexColor, delta: f32) -> HexColor {
    let lab = to_lab(color);
    let lightness = (lab.l + delta).clamp(0.0, 100.0);
    fit_to_gamut(lightness, lab.a, lab.b)
}

/// Keeps the lightness and hue, shrinking chroma until the color is
/// representable in sRGB.
fn fit_to_gamut(lightness: f32, a: f32, b: f32) -> HexColor {
    let at_chroma = |scale: f32| -> Srgb {
        let lab: Lab = Lab::new(lightness, a * scale, b * scale);
        lab.into_color_unclamped()
    };

    let full = at_chroma(1.0);
    if in_gamut(&full) {
        return to_hex(full);
    }

    // Scale 0 is a neutral grey, always in gamut
    let (mut low, mut high) = (0.0_f32, 1.0_f32);
    for _ in 0..GAMUT_SEARCH_STEPS {
        let mid = (low + high) / 2.0;
        if in_gamut(&at_chroma(mid)) {
            low = mid;
        } else {
            high = mid;
        }
    }

    to_hex(at_chroma(low))
}

fn in_gamut(rgb: &Srgb) -> bool {
    [rgb.red, rgb.green, rgb.blue]
        .iter()
        .all(|c| (-GAMUT_EPSILON..=1.0 + GAMUT_EPSILON).contains(c))
}

fn to_hex(rgb: Srgb) -> HexColor {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    HexColor::new(channel(rgb.red), channel(rgb.green), channel(rgb.blue))
}
