use super::HexColor;

/// HSL components: hue in degrees, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

pub fn to_hsl(color: HexColor) -> Hsl {
    let [r, g, b] = color.normalized();
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;

    // Achromatic
    if max == min {
        return Hsl {
            hue: 0.0,
            saturation: 0.0,
            lightness,
        };
    }

    let delta = max - min;
    let saturation = if lightness > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let sector = if max == r {
        (g - b) / delta + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    Hsl {
        hue: sector * 60.0,
        saturation,
        lightness,
    }
}

/// `"(R, G, B)"`
pub fn rgb_string(color: HexColor) -> String {
    format!("({}, {}, {})", color.red, color.green, color.blue)
}

/// `"(H, S%, L%)"`, every component rounded to an integer.
pub fn hsl_string(color: HexColor) -> String {
    let hsl = to_hsl(color);
    format!(
        "({}, {}%, {}%)",
        hsl.hue.round() as u16,
        (hsl.saturation * 100.0).round() as u8,
        (hsl.lightness * 100.0).round() as u8
    )
}
