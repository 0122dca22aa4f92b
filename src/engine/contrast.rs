use super::HexColor;

/// Foreground used on light backgrounds.
pub const DARK_FOREGROUND: &str = "#000";
/// Foreground used on dark backgrounds.
pub const LIGHT_FOREGROUND: &str = "#fff";

const LUMINANCE_THRESHOLD: f64 = 0.5;

fn linearize(channel: f64) -> f64 {
    if channel <= 0.03928 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

/// Calculate relative luminance of a color
pub fn relative_luminance(color: HexColor) -> f64 {
    let [r, g, b] = color.normalized().map(linearize);

    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Pick the foreground that stays readable on top of `background`
pub fn text_color(background: HexColor) -> &'static str {
    if relative_luminance(background) > LUMINANCE_THRESHOLD {
        DARK_FOREGROUND
    } else {
        LIGHT_FOREGROUND
    }
}

/// Calculate contrast ratio between two colors
pub fn contrast_ratio(color1: HexColor, color2: HexColor) -> f64 {
    let l1 = relative_luminance(color1);
    let l2 = relative_luminance(color2);

    let lighter = l1.max(l2);
    let darker = l1.min(l2);

    (lighter + 0.05) / (darker + 0.05)
}
