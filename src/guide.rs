//! Page layout of the generated style guide. Rendering is left to the
//! client; this only decides what goes on each page.

use crate::engine::{
    contrast_ratio, text_color, ColorProfile, HexColor, DARK_FOREGROUND, LIGHT_FOREGROUND,
};
use crate::error::RejectionError;
use crate::selection::Selection;
use serde::Serialize;

pub const DEFAULT_TITLE: &str = "Design Style Guide";
/// Neutral backdrop for the dark logo variant.
pub const NEUTRAL_BACKGROUND: HexColor = HexColor::new(0xe5, 0xe7, 0xeb);
const BLACK: HexColor = HexColor::new(0, 0, 0);
const WHITE: HexColor = HexColor::new(255, 255, 255);

const TYPE_SCALE: [(&str, f32, u16); 5] = [
    ("display", 4.5, 600),
    ("heading", 3.0, 600),
    ("subheading", 2.25, 600),
    ("body", 1.0, 400),
    ("caption", 0.75, 500),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoTreatment {
    /// Logo washed out to white.
    Light,
    /// Logo pushed down to black.
    Dark,
}

impl LogoTreatment {
    pub fn for_background(background: HexColor) -> Self {
        if text_color(background) == LIGHT_FOREGROUND {
            LogoTreatment::Light
        } else {
            LogoTreatment::Dark
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoPlacement {
    pub label: &'static str,
    pub background: HexColor,
    pub treatment: LogoTreatment,
}

impl LogoPlacement {
    fn on(label: &'static str, background: HexColor) -> Self {
        Self {
            label,
            background,
            treatment: LogoTreatment::for_background(background),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeSample {
    pub role: &'static str,
    pub size_rem: f32,
    pub weight: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypePairing {
    pub background: HexColor,
    pub foreground: &'static str,
    pub contrast_ratio: f64,
}

impl TypePairing {
    fn on(background: HexColor) -> Self {
        let foreground = text_color(background);
        let foreground_hex = if foreground == DARK_FOREGROUND {
            BLACK
        } else {
            WHITE
        };
        Self {
            background,
            foreground,
            contrast_ratio: contrast_ratio(background, foreground_hex),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Page {
    Cover {
        title: String,
        background: HexColor,
        logo: LogoPlacement,
    },
    Logo {
        placements: Vec<LogoPlacement>,
    },
    Colors {
        primary: ColorProfile,
        secondary: ColorProfile,
    },
    Typography {
        sample: String,
        scale: Vec<TypeSample>,
        pairings: Vec<TypePairing>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StyleGuide {
    pub primary: HexColor,
    pub secondary: HexColor,
    pub pages: Vec<Page>,
}

impl StyleGuide {
    pub fn new(primary: HexColor, secondary: HexColor, brand: Option<&str>) -> Self {
        let brand = brand.map(str::trim).filter(|text| !text.is_empty());
        let title = brand.unwrap_or(DEFAULT_TITLE).to_string();
        let sample = brand.unwrap_or("The quick brown fox jumps over the lazy dog").to_string();

        let pages = vec![
            Page::Cover {
                title,
                background: primary,
                logo: LogoPlacement::on("primary", primary),
            },
            Page::Logo {
                placements: vec![
                    LogoPlacement::on("primary", primary),
                    LogoPlacement::on("neutral", NEUTRAL_BACKGROUND),
                    LogoPlacement::on("secondary", secondary),
                ],
            },
            Page::Colors {
                primary: ColorProfile::derive(primary),
                secondary: ColorProfile::derive(secondary),
            },
            Page::Typography {
                sample,
                scale: TYPE_SCALE
                    .iter()
                    .map(|&(role, size_rem, weight)| TypeSample {
                        role,
                        size_rem,
                        weight,
                    })
                    .collect(),
                pairings: vec![TypePairing::on(primary), TypePairing::on(secondary)],
            },
        ];

        Self {
            primary,
            secondary,
            pages,
        }
    }

    /// Compose the guide for a selection, which must have both roles.
    pub fn compose(selection: &Selection, brand: Option<&str>) -> Result<Self, RejectionError> {
        let (primary, secondary) = selection
            .roles()
            .ok_or(RejectionError::IncompleteSelection)?;
        Ok(Self::new(primary, secondary, brand))
    }
}
