use crate::engine::{to_hsl, HexColor};
use crate::error::DecodeError;
use crate::upload::ImageKind;
use image::{imageops, ImageFormat, RgbaImage};
use resvg::{tiny_skia, usvg};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub const MAX_SWATCHES: usize = 5;
/// Larger images are downscaled to roughly this many pixels before sampling.
const MAX_SAMPLED_PIXELS: u32 = 64_000;
/// Pixels more transparent than this are background, not logo.
const MIN_ALPHA: u8 = 250;
/// Bits dropped per channel when bucketing colors.
const QUANTIZE_SHIFT: u8 = 4;
/// Longest side of a rasterized SVG.
const SVG_RASTER_SIZE: f32 = 256.0;

/// One dominant color and the share of the image it covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Swatch {
    pub hex: HexColor,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
    pub intensity: f64,
    pub area: f64,
}

impl Swatch {
    pub fn new(color: HexColor, area: f64) -> Self {
        let hsl = to_hsl(color);
        Self {
            hex: color,
            red: color.red,
            green: color.green,
            blue: color.blue,
            hue: hsl.hue,
            saturation: hsl.saturation,
            lightness: hsl.lightness,
            intensity: hsl.saturation * (1.0 - (2.0 * hsl.lightness - 1.0).abs()),
            area,
        }
    }
}

#[derive(Default)]
struct Bucket {
    count: u64,
    sums: [u64; 3],
}

pub struct ColorAnalyzer {
    max_swatches: usize,
    max_pixels: u32,
    fonts: Arc<usvg::fontdb::Database>,
}

impl Default for ColorAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorAnalyzer {
    pub fn new() -> Self {
        // Text-only logos need fonts to rasterize
        let mut fonts = usvg::fontdb::Database::new();
        fonts.load_system_fonts();

        Self {
            max_swatches: MAX_SWATCHES,
            max_pixels: MAX_SAMPLED_PIXELS,
            fonts: Arc::new(fonts),
        }
    }

    /// Decode `bytes` and rank its dominant colors by area, largest first.
    /// An image without a single opaque pixel is an error.
    pub fn analyze(&self, bytes: &[u8], kind: ImageKind) -> Result<Vec<Swatch>, DecodeError> {
        let image = match kind {
            ImageKind::Png => decode_raster(bytes, ImageFormat::Png)?,
            ImageKind::Jpeg => decode_raster(bytes, ImageFormat::Jpeg)?,
            ImageKind::Svg => self.rasterize_svg(bytes)?,
        };

        let swatches = self.extract(&image);
        if swatches.is_empty() {
            return Err(DecodeError::NoOpaquePixels);
        }
        Ok(swatches)
    }

    pub fn extract(&self, image: &RgbaImage) -> Vec<Swatch> {
        let sampled = self.downscale(image);
        let total = sampled.width() as u64 * sampled.height() as u64;
        if total == 0 {
            return Vec::new();
        }

        let mut buckets: HashMap<[u8; 3], Bucket> = HashMap::new();
        for pixel in sampled.pixels() {
            let [r, g, b, a] = pixel.0;
            if a < MIN_ALPHA {
                continue;
            }
            let key = [r, g, b].map(|c| c >> QUANTIZE_SHIFT);
            let bucket = buckets.entry(key).or_default();
            bucket.count += 1;
            for (sum, channel) in bucket.sums.iter_mut().zip([r, g, b]) {
                *sum += channel as u64;
            }
        }

        let mut ranked: Vec<_> = buckets.into_iter().collect();
        // Key order breaks ties so equal areas rank the same way every run
        ranked.sort_by(|(key_a, a), (key_b, b)| b.count.cmp(&a.count).then(key_a.cmp(key_b)));

        ranked
            .into_iter()
            .take(self.max_swatches)
            .map(|(_, bucket)| {
                let [r, g, b] = bucket
                    .sums
                    .map(|sum| ((sum as f64 / bucket.count as f64).round()) as u8);
                Swatch::new(HexColor::new(r, g, b), bucket.count as f64 / total as f64)
            })
            .collect()
    }

    fn downscale(&self, image: &RgbaImage) -> RgbaImage {
        let (width, height) = image.dimensions();
        let pixels = width as u64 * height as u64;
        if pixels <= self.max_pixels as u64 {
            return image.clone();
        }

        let scale = (self.max_pixels as f64 / pixels as f64).sqrt();
        let new_width = ((width as f64 * scale).round() as u32).max(1);
        let new_height = ((height as f64 * scale).round() as u32).max(1);
        imageops::thumbnail(image, new_width, new_height)
    }

    fn rasterize_svg(&self, bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
        let options = usvg::Options {
            fontdb: self.fonts.clone(),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_data(bytes, &options)?;
        let size = tree.size();
        let longest = size.width().max(size.height());
        if !longest.is_finite() || longest <= 0.0 {
            return Err(DecodeError::InvalidViewport);
        }

        let scale = SVG_RASTER_SIZE / longest;
        let width = ((size.width() * scale).ceil() as u32).max(1);
        let height = ((size.height() * scale).ceil() as u32).max(1);
        let mut pixmap =
            tiny_skia::Pixmap::new(width, height).ok_or(DecodeError::InvalidViewport)?;
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        // tiny-skia stores premultiplied alpha
        let data = pixmap
            .pixels()
            .iter()
            .flat_map(|pixel| {
                let color = pixel.demultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect();

        RgbaImage::from_raw(width, height, data).ok_or(DecodeError::InvalidViewport)
    }
}

fn decode_raster(bytes: &[u8], format: ImageFormat) -> Result<RgbaImage, DecodeError> {
    Ok(image::load_from_memory_with_format(bytes, format)?.to_rgba8())
}
