//! PNG tile encoder.
//!
//! Turns a composited RGB window into a finished tile: resize to the tile
//! size, apply color enhancement, encode as PNG.
//!
//! # Design Decisions
//!
//! - **Resize first, enhance second**: enhancement runs per output pixel, so
//!   doing it after the resize bounds the work by the tile size rather than
//!   by the source window.
//!
//! - **No aspect preservation for tiles**: a window is always stretched to
//!   a square tile. The window already has the tile's geographic aspect, up
//!   to rounding.
//!
//! - **Transparent placeholder**: tiles with nothing to draw are fully
//!   transparent RGBA so the map underneath shows through.

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

use crate::error::TileError;

use super::compositor::RgbBuffer;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Largest accepted tile edge.
pub const MAX_TILE_SIZE: u32 = 4096;

/// Default bound on the preview's longest side.
pub const DEFAULT_PREVIEW_MAX_SIZE: u32 = 1024;

// =============================================================================
// Color Enhancement
// =============================================================================

/// Per-pixel color adjustments. `1.0` for every factor is the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorEnhancement {
    /// Output = input^(1/gamma); above 1 lightens midtones
    pub gamma: f32,

    /// Linear multiplier applied after gamma
    pub brightness: f32,

    /// Distance from Rec.601 luma; 0 is grayscale
    pub saturation: f32,
}

impl Default for ColorEnhancement {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ColorEnhancement {
    pub const IDENTITY: Self = Self {
        gamma: 1.0,
        brightness: 1.0,
        saturation: 1.0,
    };

    pub fn new(gamma: f32, brightness: f32, saturation: f32) -> Self {
        Self {
            gamma,
            brightness,
            saturation,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Apply in place to an interleaved RGB buffer.
    pub fn apply(&self, rgb: &mut [u8]) {
        if self.is_identity() {
            return;
        }

        // Gamma and brightness act per channel, so a lookup table covers them
        let inv_gamma = 1.0 / self.gamma;
        let mut lut = [0f32; 256];
        for (v, slot) in lut.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *slot = c.powf(inv_gamma) * self.brightness;
        }

        let apply_saturation = self.saturation != 1.0;
        for px in rgb.chunks_exact_mut(3) {
            let mut r = lut[px[0] as usize];
            let mut g = lut[px[1] as usize];
            let mut b = lut[px[2] as usize];

            if apply_saturation {
                let luma = 0.299 * r + 0.587 * g + 0.114 * b;
                r = luma + (r - luma) * self.saturation;
                g = luma + (g - luma) * self.saturation;
                b = luma + (b - luma) * self.saturation;
            }

            px[0] = unit_to_u8(r);
            px[1] = unit_to_u8(g);
            px[2] = unit_to_u8(b);
        }
    }
}

#[inline]
fn unit_to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

// =============================================================================
// Tile Encoder
// =============================================================================

/// Resizes, enhances and PNG-encodes composited windows.
#[derive(Debug, Clone)]
pub struct TileEncoder {
    tile_size: u32,
    enhancement: ColorEnhancement,
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, ColorEnhancement::IDENTITY)
    }
}

impl TileEncoder {
    pub fn new(tile_size: u32, enhancement: ColorEnhancement) -> Self {
        Self {
            tile_size: tile_size.clamp(1, MAX_TILE_SIZE),
            enhancement,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn enhancement(&self) -> ColorEnhancement {
        self.enhancement
    }

    /// Encode a window as a `tile_size x tile_size` PNG.
    ///
    /// # Errors
    ///
    /// Returns `TileError::Encode` if the buffer does not match its stated
    /// dimensions or PNG encoding fails.
    pub fn encode_tile(&self, rgb: RgbBuffer) -> Result<Bytes, TileError> {
        self.render(rgb, self.tile_size, self.tile_size)
    }

    /// Encode a whole-raster composite, shrunk so its longest side is at
    /// most `max_size`.
    pub fn encode_preview(&self, rgb: RgbBuffer, max_size: u32) -> Result<Bytes, TileError> {
        let (w, h) = preview_dimensions(rgb.width, rgb.height, max_size);
        self.render(rgb, w, h)
    }

    /// The transparent placeholder at this encoder's tile size.
    pub fn empty_tile(&self) -> Result<Bytes, TileError> {
        empty_tile(self.tile_size)
    }

    fn render(&self, rgb: RgbBuffer, width: u32, height: u32) -> Result<Bytes, TileError> {
        let (src_w, src_h) = (rgb.width, rgb.height);
        let image = RgbImage::from_raw(src_w, src_h, rgb.data).ok_or_else(|| TileError::Encode {
            message: format!("buffer does not hold a {src_w}x{src_h} RGB image"),
        })?;

        let mut image = if (src_w, src_h) == (width, height) {
            image
        } else {
            imageops::resize(&image, width, height, FilterType::Triangle)
        };

        self.enhancement.apply(&mut image);

        encode_png(image.as_raw(), width, height, ExtendedColorType::Rgb8)
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// A fully transparent `size x size` RGBA PNG.
pub fn empty_tile(size: u32) -> Result<Bytes, TileError> {
    let image = RgbaImage::new(size, size);
    encode_png(image.as_raw(), size, size, ExtendedColorType::Rgba8)
}

/// Output size for a preview: aspect kept, longest side at most `max_size`,
/// never upscaled, never zero.
pub fn preview_dimensions(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_size || longest == 0 {
        return (width.max(1), height.max(1));
    }

    let scale = max_size as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_size);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_size);
    (w, h)
}

fn encode_png(
    data: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
) -> Result<Bytes, TileError> {
    let mut output = Vec::new();
    PngEncoder::new(&mut output)
        .write_image(data, width, height, color)
        .map_err(|e| TileError::Encode {
            message: e.to_string(),
        })?;
    Ok(Bytes::from(output))
}

// =============================================================================
// Tests
// =============================================================================
