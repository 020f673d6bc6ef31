//! Band compositing.
//!
//! Reads the first three bands of a window and packs them into an
//! interleaved `RGBRGB...` byte buffer ready for the encoder.

use crate::error::RasterError;
use crate::raster::{PixelWindow, RasterSource};

/// Bands used for red, green and blue, 1-based.
pub const RGB_BANDS: [usize; 3] = [1, 2, 3];

/// An interleaved 8-bit RGB buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbBuffer {
    pub width: u32,
    pub height: u32,

    /// `width * height * 3` bytes, row-major
    pub data: Vec<u8>,
}

/// Read bands 1..=3 over `window` and interleave them.
pub async fn composite_rgb<R: RasterSource + ?Sized>(
    raster: &R,
    window: PixelWindow,
) -> Result<RgbBuffer, RasterError> {
    check_rgb_bands(raster)?;

    let red = raster.read_window(RGB_BANDS[0], window).await?;
    let green = raster.read_window(RGB_BANDS[1], window).await?;
    let blue = raster.read_window(RGB_BANDS[2], window).await?;

    let data = interleave(&red, &green, &blue, window.area())?;

    Ok(RgbBuffer {
        width: window.width,
        height: window.height,
        data,
    })
}

/// Like [`composite_rgb`], but nearest-sampled down to `width x height`.
pub async fn composite_rgb_sampled<R: RasterSource + ?Sized>(
    raster: &R,
    window: PixelWindow,
    width: u32,
    height: u32,
) -> Result<RgbBuffer, RasterError> {
    check_rgb_bands(raster)?;

    let red = raster.read_window_sampled(RGB_BANDS[0], window, width, height).await?;
    let green = raster.read_window_sampled(RGB_BANDS[1], window, width, height).await?;
    let blue = raster.read_window_sampled(RGB_BANDS[2], window, width, height).await?;

    let data = interleave(&red, &green, &blue, width as usize * height as usize)?;

    Ok(RgbBuffer {
        width,
        height,
        data,
    })
}

fn check_rgb_bands<R: RasterSource + ?Sized>(raster: &R) -> Result<(), RasterError> {
    let available = raster.band_count();
    if available < RGB_BANDS.len() {
        return Err(RasterError::InsufficientBands {
            required: RGB_BANDS.len(),
            available,
        });
    }
    Ok(())
}

/// Pack three sample planes into one interleaved buffer.
pub fn interleave(
    red: &[f32],
    green: &[f32],
    blue: &[f32],
    pixels: usize,
) -> Result<Vec<u8>, RasterError> {
    if red.len() != pixels || green.len() != pixels || blue.len() != pixels {
        return Err(RasterError::Read(format!(
            "band planes have {}/{}/{} samples, expected {}",
            red.len(),
            green.len(),
            blue.len(),
            pixels
        )));
    }

    let mut out = Vec::with_capacity(pixels * 3);
    for i in 0..pixels {
        out.push(to_channel(red[i]));
        out.push(to_channel(green[i]));
        out.push(to_channel(blue[i]));
    }
    Ok(out)
}

/// Coerce a raw sample into an 8-bit channel.
///
/// Values are rounded and clamped to `0..=255`. NaN maps to 0.
#[inline]
pub fn to_channel(sample: f32) -> u8 {
    if sample.is_nan() {
        return 0;
    }
    sample.round().clamp(0.0, 255.0) as u8
}
