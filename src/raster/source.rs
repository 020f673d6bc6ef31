//! The raster source abstraction and an in-memory implementation.

use async_trait::async_trait;

use crate::error::RasterError;

use super::info::{PixelWindow, RasterInfo};

// =============================================================================
// RasterSource Trait
// =============================================================================

/// Read access to a georeferenced, multi-band raster.
///
/// Implementations must allow concurrent reads of disjoint windows. If the
/// underlying storage is not thread-safe the implementation is expected to
/// serialize access internally.
#[async_trait]
pub trait RasterSource: Send + Sync + 'static {
    /// Metadata computed when the raster was opened.
    fn info(&self) -> &RasterInfo;

    /// Number of bands available.
    fn band_count(&self) -> usize;

    /// Read one band over `window`.
    ///
    /// `band` is 1-based. Returns `window.width * window.height` samples in
    /// row-major order.
    async fn read_window(&self, band: usize, window: PixelWindow)
        -> Result<Vec<f32>, RasterError>;

    /// Read one band over `window`, nearest-neighbour sampled to
    /// `out_width * out_height` samples in row-major order.
    ///
    /// The default reads the whole window first. Sources that can skip
    /// unsampled pixels should override it.
    async fn read_window_sampled(
        &self,
        band: usize,
        window: PixelWindow,
        out_width: u32,
        out_height: u32,
    ) -> Result<Vec<f32>, RasterError> {
        let full = self.read_window(band, window).await?;
        let xs = sample_positions(0, window.width, out_width);
        let ys = sample_positions(0, window.height, out_height);

        let stride = window.width as usize;
        let mut out = Vec::with_capacity(xs.len() * ys.len());
        for &y in &ys {
            let row = y as usize * stride;
            out.extend(xs.iter().map(|&x| full[row + x as usize]));
        }
        Ok(out)
    }
}

/// Nearest source index for each of `count` output samples spread over
/// `start..start + len`. Identity when `count == len`.
pub(crate) fn sample_positions(start: u32, len: u32, count: u32) -> Vec<u32> {
    if len == 0 {
        return Vec::new();
    }
    let (len, count64) = (len as u64, count as u64);
    (0..count64)
        .map(|i| start + ((2 * i + 1) * len / (2 * count64)) as u32)
        .collect()
}

/// Check a read request against the raster extent.
pub(crate) fn check_window(
    info: &RasterInfo,
    band_count: usize,
    band: usize,
    window: PixelWindow,
) -> Result<(), RasterError> {
    if band == 0 || band > band_count || !window.fits_within(info.width, info.height) {
        return Err(RasterError::WindowOutOfBounds {
            band,
            x: window.x,
            y: window.y,
            width: window.width,
            height: window.height,
            raster_width: info.width,
            raster_height: info.height,
        });
    }
    Ok(())
}

// =============================================================================
// Memory Raster
// =============================================================================

/// A raster held fully in memory as one sample plane per band.
///
/// Reads take no locks; the planes are immutable after construction.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    info: RasterInfo,
    planes: Vec<Vec<f32>>,
}

impl MemoryRaster {
    /// Build from separate band planes, each `width * height` samples.
    pub fn from_planes(info: RasterInfo, planes: Vec<Vec<f32>>) -> Result<Self, RasterError> {
        let expected = info.width as usize * info.height as usize;
        if let Some((i, plane)) = planes
            .iter()
            .enumerate()
            .find(|(_, p)| p.len() != expected)
        {
            return Err(RasterError::Corrupt(format!(
                "band {} has {} samples, expected {}",
                i + 1,
                plane.len(),
                expected
            )));
        }
        Ok(Self { info, planes })
    }

    /// Build from pixel-interleaved samples (`b1 b2 .. bn b1 b2 ..`).
    pub fn from_interleaved(
        info: RasterInfo,
        samples: &[f32],
        bands: usize,
    ) -> Result<Self, RasterError> {
        let pixels = info.width as usize * info.height as usize;
        if bands == 0 || samples.len() != pixels * bands {
            return Err(RasterError::Corrupt(format!(
                "{} samples do not form {} band(s) of {}x{}",
                samples.len(),
                bands,
                info.width,
                info.height
            )));
        }

        let mut planes = vec![Vec::with_capacity(pixels); bands];
        for pixel in samples.chunks_exact(bands) {
            for (plane, &value) in planes.iter_mut().zip(pixel) {
                plane.push(value);
            }
        }
        Ok(Self { info, planes })
    }

    /// A raster where every band is filled with a constant value.
    pub fn constant(info: RasterInfo, values: &[f32]) -> Self {
        let pixels = info.width as usize * info.height as usize;
        let planes = values.iter().map(|&v| vec![v; pixels]).collect();
        Self { info, planes }
    }
}

#[async_trait]
impl RasterSource for MemoryRaster {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn band_count(&self) -> usize {
        self.planes.len()
    }

    async fn read_window(
        &self,
        band: usize,
        window: PixelWindow,
    ) -> Result<Vec<f32>, RasterError> {
        check_window(&self.info, self.planes.len(), band, window)?;

        let plane = &self.planes[band - 1];
        let stride = self.info.width as usize;
        let x0 = window.x as usize;
        let mut out = Vec::with_capacity(window.area());
        for row in window.y as usize..(window.y + window.height) as usize {
            let start = row * stride + x0;
            out.extend_from_slice(&plane[start..start + window.width as usize]);
        }
        Ok(out)
    }
}
