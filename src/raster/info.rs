//! Raster metadata and pixel windows.

use serde::Serialize;

// =============================================================================
// Bounds
// =============================================================================

/// Extent of the raster in its native projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

// =============================================================================
// Raster Info
// =============================================================================

/// Immutable description of the source raster.
///
/// Computed once when the raster is opened. The geotransform follows the
/// usual six-coefficient layout:
///
/// ```text
/// x = origin_x + col * pixel_width + row * skew_x
/// y = origin_y + col * skew_y      + row * pixel_height
/// ```
///
/// `pixel_height` is negative for north-up rasters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterInfo {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Projected X of pixel (0, 0)
    pub origin_x: f64,

    /// Projected Y of pixel (0, 0)
    pub origin_y: f64,

    pub pixel_width: f64,
    pub pixel_height: f64,
    pub skew_x: f64,
    pub skew_y: f64,

    /// CRS descriptor, e.g. `EPSG:32633`
    pub projection: Option<String>,

    /// Extent derived from origin and pixel size
    pub bounds: Bounds,
}

impl RasterInfo {
    /// Build from dimensions and a geotransform
    /// `[origin_x, pixel_width, skew_x, origin_y, skew_y, pixel_height]`.
    pub fn new(width: u32, height: u32, geotransform: [f64; 6]) -> Self {
        let [origin_x, pixel_width, skew_x, origin_y, skew_y, pixel_height] = geotransform;

        let far_x = origin_x + width as f64 * pixel_width;
        let far_y = origin_y + height as f64 * pixel_height;

        Self {
            width,
            height,
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            skew_x,
            skew_y,
            projection: None,
            bounds: Bounds {
                min_x: origin_x.min(far_x),
                min_y: origin_y.min(far_y),
                max_x: origin_x.max(far_x),
                max_y: origin_y.max(far_y),
            },
        }
    }

    /// Attach a CRS descriptor.
    pub fn with_projection(mut self, projection: Option<String>) -> Self {
        self.projection = projection;
        self
    }

    /// The geotransform as six coefficients.
    pub fn geotransform(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.skew_x,
            self.origin_y,
            self.skew_y,
            self.pixel_height,
        ]
    }

    /// The window covering the whole raster.
    pub fn full_window(&self) -> PixelWindow {
        PixelWindow::new(0, 0, self.width, self.height)
    }
}

// =============================================================================
// Pixel Window
// =============================================================================

/// A sub-rectangle of raster pixel space.
///
/// Windows handed to a [`RasterSource`](super::RasterSource) are always
/// non-empty and inside the raster; the resolver guarantees this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelWindow {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the window lies inside a raster of the given size.
    pub fn fits_within(&self, raster_width: u32, raster_height: u32) -> bool {
        !self.is_empty()
            && self.x as u64 + self.width as u64 <= raster_width as u64
            && self.y as u64 + self.height as u64 <= raster_height as u64
    }
}
