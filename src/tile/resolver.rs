//! Tile-to-pixel window resolution.
//!
//! Maps a slippy tile onto the rectangle of raster pixels it covers. Each
//! of the tile's four corners is reprojected on its own, since the native
//! projection is generally not affine over a tile's extent. The bounding
//! box of the four pixel positions becomes the candidate window, which is
//! then validated:
//!
//! ```text
//! corners ──► candidate ──► outside / degenerate? ──► NoCoverage
//!                  │
//!                  ▼
//!          oversized (> 50% of raster)?
//!            ├─ z >= high-zoom threshold ──► FixedFallback (square around center)
//!            └─ otherwise ──────────────────► NoCoverage
//!                  │
//!                  ▼
//!              clamp to raster ──► Clamped  (or NoCoverage if it collapses)
//! ```

use std::fmt;

use tracing::debug;

use crate::error::ProjectionError;
use crate::geo::{is_valid_tile, lon_lat_to_pixel, tile_center_lon_lat, tile_to_lon_lat, Projector};
use crate::raster::{PixelWindow, RasterInfo};

use super::cache::TileKey;

/// Default zoom at and above which oversized windows fall back to a fixed window.
pub const DEFAULT_HIGH_ZOOM_THRESHOLD: u32 = 14;

/// Windows wider or taller than this fraction of the raster are suspect.
pub const OVERSIZE_FRACTION: f64 = 0.5;

/// Fallback windows are `min(width, height) / FALLBACK_DIVISOR` pixels square.
pub const FALLBACK_DIVISOR: u32 = 10;

// =============================================================================
// Outcomes
// =============================================================================

/// Why a tile has nothing to draw.
#[derive(Debug, Clone, PartialEq)]
pub enum NoCoverage {
    /// Tile address outside the `2^z` grid
    InvalidTile,

    /// The raster has no pixels
    EmptyRaster,

    /// A corner or the center could not be reprojected
    Projection(ProjectionError),

    /// The window does not touch the raster
    OutsideRaster,

    /// Corners collapsed onto a line or a point
    Degenerate,

    /// Window too large at a zoom where no fallback applies
    Oversized { width: i64, height: i64 },

    /// Nothing left after clamping to the raster
    ClampedAway,
}

impl fmt::Display for NoCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoCoverage::InvalidTile => write!(f, "tile outside the zoom grid"),
            NoCoverage::EmptyRaster => write!(f, "raster has no pixels"),
            NoCoverage::Projection(e) => write!(f, "projection failed: {e}"),
            NoCoverage::OutsideRaster => write!(f, "outside raster"),
            NoCoverage::Degenerate => write!(f, "degenerate window"),
            NoCoverage::Oversized { width, height } => {
                write!(f, "oversized window {width}x{height}")
            }
            NoCoverage::ClampedAway => write!(f, "window empty after clamping"),
        }
    }
}

/// Result of resolving a tile.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Geometric window, clamped to the raster
    Clamped(PixelWindow),

    /// Fixed-size square around the tile center
    FixedFallback(PixelWindow),

    NoCoverage(NoCoverage),
}

impl Resolution {
    /// The window to read, if any.
    pub fn window(&self) -> Option<PixelWindow> {
        match self {
            Resolution::Clamped(w) | Resolution::FixedFallback(w) => Some(*w),
            Resolution::NoCoverage(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::FixedFallback(_))
    }
}

/// Unvalidated bounding box of the tile's corners in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateWindow {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves tiles to pixel windows for one raster.
#[derive(Debug, Clone, Copy)]
pub struct WindowResolver {
    high_zoom_threshold: u32,
}

impl Default for WindowResolver {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_ZOOM_THRESHOLD)
    }
}

impl WindowResolver {
    pub fn new(high_zoom_threshold: u32) -> Self {
        Self {
            high_zoom_threshold,
        }
    }

    pub fn high_zoom_threshold(&self) -> u32 {
        self.high_zoom_threshold
    }

    /// Resolve `key` against `info`.
    ///
    /// Never returns a window that violates the raster bounds.
    pub fn resolve<P: Projector + ?Sized>(
        &self,
        key: TileKey,
        info: &RasterInfo,
        projector: &P,
    ) -> Resolution {
        if !is_valid_tile(key.z, key.x, key.y) {
            return Resolution::NoCoverage(NoCoverage::InvalidTile);
        }

        if info.width == 0 || info.height == 0 {
            return Resolution::NoCoverage(NoCoverage::EmptyRaster);
        }

        let candidate = match candidate_window(key, info, projector) {
            Ok(c) => c,
            Err(e) => return Resolution::NoCoverage(NoCoverage::Projection(e)),
        };

        let raster_w = info.width as i64;
        let raster_h = info.height as i64;

        if candidate.width <= 0 || candidate.height <= 0 {
            return Resolution::NoCoverage(NoCoverage::Degenerate);
        }

        if candidate.x >= raster_w
            || candidate.y >= raster_h
            || candidate.x.saturating_add(candidate.width) <= 0
            || candidate.y.saturating_add(candidate.height) <= 0
        {
            return Resolution::NoCoverage(NoCoverage::OutsideRaster);
        }

        let oversized = candidate.width as f64 > raster_w as f64 * OVERSIZE_FRACTION
            || candidate.height as f64 > raster_h as f64 * OVERSIZE_FRACTION;

        if oversized {
            if key.z < self.high_zoom_threshold {
                return Resolution::NoCoverage(NoCoverage::Oversized {
                    width: candidate.width,
                    height: candidate.height,
                });
            }

            debug!(
                tile = %key,
                width = candidate.width,
                height = candidate.height,
                "Oversized window at high zoom, using fixed fallback"
            );
            return match fallback_window(key, info, projector) {
                Ok(w) => Resolution::FixedFallback(w),
                Err(e) => Resolution::NoCoverage(NoCoverage::Projection(e)),
            };
        }

        match clamp_window(candidate, info.width, info.height) {
            Some(w) => Resolution::Clamped(w),
            None => Resolution::NoCoverage(NoCoverage::ClampedAway),
        }
    }
}

/// Reproject the four tile corners and take their pixel bounding box.
///
/// Pixel positions far outside the raster saturate at the `i64` range,
/// so width and height saturate rather than overflow.
pub fn candidate_window<P: Projector + ?Sized>(
    key: TileKey,
    info: &RasterInfo,
    projector: &P,
) -> Result<CandidateWindow, ProjectionError> {
    let (x, y) = (key.x as f64, key.y as f64);
    let corners = [
        tile_to_lon_lat(x, y, key.z),
        tile_to_lon_lat(x + 1.0, y, key.z),
        tile_to_lon_lat(x, y + 1.0, key.z),
        tile_to_lon_lat(x + 1.0, y + 1.0, key.z),
    ];

    let mut min_col = i64::MAX;
    let mut max_col = i64::MIN;
    let mut min_row = i64::MAX;
    let mut max_row = i64::MIN;

    for (lon, lat) in corners {
        let (col, row) = lon_lat_to_pixel(projector, lon, lat, info)?;
        min_col = min_col.min(col);
        max_col = max_col.max(col);
        min_row = min_row.min(row);
        max_row = max_row.max(row);
    }

    Ok(CandidateWindow {
        x: min_col,
        y: min_row,
        width: max_col.saturating_sub(min_col),
        height: max_row.saturating_sub(min_row),
    })
}

/// Square window of side `min(W, H) / 10` centered on the tile center,
/// shifted as needed to stay inside the raster.
pub fn fallback_window<P: Projector + ?Sized>(
    key: TileKey,
    info: &RasterInfo,
    projector: &P,
) -> Result<PixelWindow, ProjectionError> {
    let (lon, lat) = tile_center_lon_lat(key.z, key.x, key.y);
    let (cx, cy) = lon_lat_to_pixel(projector, lon, lat, info)?;

    let side = (info.width.min(info.height) / FALLBACK_DIVISOR).max(1);
    let half = side as i64 / 2;

    let x = cx.saturating_sub(half).clamp(0, info.width.saturating_sub(side) as i64);
    let y = cy.saturating_sub(half).clamp(0, info.height.saturating_sub(side) as i64);

    Ok(PixelWindow::new(x as u32, y as u32, side, side))
}

/// Intersect a candidate with the raster. `None` if nothing remains.
pub fn clamp_window(
    candidate: CandidateWindow,
    raster_width: u32,
    raster_height: u32,
) -> Option<PixelWindow> {
    let x0 = candidate.x.max(0);
    let y0 = candidate.y.max(0);
    let x1 = candidate.x.saturating_add(candidate.width).min(raster_width as i64);
    let y1 = candidate.y.saturating_add(candidate.height).min(raster_height as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(PixelWindow::new(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}

// =============================================================================
// Tests
// =============================================================================
