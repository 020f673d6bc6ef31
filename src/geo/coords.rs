//! Slippy-tile, geographic, native and pixel coordinate conversions.
//!
//! All functions here are pure. Reprojection into the raster's native CRS
//! goes through a [`Projector`] so it can be swapped out in tests.

use std::f64::consts::PI;

use crate::error::ProjectionError;
use crate::raster::RasterInfo;

use super::projection::{Projector, WGS84};

/// Deepest zoom level accepted for tile requests.
pub const MAX_ZOOM: u32 = 30;

/// Number of tiles along one axis at zoom `z`.
#[inline]
pub fn tiles_per_axis(z: u32) -> f64 {
    2f64.powi(z as i32)
}

/// Whether `(z, x, y)` names a tile inside the standard grid.
pub fn is_valid_tile(z: u32, x: u32, y: u32) -> bool {
    if z > MAX_ZOOM {
        return false;
    }
    let n = 1u64 << z;
    (x as u64) < n && (y as u64) < n
}

/// Web-Mercator tile coordinates to longitude/latitude in degrees.
///
/// Accepts fractional coordinates so callers can address tile corners
/// (`x + 1`) and centers (`x + 0.5`). Rows outside `[0, 2^z]` produce
/// numbers that are valid but geographically meaningless.
pub fn tile_to_lon_lat(x: f64, y: f64, z: u32) -> (f64, f64) {
    let n = tiles_per_axis(z);
    let lon = x / n * 360.0 - 180.0;
    let m = PI - 2.0 * PI * y / n;
    let lat = m.sinh().atan().to_degrees();
    (lon, lat)
}

/// Inverse of [`tile_to_lon_lat`], returning fractional tile coordinates.
pub fn lon_lat_to_tile(lon: f64, lat: f64, z: u32) -> (f64, f64) {
    let n = tiles_per_axis(z);
    let x = (lon + 180.0) / 360.0 * n;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// Center of tile `(z, x, y)` in longitude/latitude.
pub fn tile_center_lon_lat(z: u32, x: u32, y: u32) -> (f64, f64) {
    tile_to_lon_lat(x as f64 + 0.5, y as f64 + 0.5, z)
}

/// Project a WGS84 longitude/latitude into the raster's native CRS.
pub fn lon_lat_to_native<P: Projector + ?Sized>(
    projector: &P,
    lon: f64,
    lat: f64,
    native_crs: Option<&str>,
) -> Result<(f64, f64), ProjectionError> {
    let crs = native_crs
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(ProjectionError::MissingCrs)?;
    let (px, py) = projector.reproject(WGS84, crs, (lon, lat))?;
    if !px.is_finite() || !py.is_finite() {
        return Err(ProjectionError::NonFinite { x: px, y: py });
    }
    Ok((px, py))
}

/// Native projected coordinates to raster pixel `(col, row)`.
///
/// Inverts the geotransform ignoring the skew terms; the rasters this
/// server targets are north-up. A zero or non-finite pixel size yields
/// [`ProjectionError::NonFinite`].
pub fn native_to_pixel(px: f64, py: f64, info: &RasterInfo) -> Result<(i64, i64), ProjectionError> {
    let col = ((px - info.origin_x) / info.pixel_width).round();
    let row = ((py - info.origin_y) / info.pixel_height).round();
    if !col.is_finite() || !row.is_finite() {
        return Err(ProjectionError::NonFinite { x: col, y: row });
    }
    // Saturates far outside the raster; callers use saturating arithmetic
    Ok((col as i64, row as i64))
}

/// Convenience composition: longitude/latitude straight to pixel coordinates.
pub fn lon_lat_to_pixel<P: Projector + ?Sized>(
    projector: &P,
    lon: f64,
    lat: f64,
    info: &RasterInfo,
) -> Result<(i64, i64), ProjectionError> {
    let (px, py) = lon_lat_to_native(projector, lon, lat, info.projection.as_deref())?;
    native_to_pixel(px, py, info)
}
