//! Coordinate transform layer.
//!
//! Converts between the four coordinate spaces a tile request passes through:
//!
//! ```text
//! tile (z/x/y) ──► lon/lat (WGS84) ──► native CRS ──► raster pixel (col, row)
//!     tile_to_lon_lat     lon_lat_to_native    native_to_pixel
//! ```
//!
//! Only the middle step needs a CRS database; it is delegated to a
//! [`Projector`].

mod coords;
mod projection;

pub use coords::{
    is_valid_tile, lon_lat_to_native, lon_lat_to_pixel, lon_lat_to_tile, native_to_pixel,
    tile_center_lon_lat, tile_to_lon_lat, tiles_per_axis, MAX_ZOOM,
};
pub use projection::{resolve_proj_string, IdentityProjector, Proj4Projector, Projector, WGS84};
