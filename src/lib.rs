//! # Raster Tiler
//!
//! A slippy-map tile server for a single large georeferenced raster.
//!
//! Each `z/x/y` request is mapped onto the raster: the tile's four corners
//! are reprojected into the raster's native CRS, converted to pixels, and
//! the resulting window is read, composited to RGB, resized, color
//! corrected and served as PNG. Tiles that do not touch the raster come
//! back as transparent placeholders, never as HTTP errors.
//!
//! ## Features
//!
//! - **Pure Rust stack**: GeoTIFF via `tiff`, reprojection via `proj4rs`
//! - **High-zoom fallback**: oversized windows at deep zoom switch to a
//!   fixed-size window around the tile center instead of going blank
//! - **Bounded FIFO tile cache** with `X-Cache: HIT|MISS` reporting
//! - **Graceful degradation**: a missing raster or a failed read yields
//!   empty tiles while the server keeps running
//!
//! ## Architecture
//!
//! - [`geo`] - tile/lon-lat math and the projection service
//! - [`raster`] - raster metadata, the `RasterSource` trait and GeoTIFF reader
//! - [`tile`] - window resolver, compositor, encoder, cache and tile service
//! - [`server`] - Axum handlers and router
//! - [`config`] - CLI and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use raster_tiler::{create_router, GeoTiffRaster, RouterConfig, TileService, TilerSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let raster = GeoTiffRaster::open_async("data/input.tif").await?;
//!     let service = TileService::new(raster, TilerSettings::default())?;
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod raster;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{ProjectionError, RasterError, TileError};
pub use geo::{IdentityProjector, Proj4Projector, Projector};
pub use raster::{Bounds, GeoTiffRaster, MemoryRaster, PixelWindow, RasterInfo, RasterSource};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use tile::{
    ColorEnhancement, NoCoverage, Resolution, TileCache, TileEncoder, TileKey, TileOutcome,
    TileResponse, TileService, TilerSettings, WindowResolver,
};
