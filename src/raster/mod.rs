//! Raster access layer.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Tile resolver / compositor      │
//! └────────────────────┬────────────────────┘
//!                      │  info(), read_window(band, window)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           RasterSource Trait            │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │  GeoTiffRaster  │    │    MemoryRaster     │
//! │ (chunks on read)│    │  (planes in memory) │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod geotiff;
mod info;
mod source;

pub use geotiff::{GeoTiffRaster, DEFAULT_CHUNK_CACHE_CAPACITY};
pub use info::{Bounds, PixelWindow, RasterInfo};
pub use source::{MemoryRaster, RasterSource};
