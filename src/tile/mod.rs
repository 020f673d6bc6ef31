//! Tile service layer.
//!
//! Turns slippy tile requests into PNG images cut from the raster.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │  get_tile(z/x/y)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌────────────┐  ┌──────────────────┐   │
//! │  │ TileCache  │  │  WindowResolver  │   │
//! │  │  (FIFO)    │  │  (tile → pixels) │   │
//! │  └────────────┘  └──────────────────┘   │
//! │  ┌────────────┐  ┌──────────────────┐   │
//! │  │ Compositor │  │   TileEncoder    │   │
//! │  │ (bands→RGB)│  │ (resize/enh/PNG) │   │
//! │  └────────────┘  └──────────────────┘   │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │       RasterSource  +  Projector        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileService`]: entry point; cache, resolve, composite, encode
//! - [`WindowResolver`]: maps a tile to a pixel window with named outcomes
//! - [`composite_rgb`]: reads bands 1-3 into an interleaved buffer
//! - [`TileEncoder`]: resize, color enhancement and PNG encoding
//! - [`TileCache`]: bounded FIFO cache of encoded tiles
//!
//! # Example
//!
//! ```
//! use raster_tiler::tile::{TileCache, TileKey};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = TileCache::new();
//!     let key = TileKey::new(14, 8800, 5371);
//!
//!     if cache.get(&key).await.is_none() {
//!         cache.put(key, Bytes::from_static(b"png bytes")).await;
//!     }
//!     assert!(cache.contains(&key).await);
//! }
//! ```

mod cache;
mod compositor;
mod encoder;
mod resolver;
mod service;

pub use cache::{TileCache, TileKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use compositor::{
    composite_rgb, composite_rgb_sampled, interleave, to_channel, RgbBuffer, RGB_BANDS,
};
pub use encoder::{
    empty_tile, preview_dimensions, ColorEnhancement, TileEncoder, DEFAULT_PREVIEW_MAX_SIZE,
    DEFAULT_TILE_SIZE, MAX_TILE_SIZE,
};
pub use resolver::{
    candidate_window, clamp_window, fallback_window, CandidateWindow, NoCoverage, Resolution,
    WindowResolver, DEFAULT_HIGH_ZOOM_THRESHOLD, FALLBACK_DIVISOR, OVERSIZE_FRACTION,
};
pub use service::{
    CacheStats, TileOutcome, TileResponse, TileService, TilerSettings, DEFAULT_RENDER_TIMEOUT,
};
