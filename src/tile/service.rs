//! Tile Service for orchestrating tile generation.
//!
//! The TileService is the main entry point for tile requests. It owns the
//! shared raster handle, the projector, the tile cache and the encoder, and
//! drives each request through:
//!
//! ```text
//! CacheLookup ──HIT──────────────────────────────────────────► return cached
//!      │
//!     MISS
//!      ▼
//! ResolveWindow ──NoCoverage────────────────────────────────► empty tile
//!      │
//!   Clamped / FixedFallback
//!      ▼
//! Composite ──► Encode (blocking pool) ──► CacheStore ──────► return
//!      │              │
//!      └── error / timeout ─────────────────────────────────► empty tile
//! ```
//!
//! Every path ends in exactly one image. The transparent placeholder is
//! encoded once at construction and shared by all empty responses; it is
//! never written to the cache.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::TileError;
use crate::geo::{Proj4Projector, Projector};
use crate::raster::{RasterInfo, RasterSource};

use super::cache::{TileCache, TileKey, DEFAULT_TILE_CACHE_CAPACITY};
use super::compositor::{composite_rgb, composite_rgb_sampled};
use super::encoder::{
    preview_dimensions, ColorEnhancement, TileEncoder, DEFAULT_PREVIEW_MAX_SIZE, DEFAULT_TILE_SIZE,
};
use super::resolver::{Resolution, WindowResolver, DEFAULT_HIGH_ZOOM_THRESHOLD};

/// Default budget for rendering one tile or preview.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Settings
// =============================================================================

/// Rendering parameters consumed by [`TileService`].
#[derive(Debug, Clone)]
pub struct TilerSettings {
    /// Edge of every served tile in pixels
    pub tile_size: u32,

    /// Maximum number of cached tiles
    pub cache_capacity: usize,

    /// Zoom at which oversized windows switch to the fixed fallback
    pub high_zoom_threshold: u32,

    pub enhancement: ColorEnhancement,

    /// Longest side of the preview image
    pub preview_max_size: u32,

    /// Upper bound on a single render, after which an empty tile is served
    pub render_timeout: Duration,
}

impl Default for TilerSettings {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
            high_zoom_threshold: DEFAULT_HIGH_ZOOM_THRESHOLD,
            enhancement: ColorEnhancement::IDENTITY,
            preview_max_size: DEFAULT_PREVIEW_MAX_SIZE,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// How a tile response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    /// Rendered from the geometric window
    Covered,

    /// Rendered from the fixed high-zoom window
    Fallback,

    /// Transparent placeholder
    Empty,

    /// Served from the cache
    Cached,
}

impl TileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileOutcome::Covered => "covered",
            TileOutcome::Fallback => "fallback",
            TileOutcome::Empty => "empty",
            TileOutcome::Cached => "cached",
        }
    }
}

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// PNG bytes
    pub data: Bytes,

    /// Whether this tile was served from cache
    pub cache_hit: bool,

    pub outcome: TileOutcome,
}

/// Snapshot of the tile cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub bytes: usize,
}

// =============================================================================
// Tile Service
// =============================================================================

enum RasterState<R> {
    Ready(Arc<R>),
    Unavailable(String),
}

/// Service for generating and caching tiles.
///
/// # Type Parameters
///
/// * `R` - The raster source (a GeoTIFF in production, in-memory in tests)
/// * `P` - The projector used to reach the raster's native CRS
///
/// # Example
///
/// ```ignore
/// use raster_tiler::raster::GeoTiffRaster;
/// use raster_tiler::tile::{TileKey, TileService, TilerSettings};
///
/// let raster = GeoTiffRaster::open_async("data/input.tif").await?;
/// let service = TileService::new(raster, TilerSettings::default())?;
///
/// let response = service.get_tile(TileKey::new(14, 8800, 5371)).await;
/// println!("{} bytes, cache hit: {}", response.data.len(), response.cache_hit);
/// ```
pub struct TileService<R: RasterSource, P: Projector = Proj4Projector> {
    raster: RasterState<R>,
    projector: P,
    resolver: WindowResolver,
    encoder: TileEncoder,
    cache: TileCache,

    /// Pre-encoded transparent tile
    empty: Bytes,

    preview_max_size: u32,
    render_timeout: Duration,
}

impl<R: RasterSource> TileService<R, Proj4Projector> {
    /// Create a service over `raster` using the PROJ.4 projector.
    pub fn new(raster: R, settings: TilerSettings) -> Result<Self, TileError> {
        Self::with_projector(Arc::new(raster), Proj4Projector::new(), settings)
    }

    /// Create a service whose raster failed to open.
    ///
    /// Tiles are served empty; info and preview report `reason`.
    pub fn unavailable(reason: impl Into<String>, settings: TilerSettings) -> Result<Self, TileError> {
        Self::build(
            RasterState::Unavailable(reason.into()),
            Proj4Projector::new(),
            settings,
        )
    }
}

impl<R: RasterSource, P: Projector> TileService<R, P> {
    /// Create a service with an explicit projector and a shared raster.
    pub fn with_projector(
        raster: Arc<R>,
        projector: P,
        settings: TilerSettings,
    ) -> Result<Self, TileError> {
        Self::build(RasterState::Ready(raster), projector, settings)
    }

    /// Like [`TileService::unavailable`], with an explicit projector.
    pub fn unavailable_with_projector(
        reason: impl Into<String>,
        projector: P,
        settings: TilerSettings,
    ) -> Result<Self, TileError> {
        Self::build(RasterState::Unavailable(reason.into()), projector, settings)
    }

    fn build(raster: RasterState<R>, projector: P, settings: TilerSettings) -> Result<Self, TileError> {
        let encoder = TileEncoder::new(settings.tile_size, settings.enhancement);
        let empty = encoder.empty_tile()?;

        Ok(Self {
            raster,
            projector,
            resolver: WindowResolver::new(settings.high_zoom_threshold),
            encoder,
            cache: TileCache::with_capacity(settings.cache_capacity),
            empty,
            preview_max_size: settings.preview_max_size,
            render_timeout: settings.render_timeout,
        })
    }

    /// Get a tile, using cache when available.
    ///
    /// Never fails: anything that prevents rendering yields the transparent
    /// placeholder, which is not cached.
    pub async fn get_tile(&self, key: TileKey) -> TileResponse {
        if let Some(data) = self.cache.get(&key).await {
            return TileResponse {
                data,
                cache_hit: true,
                outcome: TileOutcome::Cached,
            };
        }

        match self.render_tile(key).await {
            Ok(Some((data, outcome))) => {
                self.cache.put(key, data.clone()).await;
                TileResponse {
                    data,
                    cache_hit: false,
                    outcome,
                }
            }
            Ok(None) => self.empty_response(),
            Err(e) => {
                warn!(tile = %key, error = %e, "Serving empty tile after render failure");
                self.empty_response()
            }
        }
    }

    /// Render a tile without consulting or filling the cache.
    ///
    /// `Ok(None)` means the tile has no coverage.
    pub async fn render_tile(&self, key: TileKey) -> Result<Option<(Bytes, TileOutcome)>, TileError> {
        let raster = self.raster()?;

        match tokio::time::timeout(self.render_timeout, self.render_uncached(raster, key)).await {
            Ok(result) => result,
            Err(_) => Err(TileError::Timeout {
                millis: self.render_timeout.as_millis() as u64,
            }),
        }
    }

    async fn render_uncached(
        &self,
        raster: &Arc<R>,
        key: TileKey,
    ) -> Result<Option<(Bytes, TileOutcome)>, TileError> {
        let (window, outcome) = match self.resolver.resolve(key, raster.info(), &self.projector) {
            Resolution::Clamped(w) => (w, TileOutcome::Covered),
            Resolution::FixedFallback(w) => (w, TileOutcome::Fallback),
            Resolution::NoCoverage(reason) => {
                debug!(tile = %key, %reason, "No coverage");
                return Ok(None);
            }
        };

        debug!(
            tile = %key,
            outcome = outcome.as_str(),
            x = window.x,
            y = window.y,
            width = window.width,
            height = window.height,
            "Resolved window"
        );

        let rgb = composite_rgb(raster.as_ref(), window).await?;

        let encoder = self.encoder.clone();
        let data = tokio::task::spawn_blocking(move || encoder.encode_tile(rgb))
            .await
            .map_err(|e| TileError::Task {
                message: e.to_string(),
            })??;

        Ok(Some((data, outcome)))
    }

    /// Downsampled PNG of the whole raster.
    ///
    /// The raster is sampled at twice the preview size, then filtered down
    /// to it, so only a fraction of the pixels of a large raster is read.
    pub async fn preview(&self) -> Result<Bytes, TileError> {
        let raster = self.raster()?;

        let render = async {
            let info = raster.info();
            let max_size = self.preview_max_size;
            let (width, height) =
                preview_dimensions(info.width, info.height, max_size.saturating_mul(2));
            debug!(width, height, "Sampling raster for preview");

            let rgb =
                composite_rgb_sampled(raster.as_ref(), info.full_window(), width, height).await?;
            let encoder = self.encoder.clone();
            tokio::task::spawn_blocking(move || encoder.encode_preview(rgb, max_size))
                .await
                .map_err(|e| TileError::Task {
                    message: e.to_string(),
                })?
        };

        tokio::time::timeout(self.render_timeout, render)
            .await
            .map_err(|_| TileError::Timeout {
                millis: self.render_timeout.as_millis() as u64,
            })?
    }

    /// Metadata of the served raster.
    pub fn raster_info(&self) -> Result<&RasterInfo, TileError> {
        Ok(self.raster()?.info())
    }

    pub fn is_available(&self) -> bool {
        matches!(self.raster, RasterState::Ready(_))
    }

    fn raster(&self) -> Result<&Arc<R>, TileError> {
        match &self.raster {
            RasterState::Ready(raster) => Ok(raster),
            RasterState::Unavailable(reason) => Err(TileError::RasterUnavailable {
                reason: reason.clone(),
            }),
        }
    }

    /// The transparent placeholder served for empty tiles.
    pub fn empty_tile(&self) -> Bytes {
        self.empty.clone()
    }

    fn empty_response(&self) -> TileResponse {
        TileResponse {
            data: self.empty.clone(),
            cache_hit: false,
            outcome: TileOutcome::Empty,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.encoder.tile_size()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len().await,
            capacity: self.cache.capacity(),
            bytes: self.cache.size().await,
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}

// =============================================================================
// Tests
// =============================================================================
