//! Router configuration for the tile server.
//!
//! # Routes
//!
//! ```text
//! /health                      health check
//! /api/tiles/{z}/{x}/{y}       PNG tile (y may end in .png)
//! /api/tif-info                raster metadata
//! /api/preview                 whole-raster preview
//! ```
//!
//! All routes are public and read-only. CORS allows any origin unless a
//! list is configured.

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, preview_handler, tif_info_handler, tile_handler, AppState};
use crate::geo::Projector;
use crate::raster::RasterSource;
use crate::tile::TileService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins; `None` allows any origin
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age for rendered images, in seconds
    pub cache_max_age: u32,

    /// Attach the request tracing layer
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict CORS to the given origins.
    ///
    /// An empty list disallows all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the application router around a tile service.
pub fn create_router<R, P>(tile_service: TileService<R, P>, config: RouterConfig) -> Router
where
    R: RasterSource,
    P: Projector,
{
    let app_state = AppState::with_cache_max_age(tile_service, config.cache_max_age);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler::<R, P>))
        .route("/api/tiles/{z}/{x}/{filename}", get(tile_handler::<R, P>))
        .route("/api/tif-info", get(tif_info_handler::<R, P>))
        .route("/api/preview", get(preview_handler::<R, P>))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
