//! HTTP request handlers for the tile API.
//!
//! # Endpoints
//!
//! - `GET /api/tiles/{z}/{x}/{y}` - Serve a PNG tile (always 200)
//! - `GET /api/tif-info` - Raster metadata as JSON
//! - `GET /api/preview` - Downsampled PNG of the whole raster
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::TileError;
use crate::geo::{Proj4Projector, Projector};
use crate::raster::{RasterInfo, RasterSource};
use crate::tile::{TileKey, TileOutcome, TileService};

/// Cache hit indicator: `HIT` or `MISS`.
pub const X_CACHE: &str = "x-cache";

/// How the tile was produced: `covered`, `fallback`, `empty` or `cached`.
pub const X_TILE_OUTCOME: &str = "x-tile-outcome";

const IMAGE_PNG: &str = "image/png";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<R: RasterSource, P: Projector = Proj4Projector> {
    pub tile_service: Arc<TileService<R, P>>,

    /// Cache-Control max-age for rendered images, in seconds
    pub cache_max_age: u32,
}

impl<R: RasterSource, P: Projector> AppState<R, P> {
    /// Create a new application state with the default max-age of one hour.
    pub fn new(tile_service: TileService<R, P>) -> Self {
        Self::with_cache_max_age(tile_service, 3600)
    }

    pub fn with_cache_max_age(tile_service: TileService<R, P>, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }
}

impl<R: RasterSource, P: Projector> Clone for AppState<R, P> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from `/api/tiles/{z}/{x}/{filename}` where filename is `{y}`
/// or `{y}.png`. Kept as strings so malformed segments still get a tile.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    pub z: String,
    pub x: String,
    pub filename: String,
}

impl TilePathParams {
    /// Parse into a tile key. `None` if any segment is not a number.
    pub fn key(&self) -> Option<TileKey> {
        let y = self
            .filename
            .strip_suffix(".png")
            .unwrap_or(&self.filename);
        Some(TileKey::new(
            self.z.parse().ok()?,
            self.x.parse().ok()?,
            y.parse().ok()?,
        ))
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned by the diagnostic endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "raster_unavailable")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the raster failed to open
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// Only the diagnostic endpoints use this; the tile endpoint never fails.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TileError::RasterUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "raster_unavailable")
            }
            TileError::Raster(_) => (StatusCode::INTERNAL_SERVER_ERROR, "raster_error"),
            TileError::Projection(_) => (StatusCode::INTERNAL_SERVER_ERROR, "projection_error"),
            TileError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            TileError::Timeout { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "timeout"),
            TileError::Task { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "task_error"),
        };
        let message = self.to_string();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Service unavailable: {}",
                message
            );
        } else {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /api/tiles/{z}/{x}/{y}` (`{y}` may carry a `.png` suffix)
///
/// # Response
///
/// Always `200 OK` with a PNG body. Tiles with no coverage, unparseable
/// coordinates or a failed render get the transparent placeholder.
///
/// # Headers
///
/// - `Content-Type: image/png`
/// - `Cache-Control: public, max-age={cache_max_age}` (`no-cache` for empty tiles)
/// - `X-Cache: HIT|MISS`
/// - `X-Tile-Outcome: covered|fallback|empty|cached`
pub async fn tile_handler<R: RasterSource, P: Projector>(
    State(state): State<AppState<R, P>>,
    Path(params): Path<TilePathParams>,
) -> Response {
    let response = match params.key() {
        Some(key) => state.tile_service.get_tile(key).await,
        None => {
            debug!(
                z = %params.z,
                x = %params.x,
                y = %params.filename,
                "Unparseable tile path, serving empty tile"
            );
            return png_response(
                state.tile_service.empty_tile(),
                "no-cache".to_string(),
                "MISS",
                TileOutcome::Empty,
            );
        }
    };

    let cache_control = if response.outcome == TileOutcome::Empty {
        "no-cache".to_string()
    } else {
        format!("public, max-age={}", state.cache_max_age)
    };

    let cache = if response.cache_hit { "HIT" } else { "MISS" };

    png_response(response.data, cache_control, cache, response.outcome)
}

fn png_response(
    data: bytes::Bytes,
    cache_control: String,
    cache: &'static str,
    outcome: TileOutcome,
) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, IMAGE_PNG.to_string()),
            (header::CACHE_CONTROL, cache_control),
            (HeaderName::from_static(X_CACHE), cache.to_string()),
            (
                HeaderName::from_static(X_TILE_OUTCOME),
                outcome.as_str().to_string(),
            ),
        ],
        data,
    )
        .into_response()
}

/// Handle raster metadata requests.
///
/// # Endpoint
///
/// `GET /api/tif-info`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "width": 10980, "height": 10980,
///   "originX": 399960.0, "originY": 5000040.0,
///   "pixelWidth": 10.0, "pixelHeight": -10.0,
///   "skewX": 0.0, "skewY": 0.0,
///   "projection": "EPSG:32633",
///   "bounds": {"minX": 399960.0, "minY": 4890240.0, "maxX": 509760.0, "maxY": 5000040.0}
/// }
/// ```
///
/// # Errors
///
/// - `503 Service Unavailable`: The raster failed to open at startup
pub async fn tif_info_handler<R: RasterSource, P: Projector>(
    State(state): State<AppState<R, P>>,
) -> Result<Json<RasterInfo>, TileError> {
    let info = state.tile_service.raster_info()?;
    Ok(Json(info.clone()))
}

/// Handle preview requests.
///
/// # Endpoint
///
/// `GET /api/preview`
///
/// # Response
///
/// `200 OK` with the whole raster as PNG, longest side at most the
/// configured preview size.
///
/// # Errors
///
/// - `503 Service Unavailable`: The raster failed to open at startup
/// - `500 Internal Server Error`: Read, encode or timeout failure
pub async fn preview_handler<R: RasterSource, P: Projector>(
    State(state): State<AppState<R, P>>,
) -> Result<Response, TileError> {
    let data = state.tile_service.preview().await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, IMAGE_PNG.to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
        ],
        data,
    )
        .into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler<R: RasterSource, P: Projector>(
    State(state): State<AppState<R, P>>,
) -> Json<HealthResponse> {
    let status = if state.tile_service.is_available() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
