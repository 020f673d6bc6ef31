//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   GET /api/tiles/{z}/{x}/{y}   /api/tif-info   /api/preview     │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌──────────────────────────────┐ │
//! │  │         handlers         │  │            routes            │ │
//! │  │  (requests, error JSON)  │  │  (router, CORS, tracing)     │ │
//! │  └──────────────────────────┘  └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, preview_handler, tif_info_handler, tile_handler, AppState, ErrorResponse,
    HealthResponse, TilePathParams, X_CACHE, X_TILE_OUTCOME,
};
pub use routes::{create_router, RouterConfig};
