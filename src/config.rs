//! Configuration management for the raster tile server.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `TILER_` prefix
//! - Defaults matching a standard 256px slippy-map deployment
//!
//! # Example
//!
//! ```ignore
//! use raster_tiler::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//!
//! println!("Serving {} on {}", config.raster.display(), config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `TILER_RASTER` - GeoTIFF to serve (default: data/input.tif)
//! - `TILER_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILER_PORT` - Server port (default: 3000)
//! - `TILER_TILE_SIZE` - Tile edge in pixels (default: 256)
//! - `TILER_CACHE_TILES` - Max tiles to cache (default: 1000)
//! - `TILER_HIGH_ZOOM` - Zoom at which oversized windows fall back (default: 14)
//! - `TILER_GAMMA`, `TILER_BRIGHTNESS`, `TILER_SATURATION` - Color enhancement (default: 1.0)
//! - `TILER_PREVIEW_MAX_SIZE` - Preview longest side (default: 1024)
//! - `TILER_RENDER_TIMEOUT_MS` - Per-render budget (default: 10000)
//! - `TILER_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `TILER_CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::tile::{
    ColorEnhancement, TilerSettings, DEFAULT_HIGH_ZOOM_THRESHOLD, DEFAULT_PREVIEW_MAX_SIZE,
    DEFAULT_TILE_CACHE_CAPACITY, DEFAULT_TILE_SIZE, MAX_TILE_SIZE,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default raster path.
pub const DEFAULT_RASTER_PATH: &str = "data/input.tif";

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default render timeout in milliseconds.
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 10_000;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Raster Tiler - slippy-map tiles from a single georeferenced raster.
///
/// Serves `/api/tiles/{z}/{x}/{y}` as PNG, reprojecting each tile into the
/// raster's native CRS and cutting the matching pixel window.
#[derive(Parser, Debug, Clone)]
#[command(name = "raster-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Source
    // =========================================================================
    /// GeoTIFF to serve (at least three bands, georeferenced).
    #[arg(long, default_value = DEFAULT_RASTER_PATH, env = "TILER_RASTER")]
    pub raster: PathBuf,

    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILER_PORT")]
    pub port: u16,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Edge length of served tiles in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "TILER_TILE_SIZE")]
    pub tile_size: u32,

    /// Maximum number of encoded tiles to cache.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "TILER_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Zoom level at and above which oversized windows use the fixed fallback.
    #[arg(long, default_value_t = DEFAULT_HIGH_ZOOM_THRESHOLD, env = "TILER_HIGH_ZOOM")]
    pub high_zoom_threshold: u32,

    /// Gamma correction; values above 1 lighten midtones.
    #[arg(long, default_value_t = 1.0, env = "TILER_GAMMA")]
    pub gamma: f32,

    /// Brightness multiplier.
    #[arg(long, default_value_t = 1.0, env = "TILER_BRIGHTNESS")]
    pub brightness: f32,

    /// Saturation multiplier; 0 is grayscale.
    #[arg(long, default_value_t = 1.0, env = "TILER_SATURATION")]
    pub saturation: f32,

    /// Longest side of the preview image in pixels.
    #[arg(long, default_value_t = DEFAULT_PREVIEW_MAX_SIZE, env = "TILER_PREVIEW_MAX_SIZE")]
    pub preview_max_size: u32,

    /// Time budget for rendering one tile or preview, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_RENDER_TIMEOUT_MS, env = "TILER_RENDER_TIMEOUT_MS")]
    pub render_timeout_ms: u64,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "TILER_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TILER_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!("tile_size must be between 1 and {MAX_TILE_SIZE}"));
        }

        if self.preview_max_size == 0 {
            return Err("preview_max_size must be greater than 0".to_string());
        }

        for (name, value) in [("gamma", self.gamma), ("brightness", self.brightness)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} must be a positive number, got {value}"));
            }
        }

        if !self.saturation.is_finite() || self.saturation < 0.0 {
            return Err(format!(
                "saturation must be zero or positive, got {}",
                self.saturation
            ));
        }

        if self.render_timeout_ms == 0 {
            return Err("render_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn enhancement(&self) -> ColorEnhancement {
        ColorEnhancement::new(self.gamma, self.brightness, self.saturation)
    }

    /// Rendering settings for the tile service.
    pub fn settings(&self) -> TilerSettings {
        TilerSettings {
            tile_size: self.tile_size,
            cache_capacity: self.cache_tiles,
            high_zoom_threshold: self.high_zoom_threshold,
            enhancement: self.enhancement(),
            preview_max_size: self.preview_max_size,
            render_timeout: Duration::from_millis(self.render_timeout_ms),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
