//! Raster Tiler - slippy-map tiles from a single georeferenced raster.
//!
//! This binary opens the raster, builds the tile service and starts the
//! HTTP server.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raster_tiler::{
    config::Config,
    raster::{GeoTiffRaster, RasterSource},
    server::{create_router, RouterConfig},
    tile::TileService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Raster Tiler v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Raster: {}", config.raster.display());
    info!(
        "  Tiles: {}px, cache {} tiles, high zoom from z{}",
        config.tile_size, config.cache_tiles, config.high_zoom_threshold
    );
    let enhancement = config.enhancement();
    if !enhancement.is_identity() {
        info!(
            "  Enhancement: gamma {}, brightness {}, saturation {}",
            enhancement.gamma, enhancement.brightness, enhancement.saturation
        );
    }

    let settings = config.settings();
    let service = match GeoTiffRaster::open_async(config.raster.clone()).await {
        Ok(raster) => {
            let info = raster.info();
            info!(
                "  Opened {}x{} raster, {} band(s), CRS {}",
                info.width,
                info.height,
                raster.band_count(),
                info.projection.as_deref().unwrap_or("<none>")
            );
            if raster.band_count() < 3 {
                warn!("  Raster has fewer than 3 bands; every tile will be empty");
            }
            TileService::new(raster, settings)
        }
        Err(e) => {
            error!("Failed to open raster {}: {}", config.raster.display(), e);
            warn!("Starting without a raster: tiles will be empty, info and preview return 503");
            TileService::<GeoTiffRaster>::unavailable(e.to_string(), settings)
        }
    };

    let service = match service {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to initialize tile service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let router = create_router(service, build_router_config(&config));
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/api/tif-info", addr);
    info!("    curl -o tile.png http://{}/api/tiles/0/0/0", addr);
    info!("");

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "raster_tiler=debug,tower_http=debug"
    } else {
        "raster_tiler=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the parsed Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
