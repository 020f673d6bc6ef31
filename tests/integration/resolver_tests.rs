//! Window resolution with real reprojection.
//!
//! Tests verify:
//! - Web Mercator rasters resolve through proj4rs to the expected windows
//! - Low-zoom tiles over a small raster are dropped, high-zoom ones fall back
//! - Zero pixel sizes and empty rasters degrade to empty tiles
//! - Tile/lon-lat conversion round trips at deep zoom

use axum::http::StatusCode;

use raster_tiler::geo::{lon_lat_to_tile, tile_to_lon_lat, IdentityProjector, Proj4Projector};
use raster_tiler::raster::RasterInfo;
use raster_tiler::tile::{NoCoverage, Resolution, TileKey, TileOutcome, TileService, WindowResolver};

use std::sync::Arc;

use super::test_utils::{
    constant_raster, decode_png, get, header, identity_router, is_fully_transparent,
    mercator_info, proj_router, tiny_patch_info,
};

fn assert_near(actual: u32, expected: u32, what: &str) {
    assert!(
        actual.abs_diff(expected) <= 1,
        "{what}: expected ~{expected}, got {actual}"
    );
}

// =============================================================================
// Web Mercator
// =============================================================================

#[test]
fn test_mercator_tile_resolves_to_quadrant() {
    let resolver = WindowResolver::default();
    let info = mercator_info();

    let resolution = resolver.resolve(TileKey::new(10, 512, 511), &info, &Proj4Projector::new());
    let window = match resolution {
        Resolution::Clamped(w) => w,
        other => panic!("expected clamped window, got {other:?}"),
    };

    assert_near(window.x, 0, "x");
    assert_near(window.y, 384, "y");
    assert_near(window.width, 128, "width");
    assert_near(window.height, 128, "height");
}

#[test]
fn test_mercator_far_tile_is_outside() {
    let resolver = WindowResolver::default();
    let resolution = resolver.resolve(TileKey::new(10, 0, 0), &mercator_info(), &Proj4Projector::new());

    assert!(matches!(
        resolution,
        Resolution::NoCoverage(NoCoverage::OutsideRaster)
    ));
}

#[test]
fn test_mercator_tile_covering_whole_raster_is_oversized() {
    // Tile 8/128/127 maps to the full 512x512 raster, beyond half its size
    let resolver = WindowResolver::default();
    let resolution = resolver.resolve(TileKey::new(8, 128, 127), &mercator_info(), &Proj4Projector::new());

    match resolution {
        Resolution::NoCoverage(NoCoverage::Oversized { width, height }) => {
            assert_near(width as u32, 512, "width");
            assert_near(height as u32, 512, "height");
        }
        other => panic!("expected oversized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mercator_tile_served_through_router() {
    let router = proj_router(constant_raster(mercator_info(), &[200.0, 100.0, 50.0]));

    let (_, headers, body) = get(&router, "/api/tiles/9/256/255.png").await;
    assert_eq!(header(&headers, "x-tile-outcome"), "covered");

    let img = decode_png(&body).to_rgb8();
    assert_eq!(img.get_pixel(128, 128).0, [200, 100, 50]);
}

// =============================================================================
// High-Zoom Fallback
// =============================================================================

#[tokio::test]
async fn test_fallback_tile_is_rendered() {
    let service = TileService::new(
        constant_raster(tiny_patch_info(), &[90.0, 60.0, 30.0]),
        Default::default(),
    )
    .unwrap();

    let response = service.get_tile(TileKey::new(14, 8192, 8191)).await;

    assert_eq!(response.outcome, TileOutcome::Fallback);
    assert!(!response.cache_hit);
    assert!(!is_fully_transparent(&response.data));

    let img = decode_png(&response.data).to_rgb8();
    assert_eq!(img.dimensions(), (256, 256));
    assert_eq!(img.get_pixel(128, 128).0, [90, 60, 30]);
}

#[tokio::test]
async fn test_fallback_reported_in_header() {
    let router = proj_router(constant_raster(tiny_patch_info(), &[90.0, 60.0, 30.0]));

    let (_, headers, body) = get(&router, "/api/tiles/14/8192/8191").await;
    assert_eq!(header(&headers, "x-tile-outcome"), "fallback");
    assert!(!is_fully_transparent(&body));

    // Same tile one zoom lower is dropped
    let (_, headers, body) = get(&router, "/api/tiles/13/4096/4095").await;
    assert_eq!(header(&headers, "x-tile-outcome"), "empty");
    assert!(is_fully_transparent(&body));
}

#[test]
fn test_fallback_window_is_tenth_of_raster() {
    let resolver = WindowResolver::default();
    let resolution = resolver.resolve(TileKey::new(14, 8192, 8191), &tiny_patch_info(), &IdentityProjector);

    assert!(resolution.is_fallback());
    let window = resolution.window().unwrap();
    assert_eq!((window.width, window.height), (100, 100));
    assert!(window.fits_within(1000, 1000));
}

#[tokio::test]
async fn test_lower_threshold_enables_fallback() {
    let settings = raster_tiler::tile::TilerSettings {
        high_zoom_threshold: 13,
        ..Default::default()
    };
    let service = TileService::with_projector(
        Arc::new(constant_raster(tiny_patch_info(), &[90.0, 60.0, 30.0])),
        IdentityProjector,
        settings,
    )
    .unwrap();

    let response = service.get_tile(TileKey::new(13, 4096, 4095)).await;
    assert_eq!(response.outcome, TileOutcome::Fallback);
}

// =============================================================================
// Unusable Geometry
// =============================================================================

#[tokio::test]
async fn test_zero_pixel_width_serves_empty_tile() {
    let info = RasterInfo::new(200, 200, [0.7, 0.0, 0.0, 10.0, 0.0, -0.1])
        .with_projection(Some("EPSG:4326".to_string()));
    let router = proj_router(constant_raster(info, &[10.0, 20.0, 30.0]));

    for uri in ["/api/tiles/8/128/127", "/api/tiles/0/0/0", "/api/tiles/14/8192/8191"] {
        let (status, headers, body) = get(&router, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(header(&headers, "x-tile-outcome"), "empty", "{uri}");
        assert!(is_fully_transparent(&body), "{uri}");
    }
}

#[tokio::test]
async fn test_empty_raster_serves_empty_tile() {
    let info = RasterInfo::new(0, 0, [0.01, 1e-5, 0.0, 0.012, 0.0, -1e-5])
        .with_projection(Some("EPSG:4326".to_string()));
    let router = identity_router(constant_raster(info, &[10.0, 20.0, 30.0]));

    let (status, headers, body) = get(&router, "/api/tiles/14/8192/8191").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-tile-outcome"), "empty");
    assert!(is_fully_transparent(&body));
}

#[test]
fn test_resolver_rejects_empty_raster() {
    let info = RasterInfo::new(0, 0, [0.01, 1e-5, 0.0, 0.012, 0.0, -1e-5])
        .with_projection(Some("EPSG:4326".to_string()));
    let resolution = WindowResolver::default().resolve(TileKey::new(14, 8192, 8191), &info, &IdentityProjector);
    assert_eq!(resolution, Resolution::NoCoverage(NoCoverage::EmptyRaster));
}

// =============================================================================
// Coordinate Round Trip
// =============================================================================

#[test]
fn test_tile_lon_lat_round_trip_deep_zoom() {
    for z in 10..=20u32 {
        let n = 1u64 << z;
        for (x, y) in [(0, 0), (n / 3, n / 2 - 1), (n - 1, n - 1), (n / 2, n / 7)] {
            let (lon, lat) = tile_to_lon_lat(x as f64, y as f64, z);
            let (tx, ty) = lon_lat_to_tile(lon, lat, z);
            assert!((tx - x as f64).abs() < 1e-6, "z{z} x{x}: {tx}");
            assert!((ty - y as f64).abs() < 1e-6, "z{z} y{y}: {ty}");
        }
    }
}
