//! End-to-end tests against a GeoTIFF written to disk.
//!
//! Tests verify:
//! - A Web Mercator GeoTIFF opens with its georeferencing and CRS
//! - Tiles read from it land on the expected raster pixels
//! - Open failures are reported as startup errors
//! - Only the strips a read touches are decoded

use std::sync::Arc;

use axum::http::StatusCode;
use image::GenericImageView;
use tempfile::TempDir;

use raster_tiler::geo::IdentityProjector;
use raster_tiler::raster::{GeoTiffRaster, PixelWindow, RasterSource};
use raster_tiler::tile::{TileService, TilerSettings};

use super::test_utils::{
    decode_png, get, header, mercator_geotransform, proj_router, write_rgb_geotiff,
    write_striped_rgb_geotiff, MERCATOR_GEOKEYS,
};

/// 512x512 EPSG:3857 gradient: red = col / 2, green = row / 2.
fn write_mercator_gradient(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("gradient.tif");
    write_rgb_geotiff(
        &path,
        512,
        512,
        mercator_geotransform(512),
        &MERCATOR_GEOKEYS,
        |col, row| [(col / 2) as u8, (row / 2) as u8, 0],
    );
    path
}

fn assert_channel_near(actual: u8, expected: u8, what: &str) {
    assert!(
        actual.abs_diff(expected) <= 3,
        "{what}: expected ~{expected}, got {actual}"
    );
}

#[tokio::test]
async fn test_open_mercator_geotiff() {
    let dir = TempDir::new().unwrap();
    let path = write_mercator_gradient(&dir);

    let raster = GeoTiffRaster::open_async(path.clone()).await.unwrap();
    let info = raster.info();

    assert_eq!((info.width, info.height), (512, 512));
    assert_eq!(raster.band_count(), 3);
    assert_eq!(info.projection.as_deref(), Some("EPSG:3857"));
    assert_eq!(raster.path(), path.as_path());

    let expected = mercator_geotransform(512);
    assert!((info.origin_x - expected[0]).abs() < 1e-6);
    assert!((info.pixel_width - expected[1]).abs() < 1e-6);
    assert!((info.origin_y - expected[3]).abs() < 1e-6);
    assert!((info.pixel_height - expected[5]).abs() < 1e-6);
}

#[tokio::test]
async fn test_tile_from_geotiff_hits_expected_pixels() {
    let dir = TempDir::new().unwrap();
    let raster = GeoTiffRaster::open_async(write_mercator_gradient(&dir))
        .await
        .unwrap();
    let router = proj_router(raster);

    // Tile 9/256/255 is the south-west quadrant: window (0, 256, 256, 256)
    let (status, headers, body) = get(&router, "/api/tiles/9/256/255").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-tile-outcome"), "covered");

    let img = decode_png(&body).to_rgb8();
    assert_eq!(img.dimensions(), (256, 256));

    let center = img.get_pixel(128, 128).0;
    assert_channel_near(center[0], 64, "red");
    assert_channel_near(center[1], 192, "green");
    assert_eq!(center[2], 0);

    let top_left = img.get_pixel(0, 0).0;
    assert_channel_near(top_left[0], 0, "red");
    assert_channel_near(top_left[1], 128, "green");
}

#[tokio::test]
async fn test_tif_info_from_geotiff() {
    let dir = TempDir::new().unwrap();
    let raster = GeoTiffRaster::open_async(write_mercator_gradient(&dir))
        .await
        .unwrap();
    let router = proj_router(raster);

    let (status, _, body) = get(&router, "/api/tif-info").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["width"], 512);
    assert_eq!(json["height"], 512);
    assert_eq!(json["projection"], "EPSG:3857");
    assert!(json["pixelHeight"].as_f64().unwrap() < 0.0);
}

#[tokio::test]
async fn test_preview_from_geotiff() {
    let dir = TempDir::new().unwrap();
    let raster = GeoTiffRaster::open_async(write_mercator_gradient(&dir))
        .await
        .unwrap();
    let router = proj_router(raster);

    let (status, _, body) = get(&router, "/api/preview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decode_png(&body).dimensions(), (512, 512));
}

#[tokio::test]
async fn test_missing_file_is_init_error() {
    let dir = TempDir::new().unwrap();
    let err = GeoTiffRaster::open_async(dir.path().join("missing.tif"))
        .await
        .unwrap_err();

    assert!(err.is_init_error());
    assert!(err.to_string().contains("missing.tif"));
}

#[tokio::test]
async fn test_non_tiff_file_is_init_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not-a-tiff.tif");
    std::fs::write(&path, b"definitely not a tiff").unwrap();

    let err = GeoTiffRaster::open_async(path).await.unwrap_err();
    assert!(err.is_init_error());
}

#[tokio::test]
async fn test_zero_pixel_scale_is_init_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flat.tif");
    write_rgb_geotiff(
        &path,
        4,
        4,
        [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        &MERCATOR_GEOKEYS,
        |_, _| [1, 2, 3],
    );

    let err = GeoTiffRaster::open_async(path).await.unwrap_err();
    assert!(err.is_init_error());
    assert!(err.to_string().contains("zero pixel size"), "{err}");
}

// =============================================================================
// Chunked Reads
// =============================================================================

/// 256x256 constant raster stored one row per strip.
fn write_single_row_strips(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("strips.tif");
    write_striped_rgb_geotiff(
        &path,
        256,
        256,
        [0.0, 1.0, 0.0, 256.0, 0.0, -1.0],
        &MERCATOR_GEOKEYS,
        Some(1),
        |_, _| [40, 80, 120],
    );
    path
}

#[tokio::test]
async fn test_window_read_decodes_touched_strips() {
    let dir = TempDir::new().unwrap();
    let raster = GeoTiffRaster::open_async(write_single_row_strips(&dir))
        .await
        .unwrap();

    let window = PixelWindow::new(100, 200, 20, 10);
    for band in 1..=3 {
        let samples = raster.read_window(band, window).await.unwrap();
        assert_eq!(samples.len(), 200);
    }

    // First strip from open, plus the ten rows read
    assert_eq!(raster.cached_chunks(), 11);
}

#[tokio::test]
async fn test_preview_reads_sampled_strips_only() {
    let dir = TempDir::new().unwrap();
    let raster = GeoTiffRaster::open_async(write_single_row_strips(&dir))
        .await
        .unwrap();

    let settings = TilerSettings {
        preview_max_size: 8,
        ..TilerSettings::default()
    };
    let service =
        TileService::with_projector(Arc::new(raster.clone()), IdentityProjector, settings)
            .unwrap();

    let img = decode_png(&service.preview().await.unwrap()).to_rgb8();
    assert_eq!(img.dimensions(), (8, 8));
    assert_eq!(img.get_pixel(4, 4).0, [40, 80, 120]);

    // 16 sampled rows plus the first strip, out of 256
    assert_eq!(raster.cached_chunks(), 17);
}
