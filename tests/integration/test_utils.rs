//! Test utilities for integration tests.
//!
//! Fake raster sources, canned raster geometries, router builders and a
//! small GeoTIFF writer.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tower::ServiceExt;

use raster_tiler::error::RasterError;
use raster_tiler::geo::{IdentityProjector, Proj4Projector, Projector};
use raster_tiler::raster::{MemoryRaster, PixelWindow, RasterInfo, RasterSource};
use raster_tiler::tile::{TileService, TilerSettings};
use raster_tiler::{create_router, RouterConfig};

/// Half the Web Mercator world width in meters.
pub const MERCATOR_HALF_WORLD: f64 = 20_037_508.342_789_244;

/// GeoKey directory declaring EPSG:3857.
pub const MERCATOR_GEOKEYS: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 3857];

// =============================================================================
// Raster Geometries
// =============================================================================

/// Geographic raster, 0.1 degree pixels covering lon -10..10, lat -10..10.
pub fn world_info() -> RasterInfo {
    RasterInfo::new(200, 200, [-10.0, 0.1, 0.0, 10.0, 0.0, -0.1])
        .with_projection(Some("EPSG:4326".to_string()))
}

/// Geographic raster, 1e-5 degree pixels covering lon 0.01..0.02, lat 0.002..0.012.
///
/// A z=14 tile over it maps to a window wider than half the raster.
pub fn tiny_patch_info() -> RasterInfo {
    RasterInfo::new(1000, 1000, [0.01, 1e-5, 0.0, 0.012, 0.0, -1e-5])
        .with_projection(Some("EPSG:4326".to_string()))
}

/// Edge of a z=8 tile in Web Mercator meters.
pub fn mercator_z8_extent() -> f64 {
    2.0 * MERCATOR_HALF_WORLD / 256.0
}

/// Web Mercator geotransform of a `size x size` raster covering exactly tile 8/128/127.
pub fn mercator_geotransform(size: u32) -> [f64; 6] {
    let extent = mercator_z8_extent();
    let pixel = extent / size as f64;
    [0.0, pixel, 0.0, extent, 0.0, -pixel]
}

/// 512x512 EPSG:3857 raster covering exactly tile 8/128/127.
pub fn mercator_info() -> RasterInfo {
    RasterInfo::new(512, 512, mercator_geotransform(512))
        .with_projection(Some("EPSG:3857".to_string()))
}

pub fn constant_raster(info: RasterInfo, values: &[f32]) -> MemoryRaster {
    MemoryRaster::constant(info, values)
}

/// Raster whose red band is `col / 2` and green band `row / 2`, blue 0.
pub fn gradient_raster(info: RasterInfo) -> MemoryRaster {
    let (w, h) = (info.width, info.height);
    let mut samples = Vec::with_capacity((w * h * 3) as usize);
    for row in 0..h {
        for col in 0..w {
            samples.extend_from_slice(&[(col / 2) as f32, (row / 2) as f32, 0.0]);
        }
    }
    MemoryRaster::from_interleaved(info, &samples, 3).expect("gradient raster")
}

// =============================================================================
// Fake Raster Sources
// =============================================================================

/// A raster that counts band reads.
///
/// Useful for verifying that cache hits skip the raster entirely.
#[derive(Clone)]
pub struct CountingRaster {
    inner: MemoryRaster,
    reads: Arc<AtomicUsize>,
}

impl CountingRaster {
    pub fn new(inner: MemoryRaster) -> Self {
        Self {
            inner,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RasterSource for CountingRaster {
    fn info(&self) -> &RasterInfo {
        self.inner.info()
    }

    fn band_count(&self) -> usize {
        self.inner.band_count()
    }

    async fn read_window(
        &self,
        band: usize,
        window: PixelWindow,
    ) -> Result<Vec<f32>, RasterError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_window(band, window).await
    }
}

/// A raster whose reads always fail.
pub struct FailingRaster {
    info: RasterInfo,
}

impl FailingRaster {
    pub fn new(info: RasterInfo) -> Self {
        Self { info }
    }
}

#[async_trait]
impl RasterSource for FailingRaster {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn band_count(&self) -> usize {
        3
    }

    async fn read_window(
        &self,
        _band: usize,
        _window: PixelWindow,
    ) -> Result<Vec<f32>, RasterError> {
        Err(RasterError::Read("simulated disk failure".to_string()))
    }
}

// =============================================================================
// Routers
// =============================================================================

fn test_router_config() -> RouterConfig {
    RouterConfig::new().with_tracing(false)
}

/// Router over `raster` using a projector that passes points through.
pub fn identity_router<R: RasterSource>(raster: R) -> Router {
    identity_router_with(raster, TilerSettings::default())
}

pub fn identity_router_with<R: RasterSource>(raster: R, settings: TilerSettings) -> Router {
    router_with(raster, IdentityProjector, settings)
}

/// Router over `raster` using the real PROJ.4 projector.
pub fn proj_router<R: RasterSource>(raster: R) -> Router {
    router_with(raster, Proj4Projector::new(), TilerSettings::default())
}

pub fn router_with<R: RasterSource, P: Projector>(
    raster: R,
    projector: P,
    settings: TilerSettings,
) -> Router {
    let service = TileService::with_projector(Arc::new(raster), projector, settings)
        .expect("tile service");
    create_router(service, test_router_config())
}

/// Router whose raster failed to open.
pub fn unavailable_router() -> Router {
    let service = TileService::<MemoryRaster>::unavailable(
        "Failed to open raster data/missing.tif: No such file or directory",
        TilerSettings::default(),
    )
    .expect("tile service");
    create_router(service, test_router_config())
}

/// Issue a GET and collect status, headers and body.
pub async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    (status, headers, body)
}

pub fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

// =============================================================================
// Image Helpers
// =============================================================================

/// Check PNG signature.
pub fn is_valid_png(data: &[u8]) -> bool {
    data.len() > 8 && &data[..8] == b"\x89PNG\r\n\x1a\n"
}

pub fn decode_png(data: &[u8]) -> DynamicImage {
    image::load_from_memory_with_format(data, ImageFormat::Png).expect("valid PNG")
}

pub fn is_fully_transparent(data: &[u8]) -> bool {
    decode_png(data).to_rgba8().pixels().all(|p| p.0[3] == 0)
}

// =============================================================================
// GeoTIFF Writer
// =============================================================================

/// Write an RGB8 GeoTIFF with pixel-scale/tiepoint georeferencing.
pub fn write_rgb_geotiff(
    path: &Path,
    width: u32,
    height: u32,
    geotransform: [f64; 6],
    geokeys: &[u16],
    pixel: impl Fn(u32, u32) -> [u8; 3],
) {
    write_striped_rgb_geotiff(path, width, height, geotransform, geokeys, None, pixel);
}

/// Like [`write_rgb_geotiff`] with an explicit strip height.
pub fn write_striped_rgb_geotiff(
    path: &Path,
    width: u32,
    height: u32,
    geotransform: [f64; 6],
    geokeys: &[u16],
    rows_per_strip: Option<u32>,
    pixel: impl Fn(u32, u32) -> [u8; 3],
) {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for row in 0..height {
        for col in 0..width {
            data.extend_from_slice(&pixel(col, row));
        }
    }

    let [origin_x, pixel_width, _, origin_y, _, pixel_height] = geotransform;

    let file = std::fs::File::create(path).expect("create tiff");
    let mut encoder = TiffEncoder::new(file).expect("tiff encoder");
    let mut image = encoder
        .new_image::<colortype::RGB8>(width, height)
        .expect("tiff image");
    if let Some(rows) = rows_per_strip {
        image.rows_per_strip(rows).expect("rows per strip");
    }
    {
        let dir = image.encoder();
        dir.write_tag(
            Tag::ModelPixelScaleTag,
            &[pixel_width, -pixel_height, 0.0][..],
        )
        .expect("pixel scale");
        dir.write_tag(
            Tag::ModelTiepointTag,
            &[0.0, 0.0, 0.0, origin_x, origin_y, 0.0][..],
        )
        .expect("tiepoint");
        dir.write_tag(Tag::GeoKeyDirectoryTag, geokeys)
            .expect("geokeys");
    }
    image.write_data(&data).expect("tiff data");
}
