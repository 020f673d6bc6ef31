//! GeoTIFF-backed raster source.
//!
//! Only the header is read at open. Pixel data stays in the file and is
//! decoded one strip or tile ("chunk") at a time with the [`tiff`] crate,
//! when a read first touches it. Decoded chunks are kept in a small LRU
//! so neighbouring tiles reuse them.
//!
//! Georeferencing comes from the standard GeoTIFF tags:
//!
//! - `ModelTransformationTag` (full affine, may carry skew), or
//! - `ModelPixelScaleTag` + `ModelTiepointTag` (north-up)
//!
//! and the CRS from the `GeoKeyDirectoryTag`.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;
use tiff::decoder::{ChunkType, Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, info, trace};

use crate::error::RasterError;

use super::info::{PixelWindow, RasterInfo};
use super::source::{check_window, sample_positions, RasterSource};

/// `GTRasterTypeGeoKey`
const KEY_RASTER_TYPE: u64 = 1025;

/// `GeographicTypeGeoKey`
const KEY_GEOGRAPHIC_TYPE: u64 = 2048;

/// `ProjectedCSTypeGeoKey`
const KEY_PROJECTED_CS_TYPE: u64 = 3072;

/// `RasterPixelIsPoint`
const RASTER_PIXEL_IS_POINT: u64 = 2;

/// GeoKey code meaning "user-defined"
const USER_DEFINED: u64 = 32767;

/// `PlanarConfiguration` value for one plane per band
const PLANAR_SEPARATE: u16 = 2;

/// Decoded chunks kept per raster.
pub const DEFAULT_CHUNK_CACHE_CAPACITY: usize = 32;

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

type ChunkDecoder = Decoder<Box<dyn ReadSeek + Send>>;

/// A GeoTIFF read lazily, chunk by chunk.
#[derive(Clone)]
pub struct GeoTiffRaster {
    path: PathBuf,
    info: RasterInfo,
    layout: ChunkLayout,
    chunks: Arc<ChunkReader>,
}

impl GeoTiffRaster {
    /// Open a GeoTIFF file and read its header. Blocking.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RasterError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let raster = Self::from_reader(BufReader::new(file), path)?;
        info!(
            path = %path.display(),
            width = raster.info.width,
            height = raster.info.height,
            bands = raster.layout.bands,
            chunk_width = raster.layout.chunk_width,
            chunk_height = raster.layout.chunk_height,
            projection = raster.info.projection.as_deref().unwrap_or("none"),
            "Opened raster"
        );
        Ok(raster)
    }

    /// Open on the blocking thread pool.
    pub async fn open_async(path: impl Into<PathBuf>) -> Result<Self, RasterError> {
        let path = path.into();
        let display = path.display().to_string();
        tokio::task::spawn_blocking(move || Self::open(path))
            .await
            .map_err(|e| RasterError::Open {
                path: display,
                message: e.to_string(),
            })?
    }

    /// Read from any seekable reader, e.g. an in-memory buffer.
    pub fn from_reader<R: Read + Seek + Send + 'static>(
        reader: R,
        label: impl Into<PathBuf>,
    ) -> Result<Self, RasterError> {
        Self::with_chunk_capacity(reader, label, DEFAULT_CHUNK_CACHE_CAPACITY)
    }

    /// Like [`from_reader`](Self::from_reader) with a custom decoded-chunk budget.
    pub fn with_chunk_capacity<R: Read + Seek + Send + 'static>(
        reader: R,
        label: impl Into<PathBuf>,
        capacity: usize,
    ) -> Result<Self, RasterError> {
        let reader: Box<dyn ReadSeek + Send> = Box::new(reader);
        let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        if width == 0 || height == 0 {
            return Err(RasterError::Corrupt(format!(
                "raster has empty dimensions {width}x{height}"
            )));
        }

        let geokeys = read_geokeys(&mut decoder)?;
        let geotransform = read_geotransform(&mut decoder, &geokeys)?;
        let projection = crs_from_geokeys(&geokeys);
        debug!(?geotransform, ?projection, "Parsed GeoTIFF georeferencing");

        let layout = ChunkLayout::read(&mut decoder, width, height)?;
        let chunks = ChunkReader::new(decoder, layout, capacity);

        // Decode the first chunk now so unreadable pixel data fails at open
        chunks.chunk(0).map_err(|e| match e {
            e if e.is_init_error() => e,
            e => RasterError::Corrupt(e.to_string()),
        })?;

        Ok(Self {
            path: label.into(),
            info: RasterInfo::new(width, height, geotransform).with_projection(projection),
            layout,
            chunks: Arc::new(chunks),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of decoded chunks currently held.
    pub fn cached_chunks(&self) -> usize {
        self.chunks.cached()
    }

    /// Read `band` at the given source columns and rows on the blocking pool.
    async fn read_grid(
        &self,
        band: usize,
        xs: Vec<u32>,
        ys: Vec<u32>,
    ) -> Result<Vec<f32>, RasterError> {
        let chunks = Arc::clone(&self.chunks);
        tokio::task::spawn_blocking(move || chunks.sample_grid(band, &xs, &ys))
            .await
            .map_err(|e| RasterError::Read(e.to_string()))?
    }
}

impl fmt::Debug for GeoTiffRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoTiffRaster")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RasterSource for GeoTiffRaster {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn band_count(&self) -> usize {
        self.layout.bands
    }

    async fn read_window(
        &self,
        band: usize,
        window: PixelWindow,
    ) -> Result<Vec<f32>, RasterError> {
        check_window(&self.info, self.layout.bands, band, window)?;
        let xs = (window.x..window.x + window.width).collect();
        let ys = (window.y..window.y + window.height).collect();
        self.read_grid(band, xs, ys).await
    }

    async fn read_window_sampled(
        &self,
        band: usize,
        window: PixelWindow,
        out_width: u32,
        out_height: u32,
    ) -> Result<Vec<f32>, RasterError> {
        check_window(&self.info, self.layout.bands, band, window)?;
        let xs = sample_positions(window.x, window.width, out_width);
        let ys = sample_positions(window.y, window.height, out_height);
        self.read_grid(band, xs, ys).await
    }
}

// =============================================================================
// Chunk Layout
// =============================================================================

/// How pixels are split into strips or tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkLayout {
    width: u32,
    height: u32,
    chunk_width: u32,
    chunk_height: u32,
    bands: usize,

    /// One set of chunks per band rather than interleaved samples
    planar: bool,
}

impl ChunkLayout {
    fn read(decoder: &mut ChunkDecoder, width: u32, height: u32) -> Result<Self, RasterError> {
        let bands = decoder
            .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
            .unwrap_or(1) as usize;
        let planar = decoder.find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?
            == Some(PLANAR_SEPARATE);

        let (chunk_width, chunk_height) = match decoder.get_chunk_type() {
            ChunkType::Strip => {
                let rows = decoder
                    .find_tag_unsigned::<u32>(Tag::RowsPerStrip)?
                    .unwrap_or(height);
                (width, rows.min(height))
            }
            ChunkType::Tile => {
                let tile_width = decoder.find_tag_unsigned::<u32>(Tag::TileWidth)?;
                let tile_length = decoder.find_tag_unsigned::<u32>(Tag::TileLength)?;
                (tile_width.unwrap_or(0), tile_length.unwrap_or(0))
            }
        };

        if bands == 0 || chunk_width == 0 || chunk_height == 0 {
            return Err(RasterError::Corrupt(format!(
                "invalid layout: {bands} sample(s) per pixel in {chunk_width}x{chunk_height} chunks"
            )));
        }

        Ok(Self {
            width,
            height,
            chunk_width,
            chunk_height,
            bands,
            planar,
        })
    }

    fn chunks_across(&self) -> u32 {
        self.width.div_ceil(self.chunk_width)
    }

    fn chunks_down(&self) -> u32 {
        self.height.div_ceil(self.chunk_height)
    }

    fn chunk_count(&self) -> u32 {
        let per_plane = self.chunks_across() * self.chunks_down();
        if self.planar {
            per_plane * self.bands as u32
        } else {
            per_plane
        }
    }

    /// Index of the chunk holding `band` at chunk column `cx`, row `cy`.
    fn chunk_index(&self, band: usize, cx: u32, cy: u32) -> u32 {
        let index = cy * self.chunks_across() + cx;
        if self.planar {
            (band as u32 - 1) * self.chunks_across() * self.chunks_down() + index
        } else {
            index
        }
    }

    /// Chunk column and row of a chunk index.
    fn chunk_position(&self, index: u32) -> (u32, u32) {
        let within_plane = index % (self.chunks_across() * self.chunks_down());
        (
            within_plane % self.chunks_across(),
            within_plane / self.chunks_across(),
        )
    }

    /// Size of the pixel data in a chunk; edge chunks are cropped.
    fn data_dimensions(&self, cx: u32, cy: u32) -> (u32, u32) {
        (
            self.chunk_width.min(self.width - cx * self.chunk_width),
            self.chunk_height.min(self.height - cy * self.chunk_height),
        )
    }

    fn samples_per_pixel(&self) -> usize {
        if self.planar {
            1
        } else {
            self.bands
        }
    }

    fn band_offset(&self, band: usize) -> usize {
        if self.planar {
            0
        } else {
            band - 1
        }
    }
}

// =============================================================================
// Chunk Reader
// =============================================================================

/// One decoded strip or tile, pixel-interleaved.
struct Chunk {
    samples: Vec<f32>,

    /// Pixels per row
    width: usize,
}

struct ChunkState {
    decoder: ChunkDecoder,
    cache: LruCache<u32, Arc<Chunk>>,
}

/// Serializes access to the decoder and caches what it produced.
struct ChunkReader {
    layout: ChunkLayout,
    state: Mutex<ChunkState>,
}

impl ChunkReader {
    fn new(decoder: ChunkDecoder, layout: ChunkLayout, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            layout,
            state: Mutex::new(ChunkState {
                decoder,
                cache: LruCache::new(capacity),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ChunkState>, RasterError> {
        self.state
            .lock()
            .map_err(|_| RasterError::Read("chunk reader lock poisoned".into()))
    }

    fn cached(&self) -> usize {
        self.lock().map(|state| state.cache.len()).unwrap_or(0)
    }

    /// Fetch a chunk, decoding it on a miss.
    ///
    /// The lock is held while decoding, so concurrent readers of the same
    /// chunk wait for one decode instead of repeating it.
    fn chunk(&self, index: u32) -> Result<Arc<Chunk>, RasterError> {
        let mut state = self.lock()?;
        if let Some(chunk) = state.cache.get(&index) {
            return Ok(Arc::clone(chunk));
        }

        if index >= self.layout.chunk_count() {
            return Err(RasterError::Read(format!(
                "chunk {index} out of range ({} chunks)",
                self.layout.chunk_count()
            )));
        }

        let (cx, cy) = self.layout.chunk_position(index);
        let (data_width, data_height) = self.layout.data_dimensions(cx, cy);
        let samples = to_f32(state.decoder.read_chunk(index)?);

        let expected =
            data_width as usize * data_height as usize * self.layout.samples_per_pixel();
        if samples.len() != expected {
            return Err(RasterError::Corrupt(format!(
                "chunk {index} decoded to {} samples, expected {expected}",
                samples.len()
            )));
        }
        trace!(index, data_width, data_height, "Decoded chunk");

        let chunk = Arc::new(Chunk {
            samples,
            width: data_width as usize,
        });
        state.cache.put(index, Arc::clone(&chunk));
        Ok(chunk)
    }

    /// Samples of `band` at every (x, y) in `xs` x `ys`, row-major.
    ///
    /// `xs` and `ys` must be ascending and inside the raster.
    fn sample_grid(&self, band: usize, xs: &[u32], ys: &[u32]) -> Result<Vec<f32>, RasterError> {
        let layout = &self.layout;
        let spp = layout.samples_per_pixel();
        let offset = layout.band_offset(band);

        let mut out = Vec::with_capacity(xs.len() * ys.len());
        let mut current: Option<(u32, Arc<Chunk>)> = None;

        for &y in ys {
            let cy = y / layout.chunk_height;
            let local_y = (y - cy * layout.chunk_height) as usize;

            for &x in xs {
                let cx = x / layout.chunk_width;
                let index = layout.chunk_index(band, cx, cy);

                let chunk = match &current {
                    Some((i, chunk)) if *i == index => Arc::clone(chunk),
                    _ => {
                        let chunk = self.chunk(index)?;
                        current = Some((index, Arc::clone(&chunk)));
                        chunk
                    }
                };

                let local_x = (x - cx * layout.chunk_width) as usize;
                out.push(chunk.samples[(local_y * chunk.width + local_x) * spp + offset]);
            }
        }
        Ok(out)
    }
}

// =============================================================================
// Georeferencing
// =============================================================================

/// Parse the GeoKeyDirectory into `(key_id, inline_value)` pairs.
///
/// Keys stored out-of-line (doubles, ASCII) are skipped; none of the keys we
/// consume use them.
fn read_geokeys(decoder: &mut ChunkDecoder) -> Result<Vec<(u64, u64)>, RasterError> {
    let Some(value) = decoder.find_tag(Tag::GeoKeyDirectoryTag)? else {
        return Ok(Vec::new());
    };
    let directory = value.into_u64_vec()?;
    if directory.len() < 4 || directory.len() % 4 != 0 {
        return Err(RasterError::Corrupt(format!(
            "GeoKeyDirectoryTag has invalid length {}",
            directory.len()
        )));
    }

    Ok(directory[4..]
        .chunks_exact(4)
        .filter(|entry| entry[1] == 0)
        .map(|entry| (entry[0], entry[3]))
        .collect())
}

fn geokey(keys: &[(u64, u64)], id: u64) -> Option<u64> {
    keys.iter().find(|(k, _)| *k == id).map(|(_, v)| *v)
}

fn read_geotransform(
    decoder: &mut ChunkDecoder,
    geokeys: &[(u64, u64)],
) -> Result<[f64; 6], RasterError> {
    let geotransform = read_raw_geotransform(decoder, geokeys)?;
    validate_geotransform(geotransform)?;
    Ok(geotransform)
}

/// A usable geotransform is finite with non-zero pixel sizes.
fn validate_geotransform(geotransform: [f64; 6]) -> Result<(), RasterError> {
    if geotransform.iter().any(|c| !c.is_finite()) {
        return Err(RasterError::Corrupt(format!(
            "geotransform has non-finite coefficients: {geotransform:?}"
        )));
    }
    if geotransform[1] == 0.0 || geotransform[5] == 0.0 {
        return Err(RasterError::Corrupt(format!(
            "geotransform has zero pixel size: {} x {}",
            geotransform[1], geotransform[5]
        )));
    }
    Ok(())
}

fn read_raw_geotransform(
    decoder: &mut ChunkDecoder,
    geokeys: &[(u64, u64)],
) -> Result<[f64; 6], RasterError> {
    if let Some(value) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = value.into_f64_vec()?;
        if m.len() != 16 {
            return Err(RasterError::Corrupt(format!(
                "ModelTransformationTag has {} values, expected 16",
                m.len()
            )));
        }
        return Ok([m[3], m[0], m[1], m[7], m[4], m[5]]);
    }

    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?;
    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?;
    let (Some(scale), Some(tiepoint)) = (scale, tiepoint) else {
        return Err(RasterError::MissingGeoreference(
            "expected ModelTransformationTag or ModelPixelScaleTag + ModelTiepointTag".into(),
        ));
    };

    let scale = scale.into_f64_vec()?;
    let tiepoint = tiepoint.into_f64_vec()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(RasterError::Corrupt(
            "ModelPixelScaleTag or ModelTiepointTag is truncated".into(),
        ));
    }

    let pixel_width = scale[0];
    let pixel_height = -scale[1];
    let mut origin_x = tiepoint[3] - tiepoint[0] * pixel_width;
    let mut origin_y = tiepoint[4] - tiepoint[1] * pixel_height;

    // Tiepoint refers to the pixel center; shift to the corner
    if geokey(geokeys, KEY_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT) {
        origin_x -= 0.5 * pixel_width;
        origin_y -= 0.5 * pixel_height;
    }

    Ok([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
}

fn crs_from_geokeys(geokeys: &[(u64, u64)]) -> Option<String> {
    [KEY_PROJECTED_CS_TYPE, KEY_GEOGRAPHIC_TYPE]
        .into_iter()
        .filter_map(|id| geokey(geokeys, id))
        .find(|&code| code != 0 && code != USER_DEFINED)
        .map(|code| format!("EPSG:{code}"))
}

fn to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|s| s as f32).collect(),
    }
}
