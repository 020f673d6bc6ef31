use thiserror::Error;

/// Errors raised while opening or reading the source raster
#[derive(Debug, Clone, Error)]
pub enum RasterError {
    /// The raster file could not be opened
    #[error("Failed to open raster {path}: {message}")]
    Open { path: String, message: String },

    /// The file opened but could not be decoded
    #[error("Corrupt raster: {0}")]
    Corrupt(String),

    /// No geotransform tags were found
    #[error("Raster has no georeferencing: {0}")]
    MissingGeoreference(String),

    /// Sample layout or format the decoder cannot produce
    #[error("Unsupported raster layout: {0}")]
    Unsupported(String),

    /// Fewer bands than the RGB pipeline needs
    #[error("Raster has {available} band(s), at least {required} required")]
    InsufficientBands { required: usize, available: usize },

    /// Requested window or band lies outside the raster
    #[error(
        "Window {width}x{height} at ({x}, {y}) of band {band} is outside a {raster_width}x{raster_height} raster"
    )]
    WindowOutOfBounds {
        band: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        raster_width: u32,
        raster_height: u32,
    },

    /// I/O failure while reading samples
    #[error("Raster read failed: {0}")]
    Read(String),
}

impl RasterError {
    /// Whether this error belongs to the startup (open/decode) family.
    pub fn is_init_error(&self) -> bool {
        matches!(
            self,
            RasterError::Open { .. }
                | RasterError::Corrupt(_)
                | RasterError::MissingGeoreference(_)
                | RasterError::Unsupported(_)
        )
    }
}

impl From<tiff::TiffError> for RasterError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(e) => RasterError::Read(e.to_string()),
            tiff::TiffError::UnsupportedError(e) => RasterError::Unsupported(e.to_string()),
            other => RasterError::Corrupt(other.to_string()),
        }
    }
}

/// Errors from converting points between coordinate reference systems
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// The raster carries no CRS descriptor
    #[error("Raster has no coordinate reference system")]
    MissingCrs,

    /// Descriptor names a code that is not in the CRS database
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    /// Descriptor could not be parsed into a projection
    #[error("Invalid projection definition {crs}: {message}")]
    InvalidDefinition { crs: String, message: String },

    /// The transform itself failed, usually outside the CRS domain
    #[error("Transform from {from} to {to} failed: {message}")]
    Transform {
        from: String,
        to: String,
        message: String,
    },

    /// The transform returned NaN or infinity
    #[error("Transform produced a non-finite point ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
}

/// Errors from the tile rendering pipeline
///
/// The tile endpoint degrades all of these to an empty tile; only the
/// diagnostic endpoints surface them to clients.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Raster open or read failure
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// Reprojection failure
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Resize or PNG encode failure
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// The raster failed to open at startup
    #[error("Raster is unavailable: {reason}")]
    RasterUnavailable { reason: String },

    /// Rendering did not finish within the configured budget
    #[error("Rendering timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// A blocking worker panicked or was cancelled
    #[error("Render task failed: {message}")]
    Task { message: String },
}
