//! Point reprojection between coordinate reference systems.
//!
//! The production implementation is pure Rust: [`proj4rs`] for the math
//! and [`crs_definitions`] to resolve EPSG codes to PROJ strings.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::ProjectionError;

/// Descriptor for geographic WGS84 longitude/latitude.
pub const WGS84: &str = "EPSG:4326";

/// Converts single points between coordinate reference systems.
///
/// CRS descriptors are strings; how they are interpreted is up to the
/// implementation. Geographic coordinates are always in degrees.
pub trait Projector: Send + Sync + 'static {
    fn reproject(
        &self,
        src_crs: &str,
        dst_crs: &str,
        point: (f64, f64),
    ) -> Result<(f64, f64), ProjectionError>;
}

/// [`Projector`] backed by proj4rs.
///
/// Accepts `EPSG:<code>`, a bare `<code>`, or a literal `+proj=...` string.
/// Each descriptor is resolved and parsed once, then reused for every
/// later call.
#[derive(Default)]
pub struct Proj4Projector {
    parsed: RwLock<HashMap<String, Arc<ParsedCrs>>>,
}

/// A descriptor resolved to its PROJ definition and parsed.
struct ParsedCrs {
    definition: String,
    proj: Proj,
    geographic: bool,
}

impl Proj4Projector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct descriptors parsed so far.
    pub fn cached_definitions(&self) -> usize {
        self.parsed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn parsed(&self, crs: &str) -> Result<Arc<ParsedCrs>, ProjectionError> {
        if let Some(found) = self
            .parsed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(crs)
        {
            return Ok(Arc::clone(found));
        }

        // Failures are not cached
        let definition = resolve_proj_string(crs)?;
        let parsed = Arc::new(ParsedCrs {
            proj: parse_proj(crs, &definition)?,
            geographic: is_geographic_definition(&definition),
            definition,
        });

        let mut map = self.parsed.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            map.entry(crs.to_string()).or_insert_with(|| parsed),
        ))
    }
}

impl fmt::Debug for Proj4Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proj4Projector")
            .field("cached_definitions", &self.cached_definitions())
            .finish()
    }
}

impl Projector for Proj4Projector {
    fn reproject(
        &self,
        src_crs: &str,
        dst_crs: &str,
        point: (f64, f64),
    ) -> Result<(f64, f64), ProjectionError> {
        let src = self.parsed(src_crs)?;
        let dst = self.parsed(dst_crs)?;

        if src.definition == dst.definition {
            return Ok(point);
        }

        // proj4rs works in radians for geographic systems
        let (x, y) = if src.geographic {
            (point.0.to_radians(), point.1.to_radians())
        } else {
            point
        };

        let mut p = (x, y, 0.0);
        transform(&src.proj, &dst.proj, &mut p).map_err(|e| ProjectionError::Transform {
            from: src_crs.to_string(),
            to: dst_crs.to_string(),
            message: format!("{e:?}"),
        })?;

        let (out_x, out_y) = if dst.geographic {
            (p.0.to_degrees(), p.1.to_degrees())
        } else {
            (p.0, p.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(ProjectionError::NonFinite { x: out_x, y: out_y });
        }
        Ok((out_x, out_y))
    }
}

/// Resolve a CRS descriptor to a PROJ string.
pub fn resolve_proj_string(crs: &str) -> Result<String, ProjectionError> {
    let trimmed = crs.trim();
    if trimmed.is_empty() {
        return Err(ProjectionError::MissingCrs);
    }
    if trimmed.starts_with('+') {
        return Ok(trimmed.to_string());
    }

    let code_str = trimmed
        .strip_prefix("EPSG:")
        .or_else(|| trimmed.strip_prefix("epsg:"))
        .unwrap_or(trimmed);
    let code: u16 = code_str
        .trim()
        .parse()
        .map_err(|_| ProjectionError::UnknownCrs(crs.to_string()))?;

    crs_definitions::from_code(code)
        .map(|def| def.proj4.to_string())
        .ok_or_else(|| ProjectionError::UnknownCrs(crs.to_string()))
}

fn parse_proj(crs: &str, definition: &str) -> Result<Proj, ProjectionError> {
    Proj::from_proj_string(definition).map_err(|e| ProjectionError::InvalidDefinition {
        crs: crs.to_string(),
        message: format!("{e:?}"),
    })
}

fn is_geographic_definition(definition: &str) -> bool {
    definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
}

/// Returns every point unchanged. Handy when the raster is already in
/// geographic coordinates and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProjector;

impl Projector for IdentityProjector {
    fn reproject(
        &self,
        _src_crs: &str,
        _dst_crs: &str,
        point: (f64, f64),
    ) -> Result<(f64, f64), ProjectionError> {
        Ok(point)
    }
}
