//! Coordinate reference systems and reprojection.
//!
//! CRS identifiers are resolved through the `crs-definitions` EPSG database and
//! parsed with `proj4rs`, so no native PROJ installation is needed.
//!
//! Accepted identifier forms:
//! - `EPSG:4326` (authority prefix is case-insensitive)
//! - `4326` (bare EPSG code)
//! - `+proj=longlat +datum=WGS84 +no_defs` (raw PROJ.4 string)

use crate::{Result, TileCoverError};
use geo::{Coord, Geometry, MapCoords};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::fmt;
use tracing::debug;

/// Default CRS for user input: WGS 84 longitude/latitude.
pub const DEFAULT_INPUT_CRS: &str = "EPSG:4326";

/// A resolved coordinate reference system.
///
/// Immutable once resolved.
pub struct Crs {
    /// Identifier as given by the caller (normalised for EPSG codes).
    id: String,
    /// PROJ.4 definition the projection was built from.
    definition: String,
    /// Parsed projection.
    proj: Proj,
    /// Whether coordinates are longitude/latitude in degrees.
    geographic: bool,
}

impl fmt::Debug for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crs")
            .field("id", &self.id)
            .field("definition", &self.definition)
            .field("geographic", &self.geographic)
            .finish()
    }
}

impl Crs {
    /// Resolve a CRS from an identifier string.
    pub fn resolve(id: &str) -> Result<Self> {
        let trimmed = id.trim();

        if trimmed.starts_with("+proj=") {
            return Self::from_definition(trimmed.to_string(), trimmed.to_string());
        }

        let code = parse_epsg_code(trimmed)
            .ok_or_else(|| TileCoverError::UnsupportedCrs(format!("unrecognised identifier '{}'", id)))?;
        Self::from_epsg(code)
    }

    /// Resolve a CRS from an EPSG code.
    pub fn from_epsg(code: u16) -> Result<Self> {
        let def = crs_definitions::from_code(code).ok_or_else(|| {
            TileCoverError::UnsupportedCrs(format!("EPSG:{} is not in the CRS database", code))
        })?;
        Self::from_definition(format!("EPSG:{}", code), def.proj4.to_string())
    }

    fn from_definition(id: String, definition: String) -> Result<Self> {
        let proj = Proj::from_proj_string(&definition)
            .map_err(|e| TileCoverError::UnsupportedCrs(format!("{}: {:?}", id, e)))?;
        let geographic = definition.contains("+proj=longlat") || definition.contains("+proj=latlong");

        Ok(Self {
            id,
            definition,
            proj,
            geographic,
        })
    }

    /// Identifier of this CRS.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// PROJ.4 definition string.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Whether coordinates are longitude/latitude degrees.
    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    /// Check that a coordinate lies in the valid range for this CRS.
    ///
    /// Only geographic CRSs have a fixed range; projected coordinates only need
    /// to be finite.
    pub fn validate_coord(&self, x: f64, y: f64) -> std::result::Result<(), String> {
        if !x.is_finite() || !y.is_finite() {
            return Err(format!("coordinate ({}, {}) is not finite", x, y));
        }
        if self.geographic {
            if !(-180.0..=180.0).contains(&x) {
                return Err(format!("longitude {} outside [-180, 180]", x));
            }
            if !(-90.0..=90.0).contains(&y) {
                return Err(format!("latitude {} outside [-90, 90]", y));
            }
        }
        Ok(())
    }
}

/// Identifiers for OGC CRS84, WGS 84 with longitude first.
const CRS84_NAMES: [&str; 3] = ["URN:OGC:DEF:CRS:OGC:1.3:CRS84", "OGC:CRS84", "CRS84"];

/// Parse `EPSG:nnnn`, `epsg:nnnn`, `urn:ogc:def:crs:EPSG::nnnn` or a bare code.
///
/// The CRS84 names map to EPSG:4326; coordinates are always handled in
/// longitude/latitude order here, so the two are interchangeable.
pub(crate) fn parse_epsg_code(id: &str) -> Option<u16> {
    let id = id.trim();
    if let Ok(code) = id.parse::<u16>() {
        return Some(code);
    }

    let upper = id.to_ascii_uppercase();
    if CRS84_NAMES.contains(&upper.as_str()) {
        return Some(4326);
    }
    let rest = upper
        .strip_prefix("EPSG:")
        .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:"))?;
    // urn form may carry an empty version segment ("EPSG::2263")
    rest.trim_start_matches(':').parse().ok()
}

/// Converts geometry between two coordinate reference systems.
///
/// Built once per query; every vertex goes through the same pair of parsed
/// projections, so identical inputs always give identical outputs.
#[derive(Debug)]
pub struct Reprojector<'a> {
    source: &'a Crs,
    target: &'a Crs,
    identity: bool,
}

impl<'a> Reprojector<'a> {
    /// Create a reprojector from `source` to `target`.
    pub fn new(source: &'a Crs, target: &'a Crs) -> Self {
        let identity = source.definition == target.definition;
        debug!(
            from = source.id(),
            to = target.id(),
            identity,
            "Built reprojector"
        );
        Self {
            source,
            target,
            identity,
        }
    }

    /// Whether this reprojector leaves coordinates unchanged.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Transform a single coordinate.
    pub fn project_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        if self.identity {
            return Ok(coord);
        }

        // proj4rs works in radians for geographic coordinates
        let (x_in, y_in) = if self.source.geographic {
            (coord.x.to_radians(), coord.y.to_radians())
        } else {
            (coord.x, coord.y)
        };

        let mut point = (x_in, y_in, 0.0);
        transform(&self.source.proj, &self.target.proj, &mut point).map_err(|e| {
            TileCoverError::Reprojection {
                from: self.source.id.clone(),
                to: self.target.id.clone(),
                reason: format!("{:?}", e),
            }
        })?;

        let (x, y) = if self.target.geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !x.is_finite() || !y.is_finite() {
            return Err(TileCoverError::Reprojection {
                from: self.source.id.clone(),
                to: self.target.id.clone(),
                reason: format!("({}, {}) projected to a non-finite coordinate", coord.x, coord.y),
            });
        }

        Ok(Coord { x, y })
    }

    /// Transform every vertex of a geometry, preserving its ring structure.
    pub fn project(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.identity {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c| self.project_coord(c))
    }
}
