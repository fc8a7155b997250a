//! Tile index loading.
//!
//! A tile index is a vector dataset with one polygon footprint per survey
//! tile, a CRS, and an attribute schema with a filename-like field. Two
//! on-disk formats are read:
//! - ESRI shapefiles (`.shp` with its `.dbf` attribute table and `.prj` CRS)
//! - GeoJSON (`.geojson` / `.json` feature collections)
//!
//! The filename field is resolved from the schema before any geometry is
//! read, so a dataset without one is rejected up front.

use crate::crs::{parse_epsg_code, Crs};
use crate::schema::{AttributeValue, FilenameField};
use crate::{Result, TileCoverError};
use geo::{BoundingRect, Geometry, MultiPolygon, Polygon, Rect};
use geojson::GeoJson;
use shapefile::dbase::{self, FieldValue};
use shapefile::{PolygonRing, Shape, ShapeReader};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// One tile of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRecord {
    /// File identifier of the tile. Not guaranteed unique across records.
    pub filename: String,
    /// Footprint polygon(s) in the index CRS.
    pub footprint: MultiPolygon<f64>,
}

impl TileRecord {
    /// Create a record from a single polygon footprint.
    pub fn new(filename: impl Into<String>, footprint: Polygon<f64>) -> Self {
        Self {
            filename: filename.into(),
            footprint: MultiPolygon::new(vec![footprint]),
        }
    }
}

/// An index feature before schema mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry, if any.
    pub geometry: Option<Geometry<f64>>,
    /// Attributes in schema order.
    pub attributes: Vec<(String, AttributeValue)>,
}

/// A loaded tile index.
///
/// Records are read once at open time; the index is read-only afterwards and
/// can be scanned by any number of queries.
#[derive(Debug)]
pub struct TileIndex {
    /// CRS of the footprints.
    crs: Crs,
    /// Attribute names in schema order.
    schema: Vec<String>,
    /// Resolved filename accessor.
    filename_field: FilenameField,
    /// Usable tile records.
    records: Vec<TileRecord>,
    /// Number of records in the dataset, including dropped ones.
    total: usize,
}

impl TileIndex {
    /// Open a tile index file, choosing the reader from its extension.
    ///
    /// `crs_override` replaces whatever CRS the dataset declares.
    pub fn open<P: AsRef<Path>>(path: P, crs_override: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TileCoverError::IndexNotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let index = match extension.as_deref() {
            Some("shp") => Self::open_shapefile(path, crs_override)?,
            Some("geojson") | Some("json") => Self::open_geojson(path, crs_override)?,
            _ => return Err(TileCoverError::UnsupportedFormat(path.to_path_buf())),
        };

        info!(
            path = %path.display(),
            records = index.total,
            usable = index.records.len(),
            crs = index.crs.id(),
            field = index.filename_field.name(),
            "Opened tile index"
        );
        debug!(schema = ?index.schema(), bounds = ?index.total_bounds(), "Tile index extent");

        Ok(index)
    }

    /// Build an index from in-memory features.
    ///
    /// Features without an areal geometry or without a filename value are
    /// dropped but still counted in [`TileIndex::len`].
    pub fn from_features<I>(crs: Crs, schema: Vec<String>, features: I) -> Result<Self>
    where
        I: IntoIterator<Item = Feature>,
    {
        let filename_field = FilenameField::resolve(&schema)?;

        let mut records = Vec::new();
        let mut total = 0;
        for (i, feature) in features.into_iter().enumerate() {
            total += 1;

            let Some(filename) = filename_field.extract(&feature.attributes) else {
                warn!(record = i, field = filename_field.name(), "Dropping record without a filename");
                continue;
            };

            let Some(footprint) = feature.geometry.and_then(areal) else {
                warn!(record = i, filename = %filename, "Dropping record without a polygon footprint");
                continue;
            };

            records.push(TileRecord { filename, footprint });
        }

        Ok(Self {
            crs,
            schema,
            filename_field,
            records,
            total,
        })
    }

    /// Read an ESRI shapefile with its `.dbf` table and `.prj` CRS.
    fn open_shapefile(path: &Path, crs_override: Option<&str>) -> Result<Self> {
        let dbf_path = path.with_extension("dbf");
        if !dbf_path.exists() {
            return Err(TileCoverError::IndexNotFound(dbf_path));
        }

        let dbase_reader = dbase::Reader::from_path(&dbf_path)?;
        let schema: Vec<String> = dbase_reader
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .filter(|name| name != "DeletionFlag")
            .collect();
        let filename_field = FilenameField::resolve(&schema)?;
        debug!(field = filename_field.name(), position = filename_field.position(), "Resolved filename field");

        let crs = match crs_override {
            Some(id) => Crs::resolve(id)?,
            None => {
                let prj_path = path.with_extension("prj");
                let wkt = std::fs::read_to_string(&prj_path).map_err(|_| {
                    TileCoverError::UnsupportedCrs(format!(
                        "{} has no readable .prj file; specify the index CRS explicitly",
                        path.display()
                    ))
                })?;
                let code = epsg_from_wkt(&wkt).ok_or_else(|| {
                    TileCoverError::UnsupportedCrs(format!(
                        "{} carries no EPSG authority; specify the index CRS explicitly",
                        prj_path.display()
                    ))
                })?;
                Crs::from_epsg(code)?
            }
        };

        let shape_reader = ShapeReader::from_path(path)?;
        let mut reader = shapefile::Reader::new(shape_reader, dbase_reader);

        let mut features = Vec::new();
        for item in reader.iter_shapes_and_records() {
            let (shape, record) = item?;
            // Lay attributes out in schema order so the filename is read by position
            let attributes = schema
                .iter()
                .map(|name| {
                    let value = record.get(name).map(attribute_from_dbase).unwrap_or(AttributeValue::Null);
                    (name.clone(), value)
                })
                .collect();
            features.push(Feature {
                geometry: multipolygon_from_shape(shape).map(Geometry::MultiPolygon),
                attributes,
            });
        }

        Self::from_features(crs, schema, features)
    }

    /// Read a GeoJSON feature collection.
    fn open_geojson(path: &Path, crs_override: Option<&str>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let geojson: GeoJson = text.parse()?;

        let (features, foreign_members) = match geojson {
            GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
            GeoJson::Feature(f) => (vec![f], None),
            GeoJson::Geometry(_) => {
                return Err(TileCoverError::InvalidInput(format!(
                    "{} holds a bare geometry, not features",
                    path.display()
                )))
            }
        };

        // Property keys in first-seen order stand in for a schema
        let mut schema = Vec::new();
        let mut seen = HashSet::new();
        for feature in &features {
            if let Some(props) = &feature.properties {
                for key in props.keys() {
                    if seen.insert(key.clone()) {
                        schema.push(key.clone());
                    }
                }
            }
        }
        // Fail on the schema before decoding any geometry
        FilenameField::resolve(&schema)?;

        let crs = match crs_override {
            Some(id) => Crs::resolve(id)?,
            None => match declared_geojson_crs(foreign_members.as_ref()) {
                Some(name) => {
                    let code = parse_epsg_code(&name).ok_or_else(|| {
                        TileCoverError::UnsupportedCrs(format!("unrecognised GeoJSON crs member '{}'", name))
                    })?;
                    Crs::from_epsg(code)?
                }
                // RFC 7946 coordinates are WGS 84 longitude/latitude
                None => Crs::from_epsg(4326)?,
            },
        };

        let mut converted = Vec::with_capacity(features.len());
        for feature in features {
            let geometry = feature.geometry.map(Geometry::<f64>::try_from).transpose()?;
            let attributes = feature
                .properties
                .map(|props| {
                    props
                        .iter()
                        .map(|(k, v)| (k.clone(), AttributeValue::from(v)))
                        .collect()
                })
                .unwrap_or_default();
            converted.push(Feature {
                geometry,
                attributes,
            });
        }

        Self::from_features(crs, schema, converted)
    }

    /// CRS of the tile footprints.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Attribute names in schema order.
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// The resolved filename field.
    pub fn filename_field(&self) -> &FilenameField {
        &self.filename_field
    }

    /// Usable tile records.
    pub fn records(&self) -> &[TileRecord] {
        &self.records
    }

    /// Total number of records in the dataset, including dropped ones.
    pub fn len(&self) -> usize {
        self.total
    }

    /// Whether the dataset has no records at all.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Bounding rectangle of all footprints, in the index CRS.
    pub fn total_bounds(&self) -> Option<Rect<f64>> {
        self.records
            .iter()
            .filter_map(|r| r.footprint.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    geo::Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    geo::Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
    }
}

/// Keep only areal geometries, as a multipolygon.
fn areal(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let polygons: Vec<Polygon<f64>> = gc
                .into_iter()
                .filter_map(areal)
                .flat_map(|mp| mp.0)
                .collect();
            (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

fn attribute_from_dbase(value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) => AttributeValue::Text(s.clone()),
        FieldValue::Memo(s) => AttributeValue::Text(s.clone()),
        FieldValue::Numeric(Some(n)) => AttributeValue::Number(*n),
        FieldValue::Float(Some(n)) => AttributeValue::Number(f64::from(*n)),
        FieldValue::Integer(n) => AttributeValue::Number(f64::from(*n)),
        FieldValue::Double(n) => AttributeValue::Number(*n),
        FieldValue::Logical(Some(b)) => AttributeValue::Bool(*b),
        _ => AttributeValue::Null,
    }
}

fn multipolygon_from_shape(shape: Shape) -> Option<MultiPolygon<f64>> {
    let polygons = match shape {
        Shape::Polygon(p) => rings_to_multipolygon(p.rings(), |pt| (pt.x, pt.y)),
        Shape::PolygonM(p) => rings_to_multipolygon(p.rings(), |pt| (pt.x, pt.y)),
        Shape::PolygonZ(p) => rings_to_multipolygon(p.rings(), |pt| (pt.x, pt.y)),
        _ => return None,
    };
    (!polygons.0.is_empty()).then_some(polygons)
}

/// Assemble shapefile rings into polygons; each inner ring belongs to the most
/// recent outer ring.
fn rings_to_multipolygon<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for ring in rings {
        let line: geo::LineString<f64> = ring.points().iter().map(&xy).collect::<Vec<_>>().into();
        match ring {
            PolygonRing::Outer(_) => polygons.push(Polygon::new(line, vec![])),
            PolygonRing::Inner(_) => match polygons.last_mut() {
                Some(outer) => outer.interiors_push(line),
                // Orphan hole; treat it as its own shell
                None => polygons.push(Polygon::new(line, vec![])),
            },
        }
    }
    MultiPolygon::new(polygons)
}

/// Pull the EPSG code of the outermost `AUTHORITY["EPSG", ...]` (WKT1) or
/// `ID["EPSG", ...]` (WKT2) element from a WKT string.
///
/// In both dialects the outermost element is the last one in the text.
fn epsg_from_wkt(wkt: &str) -> Option<u16> {
    let upper = wkt.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    let mut found: Option<(usize, u16)> = None;
    for keyword in ["AUTHORITY[", "ID["] {
        let mut from = 0;
        while let Some(offset) = upper[from..].find(keyword) {
            let start = from + offset;
            from = start + keyword.len();

            // "ID[" must not be the tail of another keyword such as "GRID["
            if keyword == "ID[" && start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
                continue;
            }

            let body = &upper[from..];
            let end = body.find(']').unwrap_or(body.len());
            let mut parts = body[..end].split(',').map(|p| p.trim().trim_matches('"').trim());
            if parts.next() != Some("EPSG") {
                continue;
            }
            if let Some(code) = parts.next().and_then(|c| c.parse::<u16>().ok()) {
                if found.map_or(true, |(pos, _)| start > pos) {
                    found = Some((start, code));
                }
            }
        }
    }

    found.map(|(_, code)| code)
}

/// The legacy `crs` member of a GeoJSON document, if present.
fn declared_geojson_crs(foreign_members: Option<&geojson::JsonObject>) -> Option<String> {
    foreign_members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}
