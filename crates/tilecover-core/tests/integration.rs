//! Integration tests for tilecover-core.
//!
//! Tile indexes and point files are written to a temporary directory and
//! read back through the public API.

use approx::assert_relative_eq;
use geo::Coord;
use std::fs;
use std::path::{Path, PathBuf};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::PolygonRing;
use tempfile::TempDir;
use tilecover_core::{
    read_points, AreaOfInterest, Crs, PointColumns, QueryConfig, QueryEngine, QueryKind, QueryParams,
    Reprojector, ScanStrategy, TileCoverError, TileIndex,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Write a GeoJSON feature collection of rectangular tiles.
///
/// Each tile is `(filename, [x0, y0, x1, y1])` in the given CRS.
fn write_geojson_index(dir: &Path, name: &str, crs: Option<&str>, field: &str, tiles: &[(&str, [f64; 4])]) -> PathBuf {
    let features: Vec<serde_json::Value> = tiles
        .iter()
        .map(|(file, [x0, y0, x1, y1])| {
            serde_json::json!({
                "type": "Feature",
                "properties": { "OBJECTID": 1, field: file },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
                }
            })
        })
        .collect();

    let mut collection = serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if let Some(crs) = crs {
        collection["crs"] = serde_json::json!({"type": "name", "properties": {"name": crs}});
    }

    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(&collection).unwrap()).unwrap();
    path
}

/// Write a GeoJSON index of quadrilaterals given by their four corners.
fn write_quad_index(dir: &Path, crs: &str, tiles: &[(&str, [Coord<f64>; 4])]) -> PathBuf {
    let features: Vec<serde_json::Value> = tiles
        .iter()
        .map(|(file, corners)| {
            let mut ring: Vec<[f64; 2]> = corners.iter().map(|c| [c.x, c.y]).collect();
            ring.push([corners[0].x, corners[0].y]);
            serde_json::json!({
                "type": "Feature",
                "properties": { "file_name": file },
                "geometry": { "type": "Polygon", "coordinates": [ring] }
            })
        })
        .collect();

    let collection = serde_json::json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": crs}},
        "features": features,
    });

    let path = dir.join("quads.geojson");
    fs::write(&path, collection.to_string()).unwrap();
    path
}

const UTM_18N_WKT: &str = r#"PROJCS["WGS 84 / UTM zone 18N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",-75],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],AUTHORITY["EPSG","32618"]]"#;

fn ring(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<shapefile::Point> {
    [(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]
        .iter()
        .map(|&(x, y)| shapefile::Point::new(x, y))
        .collect()
}

/// Write a `.shp`/`.dbf` pair (and a `.prj` when given) of polygon tiles.
///
/// `fields` names a numeric id column and a text column; each tile is
/// `(id, text, rings)`.
fn write_shapefile(
    dir: &Path,
    name: &str,
    fields: (&str, &str),
    prj: Option<&str>,
    tiles: &[(f64, &str, Vec<PolygonRing<shapefile::Point>>)],
) -> PathBuf {
    let path = dir.join(name);
    let table = TableWriterBuilder::new()
        .add_numeric_field(FieldName::try_from(fields.0).unwrap(), 10, 0)
        .add_character_field(FieldName::try_from(fields.1).unwrap(), 64);

    {
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
        for (id, text, rings) in tiles {
            let mut record = Record::default();
            record.insert(fields.0.to_string(), FieldValue::Numeric(Some(*id)));
            record.insert(fields.1.to_string(), FieldValue::Character(Some(text.to_string())));
            let polygon = shapefile::Polygon::with_rings(rings.clone());
            writer.write_shape_and_record(&polygon, &record).unwrap();
        }
    }

    if let Some(wkt) = prj {
        fs::write(path.with_extension("prj"), wkt).unwrap();
    }
    path
}

/// Two 1 km UTM tiles side by side; the western one has a 200 m hole.
fn write_holed_shapefile(dir: &Path) -> PathBuf {
    write_shapefile(
        dir,
        "tiles.shp",
        ("ID", "FILENAME"),
        Some(UTM_18N_WKT),
        &[
            (
                1.0,
                "a.las",
                vec![
                    PolygonRing::Outer(ring(500_000.0, 4_500_000.0, 501_000.0, 4_501_000.0)),
                    PolygonRing::Inner(ring(500_400.0, 4_500_400.0, 500_600.0, 4_500_600.0)),
                ],
            ),
            (
                2.0,
                "b.las",
                vec![PolygonRing::Outer(ring(501_000.0, 4_500_000.0, 502_000.0, 4_501_000.0))],
            ),
        ],
    )
}

fn projected_corners(r: &Reprojector, x0: f64, y0: f64, x1: f64, y1: f64) -> [Coord<f64>; 4] {
    [(x0, y0), (x1, y0), (x1, y1), (x0, y1)].map(|(x, y)| r.project_coord(Coord { x, y }).unwrap())
}

// ============================================================================
// Bounding box queries
// ============================================================================

#[test]
fn test_bbox_two_tiles_full_coverage_in_projected_index() {
    let dir = TempDir::new().unwrap();
    let wgs84 = Crs::resolve("EPSG:4326").unwrap();
    let utm = Crs::resolve("EPSG:32618").unwrap();
    let r = Reprojector::new(&wgs84, &utm);

    // Two tiles splitting the query box at -74.0, stored in UTM metres
    let index_path = write_quad_index(
        dir.path(),
        "urn:ogc:def:crs:EPSG::32618",
        &[
            ("west.las", projected_corners(&r, -74.1, 40.7, -74.0, 40.8)),
            ("east.las", projected_corners(&r, -74.0, 40.7, -73.9, 40.8)),
        ],
    );

    let index = TileIndex::open(&index_path, None).unwrap();
    assert_eq!(index.crs().id(), "EPSG:32618");
    assert_eq!(index.filename_field().name(), "file_name");

    let params = QueryParams::new(AreaOfInterest::bbox(-74.1, 40.7, -73.9, 40.8));
    let result = QueryEngine::new().run(&params, &index, None).unwrap();

    let names: Vec<_> = result.matched_tiles.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["east.las", "west.las"]);
    assert_eq!(result.total_tiles_in_index, 2);
    assert_eq!(result.index_crs, "EPSG:32618");

    // Areas are in square metres: the box is roughly 16.9 km x 11.1 km
    assert!(result.query_area > 1.5e8 && result.query_area < 2.2e8, "query area {}", result.query_area);
    let coverage = result.coverage_percent.unwrap();
    assert_relative_eq!(coverage, 100.0, max_relative = 1e-3);
    assert_eq!(result.overrun_percent.unwrap(), coverage - 100.0);
}

#[test]
fn test_bbox_outside_index() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(
        dir.path(),
        "tiles.geojson",
        None,
        "FILENAME",
        &[("a.las", [-74.1, 40.7, -74.0, 40.8]), ("b.las", [-74.0, 40.7, -73.9, 40.8])],
    );
    let index = TileIndex::open(&index_path, None).unwrap();

    let params = QueryParams::new(AreaOfInterest::bbox(10.0, 50.0, 10.1, 50.1));
    let result = QueryEngine::new().run(&params, &index, None).unwrap();

    assert!(result.matched_tiles.is_empty());
    assert_eq!(result.total_tiles_in_index, 2);
    assert_eq!(result.coverage_percent, Some(0.0));
}

#[test]
fn test_buffer_pulls_in_neighbouring_tile() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(
        dir.path(),
        "tiles.geojson",
        None,
        "filename",
        &[("inside.las", [0.0, 0.0, 1.0, 1.0]), ("nearby.las", [1.05, 0.0, 2.0, 1.0])],
    );
    let index = TileIndex::open(&index_path, None).unwrap();
    let engine = QueryEngine::new();

    let tight = QueryParams::new(AreaOfInterest::bbox(0.2, 0.2, 1.0, 0.8));
    assert_eq!(engine.run(&tight, &index, None).unwrap().matched_tiles.len(), 1);

    let buffered = QueryParams::new(AreaOfInterest::BoundingBox {
        min_x: 0.2,
        min_y: 0.2,
        max_x: 1.0,
        max_y: 0.8,
        buffer: 0.1,
    });
    let result = engine.run(&buffered, &index, None).unwrap();
    assert_eq!(result.matched_tiles.len(), 2);
}

#[test]
fn test_overlapping_duplicates_in_index() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(
        dir.path(),
        "tiles.geojson",
        None,
        "filename",
        &[
            ("a.las", [0.0, 0.0, 1.0, 1.0]),
            ("a.las", [0.0, 0.0, 1.0, 1.0]),
            ("b.las", [0.5, 0.0, 1.5, 1.0]),
        ],
    );
    let index = TileIndex::open(&index_path, None).unwrap();
    let params = QueryParams::new(AreaOfInterest::bbox(0.0, 0.0, 1.5, 1.0));
    let result = QueryEngine::new().run(&params, &index, None).unwrap();

    assert_eq!(result.matched_tiles.len(), 2);
    assert_relative_eq!(result.coverage_percent.unwrap(), 100.0, max_relative = 1e-9);
}

#[test]
fn test_parallel_scan_from_config() {
    let dir = TempDir::new().unwrap();
    let mut tiles = Vec::new();
    let names: Vec<String> = (0..100).map(|i| format!("tile_{:03}.las", i)).collect();
    for (i, name) in names.iter().enumerate() {
        let x = (i % 10) as f64;
        let y = (i / 10) as f64;
        tiles.push((name.as_str(), [x, y, x + 1.0, y + 1.0]));
    }
    let index_path = write_geojson_index(dir.path(), "grid.geojson", None, "filename", &tiles);
    let index = TileIndex::open(&index_path, None).unwrap();
    let params = QueryParams::new(AreaOfInterest::bbox(2.5, 2.5, 4.5, 4.5));

    let linear = QueryEngine::new().run(&params, &index, None).unwrap();

    let config = QueryConfig::from_yaml_str("scan: parallel\nparallel_chunk_size: 8\n").unwrap();
    assert_eq!(config.scan, ScanStrategy::Parallel);
    let parallel = QueryEngine::from_config(&config).run(&params, &index, None).unwrap();

    assert_eq!(linear.matched_tiles, parallel.matched_tiles);
    assert_eq!(linear.matched_tiles.len(), 9);
    assert_eq!(linear.coverage_percent, parallel.coverage_percent);
}

// ============================================================================
// Shapefile indexes
// ============================================================================

#[test]
fn test_shapefile_schema_and_prj_crs() {
    let dir = TempDir::new().unwrap();
    let index = TileIndex::open(write_holed_shapefile(dir.path()), None).unwrap();

    assert_eq!(index.schema(), ["ID", "FILENAME"]);
    assert_eq!(index.filename_field().name(), "FILENAME");
    assert_eq!(index.filename_field().position(), 1);
    assert_eq!(index.crs().id(), "EPSG:32618");
    assert_eq!(index.len(), 2);

    let names: Vec<_> = index.records().iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["a.las", "b.las"]);
    let holed = &index.records()[0].footprint;
    assert_eq!(holed.0.len(), 1);
    assert_eq!(holed.0[0].interiors().len(), 1);
}

#[test]
fn test_shapefile_hole_is_not_covered() {
    let dir = TempDir::new().unwrap();
    let index = TileIndex::open(write_holed_shapefile(dir.path()), None).unwrap();
    let engine = QueryEngine::new();

    // A box strictly inside the hole touches no tile data
    let inside_hole = QueryParams::new(AreaOfInterest::bbox(500_450.0, 4_500_450.0, 500_550.0, 4_500_550.0))
        .with_input_crs("EPSG:32618");
    let result = engine.run(&inside_hole, &index, None).unwrap();
    assert!(result.matched_tiles.is_empty());

    // A path starting in the hole reaches both tiles through its hull
    let path = QueryParams::new(AreaOfInterest::Points(vec![
        Coord { x: 500_500.0, y: 4_500_500.0 },
        Coord { x: 501_500.0, y: 4_500_500.0 },
        Coord { x: 501_500.0, y: 4_500_520.0 },
    ]))
    .with_input_crs("EPSG:32618");
    let result = engine.run(&path, &index, None).unwrap();
    let names: Vec<_> = result.matched_tiles.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["a.las", "b.las"]);

    // The hole is left out of the covered area
    let both = QueryParams::new(AreaOfInterest::bbox(500_000.0, 4_500_000.0, 502_000.0, 4_501_000.0))
        .with_input_crs("EPSG:32618");
    let result = engine.run(&both, &index, None).unwrap();
    assert_relative_eq!(result.matched_area, 2.0e6 - 4.0e4, max_relative = 1e-6);
    assert_relative_eq!(result.coverage_percent.unwrap(), 98.0, max_relative = 1e-6);
}

#[test]
fn test_shapefile_queried_in_wgs84() {
    let dir = TempDir::new().unwrap();
    let index = TileIndex::open(write_holed_shapefile(dir.path()), None).unwrap();

    let utm = Crs::resolve("EPSG:32618").unwrap();
    let wgs84 = Crs::resolve("EPSG:4326").unwrap();
    let to_wgs84 = Reprojector::new(&utm, &wgs84);
    let centre = to_wgs84.project_coord(Coord { x: 501_500.0, y: 4_500_500.0 }).unwrap();

    let params = QueryParams::new(AreaOfInterest::bbox(centre.x - 0.001, centre.y - 0.001, centre.x + 0.001, centre.y + 0.001));
    let result = QueryEngine::new().run(&params, &index, None).unwrap();
    let names: Vec<_> = result.matched_tiles.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["b.las"]);
}

#[test]
fn test_shapefile_without_filename_field() {
    let dir = TempDir::new().unwrap();
    let path = write_shapefile(
        dir.path(),
        "tiles.shp",
        ("ID", "NAME"),
        None,
        &[(1.0, "a.las", vec![PolygonRing::Outer(ring(0.0, 0.0, 1.0, 1.0))])],
    );

    // Rejected on the schema alone, before the missing .prj matters
    match TileIndex::open(&path, None) {
        Err(TileCoverError::SchemaFieldNotFound { fields }) => assert_eq!(fields, vec!["ID", "NAME"]),
        other => panic!("unexpected result: {:?}", other.map(|i| i.len())),
    }
}

#[test]
fn test_shapefile_without_epsg_authority_needs_override() {
    let dir = TempDir::new().unwrap();
    let esri_wkt = r#"PROJCS["NAD_1983_StatePlane_New_York_Long_Island_FIPS_3104_Feet",GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Conformal_Conic"],UNIT["Foot_US",0.3048006096012192]]"#;
    let path = write_shapefile(
        dir.path(),
        "nyc.shp",
        ("ID", "FILENAME"),
        Some(esri_wkt),
        &[(1.0, "987210.las", vec![PolygonRing::Outer(ring(985_000.0, 210_000.0, 987_500.0, 212_500.0))])],
    );

    assert!(matches!(TileIndex::open(&path, None), Err(TileCoverError::UnsupportedCrs(_))));

    let index = TileIndex::open(&path, Some("EPSG:2263")).unwrap();
    assert_eq!(index.crs().id(), "EPSG:2263");
    assert_eq!(index.records().len(), 1);
}

// ============================================================================
// Point queries
// ============================================================================

#[test]
fn test_single_row_point_file() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(dir.path(), "tiles.geojson", None, "filename", &[("a.las", [0.0, 0.0, 1.0, 1.0])]);
    let points_path = dir.path().join("points.csv");
    fs::write(&points_path, "id,lat,lon\n1,0.5,0.5\n").unwrap();

    let points = read_points(&points_path, &PointColumns::default()).unwrap();
    let index = TileIndex::open(&index_path, None).unwrap();
    let result = QueryEngine::new()
        .run(&QueryParams::new(AreaOfInterest::Points(points)), &index, None)
        .unwrap();

    assert_eq!(result.query_kind, QueryKind::Point);
    assert!(result.query_area > 0.0);
    assert_eq!(result.matched_tiles.len(), 1);
    assert_eq!(result.coverage_percent, None);
}

#[test]
fn test_collinear_point_file() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(
        dir.path(),
        "tiles.geojson",
        None,
        "filename",
        &[("a.las", [0.0, 0.0, 1.0, 1.0]), ("b.las", [2.0, 2.0, 3.0, 3.0]), ("c.las", [0.0, 2.0, 1.0, 3.0])],
    );
    let points_path = dir.path().join("route.csv");
    fs::write(&points_path, "longitude,latitude\n0.5,0.5\n1.5,1.5\n2.5,2.5\n").unwrap();

    let points = read_points(&points_path, &PointColumns::default()).unwrap();
    let index = TileIndex::open(&index_path, None).unwrap();
    let result = QueryEngine::new()
        .run(&QueryParams::new(AreaOfInterest::Points(points)), &index, None)
        .unwrap();

    let names: Vec<_> = result.matched_tiles.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["a.las", "b.las"]);
    assert_eq!(result.query_area, 0.0);
}

#[test]
fn test_bad_point_row_reported() {
    let dir = TempDir::new().unwrap();
    let points_path = dir.path().join("route.csv");
    fs::write(&points_path, "x,y\n1,2\n3,\n").unwrap();
    let err = read_points(&points_path, &PointColumns::default()).unwrap_err();
    assert!(matches!(err, TileCoverError::InvalidPointRow { row: 3, .. }));
}

// ============================================================================
// Index errors
// ============================================================================

#[test]
fn test_schema_without_filename_field() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(dir.path(), "tiles.geojson", None, "location", &[("a.las", [0.0, 0.0, 1.0, 1.0])]);
    let err = TileIndex::open(&index_path, None).unwrap_err();
    match err {
        TileCoverError::SchemaFieldNotFound { fields } => {
            assert_eq!(fields, vec!["OBJECTID", "location"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_crs_override() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(dir.path(), "tiles.geojson", Some("EPSG:4326"), "filename", &[("a.las", [500_000.0, 4_500_000.0, 501_000.0, 4_501_000.0])]);
    let index = TileIndex::open(&index_path, Some("EPSG:32618")).unwrap();
    assert_eq!(index.crs().id(), "EPSG:32618");
}

#[test]
fn test_geojson_crs84_member() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(
        dir.path(),
        "tiles.geojson",
        Some("urn:ogc:def:crs:OGC:1.3:CRS84"),
        "filename",
        &[("a.las", [-74.1, 40.7, -74.0, 40.8])],
    );
    let index = TileIndex::open(&index_path, None).unwrap();
    assert_eq!(index.crs().id(), "EPSG:4326");

    let params = QueryParams::new(AreaOfInterest::bbox(-74.08, 40.72, -74.02, 40.78));
    let result = QueryEngine::new().run(&params, &index, None).unwrap();
    assert_eq!(result.matched_tiles.len(), 1);
}

#[test]
fn test_unknown_geojson_crs() {
    let dir = TempDir::new().unwrap();
    let index_path = write_geojson_index(dir.path(), "tiles.geojson", Some("EPSG:1"), "filename", &[("a.las", [0.0, 0.0, 1.0, 1.0])]);
    assert!(matches!(TileIndex::open(&index_path, None), Err(TileCoverError::UnsupportedCrs(_))));
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tiles.gpkg");
    fs::write(&path, b"not really a geopackage").unwrap();
    assert!(matches!(TileIndex::open(&path, None), Err(TileCoverError::UnsupportedFormat(_))));
}

#[test]
fn test_shapefile_without_dbf() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tiles.shp");
    fs::write(&path, b"").unwrap();
    match TileIndex::open(&path, None) {
        Err(TileCoverError::IndexNotFound(missing)) => {
            assert_eq!(missing.extension().and_then(|e| e.to_str()), Some("dbf"));
        }
        other => panic!("unexpected result: {:?}", other.map(|i| i.len())),
    }
}
