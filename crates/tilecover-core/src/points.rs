//! Point file reading for path queries.
//!
//! A point file is a CSV with a header row. The X/longitude and Y/latitude
//! columns are either named explicitly or detected from common header names.

use crate::{Result, TileCoverError};
use geo::Coord;
use std::path::Path;
use tracing::debug;

/// Header names recognised as the X (longitude) column.
pub const X_COLUMN_NAMES: &[&str] = &["lon", "longitude", "x", "lng"];

/// Header names recognised as the Y (latitude) column.
pub const Y_COLUMN_NAMES: &[&str] = &["lat", "latitude", "y"];

/// Which CSV columns hold the coordinates.
///
/// `None` means auto-detect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointColumns {
    /// Explicit X/longitude column name.
    pub x: Option<String>,
    /// Explicit Y/latitude column name.
    pub y: Option<String>,
}

/// Read the points of a CSV file in file order.
pub fn read_points<P: AsRef<Path>>(path: P, columns: &PointColumns) -> Result<Vec<Coord<f64>>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TileCoverError::PointFileNotFound(path.to_path_buf()));
    }
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let points = read_points_from(reader, columns)?;
    debug!(path = %path.display(), points = points.len(), "Read point file");
    Ok(points)
}

/// Read points from any CSV reader.
pub fn read_points_from<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    columns: &PointColumns,
) -> Result<Vec<Coord<f64>>> {
    let headers = reader.headers()?.clone();
    let x_idx = find_column(&headers, columns.x.as_deref(), X_COLUMN_NAMES, "X/longitude")?;
    let y_idx = find_column(&headers, columns.y.as_deref(), Y_COLUMN_NAMES, "Y/latitude")?;

    let mut points = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = record.position().map(|p| p.line()).unwrap_or(0);
        let x = parse_cell(&record, x_idx, &headers, row)?;
        let y = parse_cell(&record, y_idx, &headers, row)?;
        points.push(Coord { x, y });
    }

    if points.is_empty() {
        return Err(TileCoverError::InvalidInput("point file has no data rows".to_string()));
    }

    Ok(points)
}

fn find_column(
    headers: &csv::StringRecord,
    explicit: Option<&str>,
    candidates: &[&str],
    role: &str,
) -> Result<usize> {
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    match explicit {
        Some(name) => position(name).ok_or_else(|| {
            TileCoverError::InvalidInput(format!("{} column '{}' not found in header", role, name))
        }),
        None => candidates.iter().find_map(|c| position(c)).ok_or_else(|| {
            TileCoverError::InvalidInput(format!(
                "no {} column found (expected one of: {})",
                role,
                candidates.join(", ")
            ))
        }),
    }
}

fn parse_cell(record: &csv::StringRecord, idx: usize, headers: &csv::StringRecord, row: u64) -> Result<f64> {
    let column = headers.get(idx).unwrap_or("?");
    let raw = record.get(idx).unwrap_or("");
    if raw.is_empty() {
        return Err(TileCoverError::InvalidPointRow {
            row,
            reason: format!("missing value in column '{}'", column),
        });
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(TileCoverError::InvalidPointRow {
            row,
            reason: format!("'{}' in column '{}' is not a number", raw, column),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes())
    }

    #[test]
    fn test_autodetect_columns() {
        let pts = read_points_from(reader("name,Latitude,Longitude\na,40.7,-74.0\nb,40.8,-73.9\n"), &PointColumns::default())
            .unwrap();
        assert_eq!(pts, vec![Coord { x: -74.0, y: 40.7 }, Coord { x: -73.9, y: 40.8 }]);
    }

    #[test]
    fn test_autodetect_short_names() {
        let pts = read_points_from(reader("lng,lat\n-74.0,40.7\n"), &PointColumns::default()).unwrap();
        assert_eq!(pts, vec![Coord { x: -74.0, y: 40.7 }]);
    }

    #[test]
    fn test_explicit_columns() {
        let columns = PointColumns {
            x: Some("easting".to_string()),
            y: Some("NORTHING".to_string()),
        };
        let pts = read_points_from(reader("easting,northing,lon\n10,20,99\n"), &columns).unwrap();
        assert_eq!(pts, vec![Coord { x: 10.0, y: 20.0 }]);
    }

    #[test]
    fn test_missing_column() {
        let err = read_points_from(reader("name,lat\na,40.7\n"), &PointColumns::default()).unwrap_err();
        assert!(matches!(err, TileCoverError::InvalidInput(_)));
    }

    #[test]
    fn test_bad_row_reports_line() {
        let err = read_points_from(reader("lon,lat\n-74.0,40.7\n-73.9,abc\n"), &PointColumns::default()).unwrap_err();
        match err {
            TileCoverError::InvalidPointRow { row, .. } => assert_eq!(row, 3),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_cell_rejected() {
        let err = read_points_from(reader("lon,lat\n,40.7\n"), &PointColumns::default()).unwrap_err();
        assert!(matches!(err, TileCoverError::InvalidPointRow { row: 2, .. }));
    }

    #[test]
    fn test_no_rows() {
        let err = read_points_from(reader("lon,lat\n"), &PointColumns::default()).unwrap_err();
        assert!(matches!(err, TileCoverError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = read_points("/nonexistent/points.csv", &PointColumns::default()).unwrap_err();
        assert!(matches!(err, TileCoverError::PointFileNotFound(_)));
    }
}
