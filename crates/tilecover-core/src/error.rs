//! Error types for tile coverage queries.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, reprojecting or scanning a query.
#[derive(Debug, Error)]
pub enum TileCoverError {
    /// I/O error reading an input file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bounding box is degenerate or reversed, or the buffer is invalid.
    #[error("Invalid bounds ({min_x}, {min_y}, {max_x}, {max_y}): {reason}")]
    InvalidBounds {
        /// Minimum X.
        min_x: f64,
        /// Minimum Y.
        min_y: f64,
        /// Maximum X.
        max_x: f64,
        /// Maximum Y.
        max_y: f64,
        /// What is wrong with them.
        reason: String,
    },

    /// Point data or parameters are empty or out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A single row of a point file could not be used.
    #[error("Invalid point at row {row}: {reason}")]
    InvalidPointRow {
        /// 1-based line number in the point file.
        row: u64,
        /// Why the row was rejected.
        reason: String,
    },

    /// The index schema has no filename-like attribute.
    #[error("No attribute starting with \"file\" in index schema (fields: {})", fields.join(", "))]
    SchemaFieldNotFound {
        /// Fields the schema does declare, in order.
        fields: Vec<String>,
    },

    /// A CRS could not be resolved to a coordinate transform.
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// Tile index path does not exist.
    #[error("Tile index not found: {}", .0.display())]
    IndexNotFound(PathBuf),

    /// Point file path does not exist.
    #[error("Point file not found: {}", .0.display())]
    PointFileNotFound(PathBuf),

    /// Tile index has an extension no reader handles.
    #[error("Unsupported tile index format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Reprojection of a coordinate failed.
    #[error("Reprojection from {from} to {to} failed: {reason}")]
    Reprojection {
        /// Source CRS id.
        from: String,
        /// Destination CRS id.
        to: String,
        /// Underlying failure.
        reason: String,
    },

    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Shapefile decoding error.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// dBase attribute table error.
    #[error("dBase error: {0}")]
    Dbase(#[from] shapefile::dbase::Error),

    /// GeoJSON decoding error.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Configuration file could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl TileCoverError {
    pub(crate) fn invalid_bounds(
        (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
        reason: impl Into<String>,
    ) -> Self {
        TileCoverError::InvalidBounds {
            min_x,
            min_y,
            max_x,
            max_y,
            reason: reason.into(),
        }
    }
}

/// Error reported by a coverage renderer.
///
/// Never aborts a query; the engine logs it and carries on.
#[derive(Debug, Error)]
pub enum RenderError {
    /// I/O error writing the rendered output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Renderer-specific failure.
    #[error("{0}")]
    Other(String),
}
