//! # tilecover-core
//!
//! Finds which survey tiles of a spatial index cover an area of interest.
//!
//! The area of interest is either a bounding box (optionally buffered) or a set
//! of points whose extent is approximated by their convex hull. The query is
//! built in the input CRS (WGS 84 longitude/latitude by default), reprojected
//! into the index's own CRS, and tested against every tile footprint. Bounding
//! box queries also report how much of the box the matched tiles cover and by
//! how much they overrun it, measured in the index's linear units.
//!
//! ## Example
//!
//! ```no_run
//! use tilecover_core::{AreaOfInterest, QueryEngine, QueryParams, TileIndex};
//!
//! let index = TileIndex::open("NYC2021_LAS_Index.shp", None)?;
//! let params = QueryParams::new(AreaOfInterest::bbox(-74.1, 40.7, -73.9, 40.8));
//!
//! let result = QueryEngine::new().run(&params, &index, None)?;
//! for tile in &result.matched_tiles {
//!     println!("{}", tile);
//! }
//! if let Some(coverage) = result.coverage_percent {
//!     println!("coverage: {:.1}%", coverage);
//! }
//! # Ok::<(), tilecover_core::TileCoverError>(())
//! ```

pub mod config;
pub mod coverage;
pub mod crs;
mod error;
pub mod engine;
pub mod geometry;
pub mod index;
pub mod points;
pub mod scan;
pub mod schema;

pub use config::QueryConfig;
pub use coverage::{CoverageCalculator, CoverageStats};
pub use crs::{Crs, Reprojector, DEFAULT_INPUT_CRS};
pub use engine::{CoverageRenderer, QueryEngine, QueryParams, QueryResult};
pub use error::{RenderError, TileCoverError};
pub use geometry::{AreaOfInterest, QueryGeometry, QueryGeometryBuilder, QueryKind};
pub use index::{Feature, TileIndex, TileRecord};
pub use points::{read_points, PointColumns};
pub use scan::{ScanOutcome, ScanStrategy, TileIndexScanner};
pub use schema::{AttributeValue, FilenameField};

/// Result type for tile coverage operations.
pub type Result<T> = std::result::Result<T, TileCoverError>;
