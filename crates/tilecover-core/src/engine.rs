//! Query orchestration.
//!
//! A query runs four stages in order, each returning early on error:
//! 1. build the query geometry in the input CRS
//! 2. reproject it into the index CRS
//! 3. scan the index for intersecting footprints
//! 4. measure coverage (bbox queries only)
//!
//! Zero matches is a normal outcome. Rendering is optional and declared by
//! the caller; a failing renderer is logged and otherwise ignored.

use crate::config::QueryConfig;
use crate::coverage::CoverageCalculator;
use crate::crs::{Crs, Reprojector, DEFAULT_INPUT_CRS};
use crate::error::RenderError;
use crate::geometry::{AreaOfInterest, QueryGeometry, QueryGeometryBuilder, QueryKind};
use crate::index::TileIndex;
use crate::scan::TileIndexScanner;
use crate::Result;
use geo::MultiPolygon;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Parameters of a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    /// Area of interest.
    pub area: AreaOfInterest,
    /// CRS identifier of the area's coordinates.
    pub input_crs: String,
}

impl QueryParams {
    /// Query parameters in the default geographic input CRS.
    pub fn new(area: AreaOfInterest) -> Self {
        Self {
            area,
            input_crs: DEFAULT_INPUT_CRS.to_string(),
        }
    }

    /// Use a different input CRS.
    pub fn with_input_crs(mut self, crs: impl Into<String>) -> Self {
        self.input_crs = crs.into();
        self
    }
}

/// Outcome of a query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Distinct matched tile filenames, sorted lexicographically.
    pub matched_tiles: BTreeSet<String>,
    /// Footprints of every matching record, in index order.
    #[serde(skip)]
    pub matched_geometries: Vec<MultiPolygon<f64>>,
    /// Query geometry in the index CRS.
    #[serde(skip)]
    pub query_geometry: QueryGeometry,
    /// How the query geometry was derived.
    pub query_kind: QueryKind,
    /// CRS the areas are measured in.
    pub index_crs: String,
    /// Number of records in the index.
    pub total_tiles_in_index: usize,
    /// Query area in index CRS units squared.
    pub query_area: f64,
    /// Area of the union of matched footprints in index CRS units squared.
    pub matched_area: f64,
    /// Matched union area as a percentage of the query area (bbox only).
    pub coverage_percent: Option<f64>,
    /// `coverage_percent - 100` (bbox only).
    pub overrun_percent: Option<f64>,
    /// Distinct matched tiles as a percentage of the index size.
    pub percent_of_index_used: f64,
}

impl QueryResult {
    /// Whether no tile matched.
    pub fn is_empty(&self) -> bool {
        self.matched_tiles.is_empty()
    }
}

/// Something that can draw or export a finished query.
///
/// Passing one to [`QueryEngine::run`] declares that rendering is available.
pub trait CoverageRenderer {
    /// Render the result.
    fn render(&self, result: &QueryResult) -> std::result::Result<(), RenderError>;
}

/// Runs coverage queries against a tile index.
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    builder: QueryGeometryBuilder,
    scanner: TileIndexScanner,
    calculator: CoverageCalculator,
}

impl QueryEngine {
    /// Engine with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine configured from a [`QueryConfig`].
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            builder: QueryGeometryBuilder::new()
                .with_point_radius(config.point_radius)
                .with_quadrant_segments(config.quadrant_segments),
            scanner: TileIndexScanner::new(config.scan).with_chunk_size(config.parallel_chunk_size),
            calculator: CoverageCalculator::new(),
        }
    }

    /// Run a query.
    ///
    /// `renderer` is the caller's declaration of rendering capability; `None`
    /// skips rendering entirely.
    pub fn run(
        &self,
        params: &QueryParams,
        index: &TileIndex,
        renderer: Option<&dyn CoverageRenderer>,
    ) -> Result<QueryResult> {
        let input_crs = Crs::resolve(&params.input_crs)?;
        let query = self.builder.build(&params.area, &input_crs)?;

        let reprojector = Reprojector::new(&input_crs, index.crs());
        let projected = if reprojector.is_identity() {
            query
        } else {
            let projected = query.with_shape(reprojector.project(&query.shape)?);
            debug!(
                from = input_crs.id(),
                to = index.crs().id(),
                area = projected.area(),
                "Reprojected query geometry"
            );
            projected
        };

        let outcome = self.scanner.scan(index.records(), &projected.shape);

        let matched_tiles: BTreeSet<String> = outcome
            .matches
            .iter()
            .map(|r| r.filename.clone())
            .collect();
        let matched_geometries: Vec<MultiPolygon<f64>> = outcome
            .matches
            .iter()
            .map(|r| r.footprint.clone())
            .collect();

        let query_area = projected.area();
        let (matched_area, coverage) = if projected.is_bbox() {
            let (area, stats) = self.calculator.compute(query_area, &matched_geometries);
            (area, Some(stats))
        } else {
            (self.calculator.union_area(&matched_geometries), None)
        };

        let total_tiles_in_index = index.len();
        let percent_of_index_used = if total_tiles_in_index == 0 {
            0.0
        } else {
            matched_tiles.len() as f64 / total_tiles_in_index as f64 * 100.0
        };

        let result = QueryResult {
            matched_tiles,
            matched_geometries,
            query_kind: projected.kind,
            query_geometry: projected,
            index_crs: index.crs().id().to_string(),
            total_tiles_in_index,
            query_area,
            matched_area,
            coverage_percent: coverage.map(|c| c.coverage_percent),
            overrun_percent: coverage.map(|c| c.overrun_percent),
            percent_of_index_used,
        };

        info!(
            kind = ?result.query_kind,
            matched = result.matched_tiles.len(),
            records_matched = outcome.matches.len(),
            total = result.total_tiles_in_index,
            coverage = ?result.coverage_percent,
            "Query complete"
        );

        if let Some(renderer) = renderer {
            if let Err(e) = renderer.render(&result) {
                warn!("Rendering failed, continuing without it: {}", e);
            }
        }

        Ok(result)
    }
}
