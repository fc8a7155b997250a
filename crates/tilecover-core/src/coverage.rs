//! Coverage statistics for bounding-box queries.
//!
//! Areas are planar and taken in the index CRS, whose units are linear
//! (feet or metres). Overlapping footprints are merged with a true polygon
//! union before measuring, so shared area is counted once.

use geo::{Area, BooleanOps, MultiPolygon};
use serde::Serialize;
use tracing::debug;

/// Coverage and overrun of a query by its matched tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageStats {
    /// Area of the matched tiles' union as a percentage of the query area.
    pub coverage_percent: f64,
    /// `coverage_percent - 100`: how far the tiles spill past the query.
    pub overrun_percent: f64,
}

impl CoverageStats {
    /// Stats for a query that matched nothing.
    pub const NONE: CoverageStats = CoverageStats {
        coverage_percent: 0.0,
        overrun_percent: -100.0,
    };

    /// Compute stats from the two areas.
    ///
    /// A zero query area yields [`CoverageStats::NONE`] rather than a division
    /// by zero.
    pub fn from_areas(query_area: f64, matched_area: f64) -> Self {
        if query_area <= 0.0 || !query_area.is_finite() {
            return Self::NONE;
        }
        let coverage_percent = (matched_area.max(0.0) / query_area) * 100.0;
        Self {
            coverage_percent,
            overrun_percent: coverage_percent - 100.0,
        }
    }
}

/// Computes union areas and coverage statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageCalculator;

impl CoverageCalculator {
    /// Create a calculator.
    pub fn new() -> Self {
        Self
    }

    /// Union of all footprints.
    ///
    /// Degenerate (zero-area) parts are skipped; they contribute nothing to
    /// the area and can upset the overlay.
    pub fn union<'a, I>(&self, footprints: I) -> MultiPolygon<f64>
    where
        I: IntoIterator<Item = &'a MultiPolygon<f64>>,
    {
        footprints
            .into_iter()
            .map(|mp| {
                MultiPolygon::new(
                    mp.0.iter()
                        .filter(|p| p.unsigned_area() > 0.0)
                        .cloned()
                        .collect(),
                )
            })
            .filter(|mp| !mp.0.is_empty())
            .fold(MultiPolygon::new(vec![]), |acc, mp| {
                if acc.0.is_empty() {
                    mp
                } else {
                    acc.union(&mp)
                }
            })
    }

    /// Area of the union of all footprints.
    pub fn union_area<'a, I>(&self, footprints: I) -> f64
    where
        I: IntoIterator<Item = &'a MultiPolygon<f64>>,
    {
        self.union(footprints).unsigned_area()
    }

    /// Coverage and overrun of `query_area` by the union of `footprints`.
    pub fn compute<'a, I>(&self, query_area: f64, footprints: I) -> (f64, CoverageStats)
    where
        I: IntoIterator<Item = &'a MultiPolygon<f64>>,
    {
        let matched_area = self.union_area(footprints);
        let stats = CoverageStats::from_areas(query_area, matched_area);
        debug!(
            query_area,
            matched_area,
            coverage = stats.coverage_percent,
            "Computed coverage"
        );
        (matched_area, stats)
    }
}
