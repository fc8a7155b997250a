//! Tile index scanning.
//!
//! Every record's footprint is tested against the query geometry (already in
//! the index CRS). Touching boundaries count as intersecting. A bounding
//! rectangle check rejects far-away tiles before the exact test; it never
//! changes which tiles match.

use crate::index::TileRecord;
use geo::{BoundingRect, Geometry, Intersects, Rect};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of records per parallel partition.
pub const DEFAULT_PARALLEL_CHUNK_SIZE: usize = 1024;

/// How the scan walks the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    /// Single pass over all records.
    #[default]
    Linear,
    /// Disjoint partitions scanned on the rayon pool, merged in order.
    Parallel,
}

/// Result of a scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome<'a> {
    /// Matching records, in index order.
    pub matches: Vec<&'a TileRecord>,
    /// Number of records examined.
    pub seen: usize,
}

/// Tests tile footprints against a query geometry.
#[derive(Debug, Clone, Copy)]
pub struct TileIndexScanner {
    strategy: ScanStrategy,
    chunk_size: usize,
}

impl Default for TileIndexScanner {
    fn default() -> Self {
        Self::new(ScanStrategy::Linear)
    }
}

impl TileIndexScanner {
    /// Create a scanner with the given strategy.
    pub fn new(strategy: ScanStrategy) -> Self {
        Self {
            strategy,
            chunk_size: DEFAULT_PARALLEL_CHUNK_SIZE,
        }
    }

    /// Set the partition size used by [`ScanStrategy::Parallel`].
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Strategy in use.
    pub fn strategy(&self) -> ScanStrategy {
        self.strategy
    }

    /// Return the records whose footprint intersects `query`.
    pub fn scan<'a>(&self, records: &'a [TileRecord], query: &Geometry<f64>) -> ScanOutcome<'a> {
        let envelope = query.bounding_rect();

        let matches: Vec<&'a TileRecord> = match self.strategy {
            ScanStrategy::Linear => records
                .iter()
                .filter(|r| footprint_intersects(r, query, envelope.as_ref()))
                .collect(),
            ScanStrategy::Parallel => records
                .par_chunks(self.chunk_size)
                .map(|chunk| {
                    chunk
                        .iter()
                        .filter(|r| footprint_intersects(r, query, envelope.as_ref()))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect(),
        };

        debug!(
            strategy = ?self.strategy(),
            seen = records.len(),
            matched = matches.len(),
            "Scanned tile index"
        );

        ScanOutcome {
            matches,
            seen: records.len(),
        }
    }
}

fn footprint_intersects(record: &TileRecord, query: &Geometry<f64>, envelope: Option<&Rect<f64>>) -> bool {
    if let (Some(envelope), Some(bounds)) = (envelope, record.footprint.bounding_rect()) {
        if !envelope.intersects(&bounds) {
            return false;
        }
    }
    query.intersects(&record.footprint)
}
