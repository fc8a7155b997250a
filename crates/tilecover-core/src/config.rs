//! Query configuration.
//!
//! Defaults can be overridden from a YAML file:
//!
//! ```yaml
//! input_crs: EPSG:4326
//! index_crs: EPSG:2263
//! point_radius: 0.001
//! quadrant_segments: 8
//! scan: parallel
//! parallel_chunk_size: 1024
//! ```

use crate::crs::DEFAULT_INPUT_CRS;
use crate::geometry::{DEFAULT_POINT_RADIUS, DEFAULT_QUADRANT_SEGMENTS};
use crate::scan::{ScanStrategy, DEFAULT_PARALLEL_CHUNK_SIZE};
use crate::{Result, TileCoverError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable settings for a query run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// CRS of the user's bbox or points.
    pub input_crs: String,
    /// CRS to assume for the index, replacing whatever it declares.
    pub index_crs: Option<String>,
    /// Radius of the disk built around a single point, in input units.
    pub point_radius: f64,
    /// Arc segments per quarter circle for buffers and disks.
    pub quadrant_segments: u32,
    /// How to walk the index.
    pub scan: ScanStrategy,
    /// Records per worker partition for parallel scans.
    pub parallel_chunk_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            input_crs: DEFAULT_INPUT_CRS.to_string(),
            index_crs: None,
            point_radius: DEFAULT_POINT_RADIUS,
            quadrant_segments: DEFAULT_QUADRANT_SEGMENTS,
            scan: ScanStrategy::Linear,
            parallel_chunk_size: DEFAULT_PARALLEL_CHUNK_SIZE,
        }
    }
}

impl QueryConfig {
    /// Parse and validate a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: QueryConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.point_radius.is_finite() && self.point_radius > 0.0) {
            return Err(TileCoverError::InvalidInput(format!(
                "point_radius must be positive, got {}",
                self.point_radius
            )));
        }
        if self.quadrant_segments == 0 {
            return Err(TileCoverError::InvalidInput(
                "quadrant_segments must be at least 1".to_string(),
            ));
        }
        if self.parallel_chunk_size == 0 {
            return Err(TileCoverError::InvalidInput(
                "parallel_chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
