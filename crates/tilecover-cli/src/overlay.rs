//! GeoJSON overlay of a finished query.
//!
//! The overlay holds the query geometry and every matched footprint, in the
//! index CRS, so it can be dropped onto a map next to the original index.

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tilecover_core::{CoverageRenderer, QueryResult, RenderError};
use tracing::info;

/// Writes the overlay to a file.
#[derive(Debug, Clone)]
pub struct GeoJsonOverlay {
    path: PathBuf,
}

impl GeoJsonOverlay {
    /// Overlay written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Build the overlay collection for a result.
pub fn overlay_collection(result: &QueryResult) -> FeatureCollection {
    let mut features = Vec::with_capacity(result.matched_geometries.len() + 1);

    features.push(feature(
        geojson::Value::from(&result.query_geometry.shape),
        json!({ "role": "query", "kind": result.query_kind }),
    ));
    for footprint in &result.matched_geometries {
        features.push(feature(geojson::Value::from(footprint), json!({ "role": "tile" })));
    }

    // Legacy named-CRS member so GIS tools place the overlay correctly
    let mut foreign = JsonObject::new();
    foreign.insert(
        "crs".to_string(),
        json!({ "type": "name", "properties": { "name": result.index_crs } }),
    );

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign),
    }
}

fn feature(value: geojson::Value, properties: JsonValue) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(value)),
        id: None,
        properties: properties.as_object().cloned(),
        foreign_members: None,
    }
}

impl CoverageRenderer for GeoJsonOverlay {
    fn render(&self, result: &QueryResult) -> Result<(), RenderError> {
        let collection = GeoJson::FeatureCollection(overlay_collection(result));
        let mut writer = BufWriter::new(File::create(self.path())?);
        serde_json::to_writer(&mut writer, &collection).map_err(|e| RenderError::Other(e.to_string()))?;
        writer.flush()?;
        info!("Wrote overlay to {}", self.path().display());
        Ok(())
    }
}
