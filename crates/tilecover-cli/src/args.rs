//! Command-line arguments.

use crate::output::OutputFormat;
use clap::{ArgAction, ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;
use tilecover_core::{read_points, AreaOfInterest, PointColumns, QueryConfig, ScanStrategy};
use tracing::debug;

/// Scan strategy as a CLI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanArg {
    /// One pass over the index.
    Linear,
    /// Partitioned scan on all cores.
    Parallel,
}

impl From<ScanArg> for ScanStrategy {
    fn from(arg: ScanArg) -> Self {
        match arg {
            ScanArg::Linear => ScanStrategy::Linear,
            ScanArg::Parallel => ScanStrategy::Parallel,
        }
    }
}

/// Find which survey tiles of an index cover a bounding box or a set of points.
#[derive(Debug, Parser)]
#[command(name = "tilecover", version, about)]
#[command(group(ArgGroup::new("area").required(true).args(["minx", "points"])))]
pub struct Cli {
    /// Tile index (.shp with its .dbf/.prj, or .geojson).
    #[arg(long, alias = "shp", value_name = "PATH")]
    pub index: PathBuf,

    /// Query bbox minimum X (longitude).
    #[arg(long, allow_negative_numbers = true, requires_all = ["miny", "maxx", "maxy"])]
    pub minx: Option<f64>,

    /// Query bbox minimum Y (latitude).
    #[arg(long, allow_negative_numbers = true, requires = "minx")]
    pub miny: Option<f64>,

    /// Query bbox maximum X (longitude).
    #[arg(long, allow_negative_numbers = true, requires = "minx")]
    pub maxx: Option<f64>,

    /// Query bbox maximum Y (latitude).
    #[arg(long, allow_negative_numbers = true, requires = "minx")]
    pub maxy: Option<f64>,

    /// Buffer (in input CRS units) to expand the query box.
    #[arg(long, default_value_t = 0.0, requires = "minx")]
    pub buffer: f64,

    /// CSV file of points forming a path.
    #[arg(long, value_name = "CSV")]
    pub points: Option<PathBuf>,

    /// Longitude/X column of the point file (auto-detected by default).
    #[arg(long, requires = "points")]
    pub lon_col: Option<String>,

    /// Latitude/Y column of the point file (auto-detected by default).
    #[arg(long, requires = "points")]
    pub lat_col: Option<String>,

    /// CRS of the bbox or points [default: EPSG:4326].
    #[arg(long, value_name = "CRS")]
    pub input_crs: Option<String>,

    /// CRS of the tile index, overriding what the index declares.
    ///
    /// Required for shapefiles whose .prj carries no EPSG authority, such as
    /// the ESRI-style .prj files written by ArcGIS (e.g. NAD83 / New York
    /// Long Island state plane needs `--index-crs EPSG:2263`).
    #[arg(long, value_name = "CRS")]
    pub index_crs: Option<String>,

    /// YAML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Index scan strategy.
    #[arg(long, value_enum)]
    pub scan: Option<ScanArg>,

    /// Output format for the tile list.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write the tile list to a file instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write a GeoJSON overlay of the query and matched footprints.
    #[arg(long, value_name = "PATH")]
    pub overlay: Option<PathBuf>,

    /// Skip the overlay even if one was requested.
    #[arg(long)]
    pub no_plot: bool,

    /// More log output (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Effective configuration: defaults, then the config file, then flags.
    pub fn query_config(&self) -> tilecover_core::Result<QueryConfig> {
        let mut config = match &self.config {
            Some(path) => QueryConfig::load(path)?,
            None => QueryConfig::default(),
        };

        if let Some(crs) = &self.input_crs {
            config.input_crs = crs.clone();
        }
        if let Some(crs) = &self.index_crs {
            config.index_crs = Some(crs.clone());
        }
        if let Some(scan) = self.scan {
            config.scan = scan.into();
        }

        config.validate()?;
        debug!(?config, "Effective configuration");
        Ok(config)
    }

    /// The area of interest, reading the point file if one was given.
    pub fn area_of_interest(&self) -> tilecover_core::Result<AreaOfInterest> {
        if let Some(path) = &self.points {
            let columns = PointColumns {
                x: self.lon_col.clone(),
                y: self.lat_col.clone(),
            };
            return Ok(AreaOfInterest::Points(read_points(path, &columns)?));
        }

        match (self.minx, self.miny, self.maxx, self.maxy) {
            (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => Ok(AreaOfInterest::BoundingBox {
                min_x,
                min_y,
                max_x,
                max_y,
                buffer: self.buffer,
            }),
            // clap enforces the group; this only triggers for hand-built values
            _ => Err(tilecover_core::TileCoverError::InvalidInput(
                "either a complete bbox or a point file is required".to_string(),
            )),
        }
    }

    /// Whether the overlay collaborator should run.
    pub fn overlay_path(&self) -> Option<&PathBuf> {
        if self.no_plot {
            None
        } else {
            self.overlay.as_ref()
        }
    }
}
