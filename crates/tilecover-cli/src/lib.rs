//! # tilecover-cli
//!
//! Command-line front end for `tilecover-core`: argument parsing, logging
//! setup, result formatting and the GeoJSON overlay renderer.

pub mod args;
pub mod logging;
pub mod output;
pub mod overlay;

pub use args::{Cli, ScanArg};
pub use logging::setup_logging;
pub use output::{write_result, OutputError, OutputFormat};
pub use overlay::{overlay_collection, GeoJsonOverlay};
