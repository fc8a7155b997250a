//! tilecover: list the survey tiles that cover a bounding box or a point path.

use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter};
use std::process::ExitCode;
use thiserror::Error;
use tilecover_cli::{setup_logging, write_result, Cli, GeoJsonOverlay, OutputError};
use tilecover_core::{CoverageRenderer, QueryEngine, QueryParams, TileCoverError, TileIndex};
use tracing::{error, info};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Query(#[from] TileCoverError),

    #[error("failed to write output: {0}")]
    Output(#[from] OutputError),

    #[error("failed to create {path}: {source}")]
    CreateOutput { path: String, source: io::Error },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.query_config()?;
    let index = TileIndex::open(&cli.index, config.index_crs.as_deref())?;
    let area = cli.area_of_interest()?;

    let params = QueryParams::new(area).with_input_crs(config.input_crs.clone());
    let engine = QueryEngine::from_config(&config);

    let overlay = cli.overlay_path().map(GeoJsonOverlay::new);
    let renderer = overlay.as_ref().map(|o| o as &dyn CoverageRenderer);

    let result = engine.run(&params, &index, renderer)?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path).map_err(|source| AppError::CreateOutput {
                path: path.display().to_string(),
                source,
            })?;
            write_result(&mut BufWriter::new(file), &result, cli.format)?;
            info!("Wrote {} tiles to {}", result.matched_tiles.len(), path.display());
        }
        None => write_result(&mut io::stdout().lock(), &result, cli.format)?,
    }
    Ok(())
}
