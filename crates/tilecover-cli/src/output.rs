//! Result writers: plain text, JSON and CSV.

use clap::ValueEnum;
use std::io::Write;
use thiserror::Error;
use tilecover_core::{QueryKind, QueryResult};

/// Errors writing a result.
#[derive(Debug, Error)]
pub enum OutputError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Output format for the tile list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable list with statistics.
    #[default]
    Text,
    /// The full result as a JSON object.
    Json,
    /// One tile filename per row.
    Csv,
}

/// Write `result` in the chosen format.
pub fn write_result<W: Write>(writer: &mut W, result: &QueryResult, format: OutputFormat) -> Result<(), OutputError> {
    match format {
        OutputFormat::Text => write_text(writer, result)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, result)?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => write_csv(writer, result)?,
    }
    writer.flush()?;
    Ok(())
}

fn write_text<W: Write>(w: &mut W, result: &QueryResult) -> std::io::Result<()> {
    if result.matched_tiles.is_empty() {
        let what = match result.query_kind {
            QueryKind::Bbox => "bounding box",
            QueryKind::Path => "path",
            QueryKind::Point => "point",
        };
        writeln!(w, "No tiles overlap the specified {}.", what)?;
    } else {
        writeln!(w, "Tiles covering your area:")?;
        for tile in &result.matched_tiles {
            writeln!(w, "  - {}", tile)?;
        }
    }

    writeln!(w)?;
    writeln!(
        w,
        "Matched {} of {} tiles ({:.2}% of index)",
        result.matched_tiles.len(),
        result.total_tiles_in_index,
        result.percent_of_index_used
    )?;
    writeln!(w, "Query area:   {:.2} ({} units²)", result.query_area, result.index_crs)?;
    writeln!(w, "Matched area: {:.2} ({} units²)", result.matched_area, result.index_crs)?;
    if let (Some(coverage), Some(overrun)) = (result.coverage_percent, result.overrun_percent) {
        writeln!(w, "Coverage:     {:.2}% (overrun {:+.2}%)", coverage, overrun)?;
    }
    Ok(())
}

fn write_csv<W: Write>(w: &mut W, result: &QueryResult) -> Result<(), OutputError> {
    let mut csv = csv::Writer::from_writer(w);
    csv.write_record(["filename"])?;
    for tile in &result.matched_tiles {
        csv.write_record([tile])?;
    }
    csv.flush()?;
    Ok(())
}
