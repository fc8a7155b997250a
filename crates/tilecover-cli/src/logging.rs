//! Logging setup for the command-line tool.
//!
//! Logs go to stderr so stdout carries only the tile list.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive for a verbosity level.
///
/// `-q` gives errors only, no flag gives warnings, `-v` info, `-vv` debug and
/// `-vvv` or more trace.
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the level chosen from the flags.
pub fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)));

    // A second call (e.g. from tests) leaves the first subscriber in place
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
