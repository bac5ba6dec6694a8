//! Logging setup
//!
//! Logs go to stderr so the text report on stdout stays clean. `RUST_LOG`
//! overrides the level chosen by `--debug`.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Default filter directive for the given verbosity
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Install the global `tracing` subscriber
pub fn init_logging(debug: bool) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}
