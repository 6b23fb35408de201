//! Cosmic Tools
//!
//! CLI tools for running cosmic signal batches.

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `info`, with `debug` for the cosmic crates.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cosmic_tools=debug,cosmic_runtime=debug"));

    fmt().with_env_filter(filter).with_target(false).init();
}
