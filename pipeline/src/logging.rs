//! Logging initialization.
//!
//! Reports print to stdout as JSON; diagnostics go to stderr through
//! `tracing` so the two streams stay separable in scripts and cron logs.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the global subscriber: `RUST_LOG` filtering (default `warn`),
/// compact format, stderr writer. Call once at process start.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
