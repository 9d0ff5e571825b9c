//! Logging initialization
//!
//! Structured logging via `tracing`, written to stderr so it never mixes
//! with scan output on stdout. The default level keeps the scan quiet;
//! `RUST_LOG` overrides it for debugging.

use anyhow::{Context, Result};
use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize the logging system.
///
/// `json` switches the stderr layer to JSON lines for machine collection.
pub fn init_logging(json: bool) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .from_env()
        .context("failed to create environment filter")?;

    let registry = Registry::default().with(env_filter);

    if json {
        let layer = fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_target(true);
        registry.with(layer).init();
    } else {
        let layer = fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(false);
        registry.with(layer).init();
    }

    Ok(())
}
