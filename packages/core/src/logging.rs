//! Tracing subscriber setup for the `keystash` binary.
//!
//! The library only emits events; installing a subscriber is left to the
//! binary (or to the gateway embedding the store).

use anyhow::Result;
use std::io;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `KEYSTASH_LOG=keystash=debug`.
pub const LOG_FILTER_VAR: &str = "KEYSTASH_LOG";

/// Install a global subscriber writing to stderr.
///
/// Stdout is reserved for command output so `keystash list` stays pipeable.
pub fn init(json: bool) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .with_env_var(LOG_FILTER_VAR)
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(true);

    let result = if json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.compact().try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
