//! Tracing subscriber setup shared by binaries and integration tests.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured log level. Calling this
/// twice returns an error rather than panicking, so tests can race on it.
pub fn init(config: &Config) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))
}
