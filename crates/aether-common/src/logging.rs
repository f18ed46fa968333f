use std::io;

use tracing_subscriber::EnvFilter;

const FALLBACK_FILTER: &str = "info";

/// Installs the global subscriber on stderr so CLI reports on stdout stay clean.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false` if a
/// subscriber was already installed.
pub fn init(log_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Parses a configured directive, falling back to `info` when it is malformed.
pub fn filter_for(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}
