//! Tracing subscriber: JSON lines with system-time timestamps, filtered by
//! `RUST_LOG` with a configured fallback level.

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, or `default_level` when the variable is unset or
/// does not parse.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Returns `false` when one was already set.
pub fn init(default_level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok()
}
