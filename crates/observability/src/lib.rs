//! Process-wide tracing/logging setup.

/// Initialize tracing/logging for the process.
///
/// `default_level` applies when `RUST_LOG` is unset or invalid. Safe to call
/// multiple times; subsequent calls are no-ops.
pub fn init(default_level: &str) {
    tracing::init(default_level);
}

/// Subscriber construction (filter, JSON layer).
pub mod tracing;
