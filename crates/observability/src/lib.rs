//! Tracing and logging (shared setup).

/// Initialize process-wide tracing from the environment.
///
/// An unusable `STOCKFIFO_LOG_FORMAT` falls back to JSON. Safe to call
/// multiple times; subsequent calls are no-ops.
pub fn init() {
    let config = tracing::ObservabilityConfig::from_env().unwrap_or_default();
    tracing::init_with(&config);
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LogFormat, ObservabilityConfig, ObservabilityError};
