//! Tracing/logging setup shared by every larder entry point.

/// Tracing configuration (format, filters).
pub mod tracing;

pub use crate::tracing::{LogConfig, LogFormat, LogFormatError};

/// Initialize process-wide logging from `LARDER_LOG_FORMAT` and `RUST_LOG`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    crate::tracing::init_with(&LogConfig::from_env());
}

/// Initialize process-wide logging from an explicit configuration.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_with(config: &LogConfig) -> bool {
    crate::tracing::init_with(config)
}
