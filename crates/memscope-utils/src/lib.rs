//! # memscope Utilities
//!
//! Shared utilities and logging for memscope.
//!
//! This crate provides the logging setup used by the `memscope` binary,
//! built on `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    LogFormat, LogLevel, LogSettings, LoggingError, LoggingGuard, default_log_file, init_logging, init_logging_with_level,
    init_with,
};
pub use tracing::{debug, error, info, trace, warn};
