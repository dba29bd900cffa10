//! # Session Configuration
//!
//! Tunables for a [`DebuggerSession`](crate::session::DebuggerSession).
//!
//! ## Environment Variables
//!
//! - `MEMSCOPE_POLL_INTERVAL_MS`: delay between monitor ticks (default: 100)
//! - `MEMSCOPE_POLL_TIMEOUT_MS`: timeout handed to each provider poll (default: 100)
//! - `MEMSCOPE_EVENT_CAPACITY`: events buffered per subscriber (default: 64)
//! - `MEMSCOPE_TARGET_BITS`: target pointer width, `32` or `64` (default: host)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::types::Bitness;

/// Default delay between two monitor ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default timeout passed to `poll_debug_event`.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for a debugger session
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
///
/// use memscope_core::config::SessionConfig;
/// use memscope_core::types::Bitness;
///
/// let config = SessionConfig::default()
///     .with_bitness(Bitness::X86)
///     .with_poll_interval(Duration::from_millis(10));
/// assert_eq!(config.poll_interval, Duration::from_millis(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig
{
    /// Pointer width of the target, used to size `pointer` breakpoints
    pub bitness: Bitness,
    /// Delay between monitor ticks
    pub poll_interval: Duration,
    /// Timeout handed to the provider on each tick
    pub poll_timeout: Duration,
    /// Events buffered per subscriber before the slowest one starts lagging
    pub event_capacity: usize,
}

impl Default for SessionConfig
{
    fn default() -> Self
    {
        Self {
            bitness: Bitness::host(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionConfig
{
    /// Defaults overridden by any `MEMSCOPE_*` environment variables that parse.
    #[must_use]
    pub fn from_env() -> Self
    {
        let defaults = Self::default();
        Self {
            bitness: env_var("MEMSCOPE_TARGET_BITS").unwrap_or(defaults.bitness),
            poll_interval: env_var("MEMSCOPE_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            poll_timeout: env_var("MEMSCOPE_POLL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_timeout),
            event_capacity: env_var("MEMSCOPE_EVENT_CAPACITY").unwrap_or(defaults.event_capacity),
        }
    }

    /// Set the target pointer width.
    #[must_use]
    pub const fn with_bitness(mut self, bitness: Bitness) -> Self
    {
        self.bitness = bitness;
        self
    }

    /// Set the delay between monitor ticks.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self
    {
        self.poll_interval = interval;
        self
    }

    /// Set the per-tick provider timeout.
    #[must_use]
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self
    {
        self.poll_timeout = timeout;
        self
    }

    /// Set the per-subscriber event buffer.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self
    {
        self.event_capacity = capacity;
        self
    }
}

fn env_var<T: FromStr>(name: &str) -> Option<T>
{
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}
