//! # Logging Utilities Library
//!
//! Shared logging building blocks for async services built on `tracing`.
//!
//! ## Features
//!
//! - **JSON formatting**: one JSON object per line with timestamp, severity,
//!   logger name, message, source location and any structured fields
//! - **Multi-logger initialization**: several named loggers, each with a
//!   stdout sink and an optional rotating file sink, configured in one call
//! - **Extra severities**: TRACE below DEBUG and CRITICAL above ERROR
//! - **No root logging**: events that no configured logger covers are dropped
//!   instead of falling through to an implicit default
//! - **Slow poll monitoring**: warn when a task blocks the async runtime
//! - **Remote level control**: temporarily change a logger's verbosity over a
//!   publish/subscribe bus, with automatic reversion
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use logging_utilities::{critical, init_loggers, LoggerConfig, Severity};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LoggerConfig::new(["my_service"], Severity::Info)
//!         .with_info_logger("my_service");
//!     let _handles = init_loggers(&config)?;
//!
//!     info!(target: "my_service", user_id = 42, "Service started");
//!     critical!(target: "my_service", "Out of disk space");
//!     Ok(())
//! }
//! ```

/// Severity scale and runtime-adjustable thresholds
///
/// Defines the six severities (TRACE through CRITICAL) with their numeric
/// values and the shared [`Threshold`] cell every sink filters on.
pub mod severity;

/// Event formatters
///
/// The JSON line formatter, the colorized console formatter and the
/// [`critical!`] macro.
pub mod logging;

/// Logger configuration and subscriber installation
///
/// Builds the per-logger stdout and file sinks, installs the subscriber and
/// hands back [`Logger`] handles for runtime level changes.
pub mod init;

/// Detection of futures that block the async runtime
pub mod slow_poll;

/// Remote log level control over a publish/subscribe bus
///
/// Contains the [`MessageBus`] transport abstraction, the in-process
/// [`InMemoryBus`], request validation and the listener that applies and
/// reverts level changes.
pub mod listener;

/// Command-line interface for the demo binary
pub mod cli;

#[cfg(test)]
mod test_support;

// Used by the exported `critical!` macro.
#[doc(hidden)]
pub use tracing;

pub use init::{
    build_subscriber, init_loggers, InitError, LogFileConfig, LogFormat, Logger, LoggerConfig,
    LoggingHandles, Sink,
};
pub use listener::{
    BusLevelListener, InMemoryBus, LevelChangeRequest, LevelListener, ListenerConfig,
    MessageBus,
};
pub use logging::{ColorizedFormatter, JsonFormatter};
pub use severity::{Severity, Threshold};
pub use slow_poll::{spawn_monitored, LogSlowPolls, SlowPollExt, SlowPollThresholds};

/// The current version of the logging utilities
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use crate::severity::Severity;
    use std::time::Duration;

    /// How long a level change lasts when the request does not say
    pub const LEVEL_CHANGE_DURATION: Duration = Duration::from_secs(60);

    /// Level restored after a temporary change
    pub const FALLBACK_LEVEL: Severity = Severity::Info;

    /// Subject the demo listener subscribes to
    pub const LISTENER_SUBJECT: &str = "log-level";

    /// Name of the sink writing to standard output
    pub const STDOUT_SINK_NAME: &str = "stdout";

    /// Name of the sink writing to the log file
    pub const FILE_SINK_NAME: &str = "file";

    /// Rotated log files kept on disk
    pub const MAX_LOG_FILES: usize = 25;

    /// A single poll longer than this is logged at INFO
    pub const SLOW_POLL_THRESHOLD: Duration = Duration::from_millis(150);

    /// A single poll longer than this is logged at WARNING
    pub const VERY_SLOW_POLL_THRESHOLD: Duration = Duration::from_millis(500);

    /// Buffered messages per bus subscription
    ///
    /// Publishers wait once a subscriber falls this far behind.
    pub const SUBSCRIPTION_CAPACITY: usize = 1000;
}
