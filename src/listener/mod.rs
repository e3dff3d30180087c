//! # Remote Log Level Control
//!
//! Temporarily change a logger's verbosity from outside the process:
//!
//! 1. A [`BusLevelListener`] subscribes to a subject on a [`MessageBus`].
//! 2. Each payload is validated into a [`LevelChangeRequest`].
//! 3. The [`LevelListener`] sets the target threshold and schedules a
//!    reversion to the configured fallback level.
//! 4. If the message has a reply subject, the outcome is published there.
//!
//! The target is the logger's `stdout` sink when it has one, otherwise the
//! logger's own threshold.
//!
//! ## Overlapping requests
//!
//! By default reversion timers are never cancelled. When two requests overlap,
//! both timers fire and whichever fires last decides the final level, even if
//! a newer request asked for something else. Set
//! [`ListenerConfig::supersede_pending`] to abort the pending reversion
//! whenever a new request arrives instead.

mod bus;
mod bus_listener;
mod memory_bus;
mod request;

pub use bus::{BusError, BusMessage, MessageBus, Reply, Subscription};
pub use bus_listener::BusLevelListener;
pub use memory_bus::InMemoryBus;
pub use request::{LevelChangeRequest, RequestError};

use crate::defaults;
use crate::init::{Logger, Sink};
use crate::severity::{ParseSeverityError, Severity, Threshold};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Environment variable holding the fallback level.
pub const FALLBACK_LEVEL_VAR: &str = "FALLBACK_LOG_LEVEL";

/// Environment variable holding the subject to listen on.
pub const SUBJECT_VAR: &str = "LOG_LEVEL_LISTENER_SUBJECT";

/// Listener configuration. Immutable once the listener is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerConfig {
    /// Level restored when a request's duration elapses.
    pub fallback_level: Severity,
    /// Subject that receives level change requests.
    pub subject: String,
    /// Abort a pending reversion when a newer request arrives.
    pub supersede_pending: bool,
}

/// Errors raised while loading a [`ListenerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {var}: {source}")]
    InvalidLevel {
        var: &'static str,
        #[source]
        source: ParseSeverityError,
    },
}

impl ListenerConfig {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            fallback_level: defaults::FALLBACK_LEVEL,
            subject: subject.into(),
            supersede_pending: false,
        }
    }

    pub fn with_fallback_level(mut self, level: Severity) -> Self {
        self.fallback_level = level;
        self
    }

    pub fn with_supersede_pending(mut self, supersede: bool) -> Self {
        self.supersede_pending = supersede;
        self
    }

    /// Load from [`SUBJECT_VAR`] (required) and [`FALLBACK_LEVEL_VAR`]
    /// (optional, defaults to INFO).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let subject = lookup(SUBJECT_VAR)
            .filter(|subject| !subject.trim().is_empty())
            .ok_or(ConfigError::Missing(SUBJECT_VAR))?;

        let fallback_level = match lookup(FALLBACK_LEVEL_VAR) {
            Some(value) => value.parse().map_err(|source| ConfigError::InvalidLevel {
                var: FALLBACK_LEVEL_VAR,
                source,
            })?,
            None => defaults::FALLBACK_LEVEL,
        };

        Ok(Self::new(subject).with_fallback_level(fallback_level))
    }
}

/// Applies level changes to one logger and schedules their reversion.
///
/// Scheduling uses `tokio::spawn`, so [`LevelListener::set_level`] must be
/// called from within a tokio runtime.
#[derive(Debug)]
pub struct LevelListener {
    logger: Logger,
    config: ListenerConfig,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl LevelListener {
    pub fn new(logger: Logger, config: ListenerConfig) -> Self {
        Self {
            logger,
            config,
            pending: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// The threshold requests act on.
    pub fn target(&self) -> &Threshold {
        self.logger
            .sink(defaults::STDOUT_SINK_NAME)
            .map(Sink::threshold)
            .unwrap_or_else(|| self.logger.threshold())
    }

    /// Set the target level now and, for a non-zero duration, schedule a
    /// reset to the fallback level.
    pub fn set_level(&self, level: Severity, duration: Duration) {
        info!(logger = %self.logger.name(), "Setting log level to {}", level);
        let target = self.target().clone();
        target.set(level);

        if duration > Duration::ZERO {
            info!(
                logger = %self.logger.name(),
                "Log level will be reset in {} seconds",
                duration.as_secs_f64()
            );
            let reversion = tokio::spawn(reset_level(
                target,
                self.config.fallback_level,
                duration,
            ));
            self.track(Some(reversion));
        } else {
            warn!(
                logger = %self.logger.name(),
                "Log level will not be automatically reset"
            );
            self.track(None);
        }
    }

    pub fn apply(&self, request: &LevelChangeRequest) {
        self.set_level(request.level(), request.duration());
    }

    /// Validate a raw payload and apply it.
    pub fn handle_payload(&self, payload: &[u8]) -> Result<LevelChangeRequest, RequestError> {
        let request = LevelChangeRequest::from_slice(payload)?;
        self.apply(&request);
        Ok(request)
    }

    fn track(&self, reversion: Option<JoinHandle<()>>) {
        let mut pending = self.pending.lock();
        let previous = match reversion {
            Some(handle) => pending.replace(handle),
            None => pending.take(),
        };
        // Dropping a JoinHandle detaches the task; it still fires.
        if let Some(previous) = previous {
            if self.config.supersede_pending {
                previous.abort();
            }
        }
    }
}

async fn reset_level(target: Threshold, level: Severity, delay: Duration) {
    tokio::time::sleep(delay).await;
    info!("Resetting log level to {}", level);
    target.set(level);
}
