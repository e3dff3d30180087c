//! # Slow Poll Monitor
//!
//! A future that blocks inside `poll` stalls every other task on its worker
//! thread. [`LogSlowPolls`] times each individual poll of the wrapped future
//! and logs when one runs too long:
//!
//! - longer than [`SlowPollThresholds::very_slow`]: WARNING
//! - longer than [`SlowPollThresholds::slow`]: INFO
//!
//! Time spent suspended between polls is not counted; only time spent
//! executing synchronously is.

use crate::defaults;
use crate::severity::Severity;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Poll durations above which a poll is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlowPollThresholds {
    pub slow: Duration,
    pub very_slow: Duration,
}

impl Default for SlowPollThresholds {
    fn default() -> Self {
        Self {
            slow: defaults::SLOW_POLL_THRESHOLD,
            very_slow: defaults::VERY_SLOW_POLL_THRESHOLD,
        }
    }
}

impl SlowPollThresholds {
    pub fn new(slow: Duration, very_slow: Duration) -> Self {
        Self { slow, very_slow }
    }

    /// Severity a poll of this length is reported at, if any.
    pub fn classify(&self, elapsed: Duration) -> Option<Severity> {
        if elapsed > self.very_slow {
            Some(Severity::Warning)
        } else if elapsed > self.slow {
            Some(Severity::Info)
        } else {
            None
        }
    }
}

/// Future wrapper that logs slow polls of the inner future.
pub struct LogSlowPolls<F> {
    name: String,
    thresholds: SlowPollThresholds,
    inner: Pin<Box<F>>,
}

impl<F: Future> LogSlowPolls<F> {
    pub fn new(name: impl Into<String>, thresholds: SlowPollThresholds, future: F) -> Self {
        Self {
            name: name.into(),
            thresholds,
            inner: Box::pin(future),
        }
    }

    fn report(&self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        match self.thresholds.classify(elapsed) {
            Some(Severity::Warning) => warn!(
                task_name = %self.name,
                duration = seconds,
                "Executing task {} blocked async loop for {} seconds",
                self.name,
                seconds
            ),
            Some(_) => info!(
                task_name = %self.name,
                duration = seconds,
                "Executing task {} blocked async loop for {} seconds",
                self.name,
                seconds
            ),
            None => {}
        }
    }
}

impl<F: Future> Future for LogSlowPolls<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let started = Instant::now();
        let result = self.inner.as_mut().poll(cx);
        self.report(started.elapsed());
        result
    }
}

/// Extension trait to wrap any future in [`LogSlowPolls`].
pub trait SlowPollExt: Future + Sized {
    fn log_slow_polls(
        self,
        name: impl Into<String>,
        thresholds: SlowPollThresholds,
    ) -> LogSlowPolls<Self> {
        LogSlowPolls::new(name, thresholds, self)
    }
}

impl<F: Future> SlowPollExt for F {}

/// Spawn `future` on the current tokio runtime with slow-poll logging.
pub fn spawn_monitored<F>(
    name: impl Into<String>,
    thresholds: SlowPollThresholds,
    future: F,
) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future.log_slow_polls(name, thresholds))
}
