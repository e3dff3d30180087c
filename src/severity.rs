//! # Severity Levels and Shared Thresholds
//!
//! `tracing` ships five levels. This crate works with six: the usual five plus
//! CRITICAL above ERROR. TRACE sits below DEBUG as an ordinary variant, so no
//! runtime level registration is involved.
//!
//! CRITICAL events are ERROR events that carry a `critical` field (see the
//! [`critical!`](crate::critical) macro). The field is part of the callsite
//! metadata, so filters can tell the two apart without visiting event values.
//!
//! A [`Threshold`] is the mutable minimum severity of one sink or logger. It is
//! a shared atomic cell: every clone observes and mutates the same value, and
//! the last store wins.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Level, Metadata};

/// Name of the marker field that upgrades an ERROR event to CRITICAL.
///
/// Only the field's presence on the callsite counts, never its value, because
/// filters see metadata before any value is recorded. Any ERROR event with a
/// field named `critical` is therefore CRITICAL, `error!(critical = false, ..)`
/// included; pick another field name for unrelated data. The marker has no
/// effect on other levels, and formatters never print it.
pub const CRITICAL_FIELD: &str = "critical";

/// Log severity, ordered from most verbose (`Trace`) to least (`Critical`).
///
/// Discriminants follow the conventional numeric scale (TRACE=5 ... CRITICAL=50)
/// so that derived ordering and numeric comparison agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Severity {
    Trace = 5,
    Debug = 10,
    #[default]
    Info = 20,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

/// Error returned when a severity name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity level '{0}' (expected one of CRITICAL, ERROR, WARNING, INFO, DEBUG, TRACE)")]
pub struct ParseSeverityError(pub String);

impl Severity {
    /// Every severity, most verbose first.
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// The closed set of severities a remote level change may request.
    pub const REQUESTABLE: [Severity; 5] = [
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Info,
        Severity::Debug,
    ];

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Numeric value on the conventional scale.
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|severity| severity.value() == value)
    }

    /// Strict lookup used for remote requests: exact, case-sensitive match
    /// against [`Severity::REQUESTABLE`], which does not include TRACE.
    pub fn from_request_name(name: &str) -> Option<Self> {
        Self::REQUESTABLE
            .into_iter()
            .find(|severity| severity.as_str() == name)
    }

    /// Severity of a `tracing` callsite.
    pub fn from_metadata(metadata: &Metadata<'_>) -> Self {
        match *metadata.level() {
            Level::ERROR if metadata.fields().field(CRITICAL_FIELD).is_some() => {
                Severity::Critical
            }
            Level::ERROR => Severity::Error,
            Level::WARN => Severity::Warning,
            Level::INFO => Severity::Info,
            Level::DEBUG => Severity::Debug,
            Level::TRACE => Severity::Trace,
        }
    }

    /// Whether a threshold of `self` lets an event of `event` severity through.
    pub fn allows(self, event: Severity) -> bool {
        event >= self
    }

    /// The more verbose of two thresholds. A missing second threshold counts
    /// as CRITICAL, i.e. it never widens the first.
    pub fn most_verbose(self, other: Option<Severity>) -> Severity {
        self.min(other.unwrap_or(Severity::Critical))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient parsing for configuration surfaces (CLI flags, environment):
/// case-insensitive, and `WARN` is accepted for WARNING.
impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("WARN") {
            return Ok(Severity::Warning);
        }
        Self::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ParseSeverityError(s.to_string()))
    }
}

/// Shared, mutable minimum severity.
#[derive(Clone)]
pub struct Threshold(Arc<AtomicU8>);

impl Threshold {
    pub fn new(level: Severity) -> Self {
        Self(Arc::new(AtomicU8::new(level.value())))
    }

    pub fn get(&self) -> Severity {
        Severity::from_value(self.0.load(Ordering::SeqCst)).unwrap_or_default()
    }

    pub fn set(&self, level: Severity) {
        self.0.store(level.value(), Ordering::SeqCst);
    }

    pub fn allows(&self, event: Severity) -> bool {
        self.get().allows(event)
    }

    /// True when both handles refer to the same cell.
    pub fn same_cell(&self, other: &Threshold) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Threshold").field(&self.get()).finish()
    }
}
