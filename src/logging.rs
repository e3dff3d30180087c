use crate::severity::{Severity, CRITICAL_FIELD};
use chrono::{SecondsFormat, Utc};
use colored::*;
use serde_json::{Map, Number, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::field::RecordFields;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Emit a CRITICAL event.
///
/// Expands to an ERROR event carrying a `critical = true` field, which the
/// formatters and sink filters in this crate report as CRITICAL.
///
/// ```
/// use logging_utilities::critical;
///
/// critical!("disk is full");
/// critical!(target: "app::storage", free_bytes = 0u64, "disk is full");
/// ```
#[macro_export]
macro_rules! critical {
    (target: $target:expr, $($arg:tt)+) => {
        $crate::tracing::error!(target: $target, critical = true, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::tracing::error!(critical = true, $($arg)+)
    };
}

/// A custom tracing event formatter for colorizing log output based on severity.
///
/// This formatter is designed to provide clean, user-facing output where the
/// entire log line is colored according to its severity, without any
/// extra metadata like timestamps or log levels printed.
///
/// Pair it with [`PlainFields`] so the `critical` marker is not printed.
pub struct ColorizedFormatter;

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        // Buffer the formatted fields to apply color to the entire line.
        let mut buffer = String::new();
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let colored_output = match Severity::from_metadata(event.metadata()) {
            Severity::Critical => buffer.red().bold(),
            Severity::Error => buffer.red(),
            Severity::Warning => buffer.yellow(),
            Severity::Info => buffer.white(),
            Severity::Debug => buffer.blue(),
            Severity::Trace => buffer.purple(),
        };

        writeln!(writer, "{}", colored_output)
    }
}

/// Field formatter that prints the message followed by `name=value` pairs,
/// skipping the `critical` marker.
pub struct PlainFields;

impl<'writer> FormatFields<'writer> for PlainFields {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'writer>, fields: R) -> fmt::Result {
        let mut visitor = PlainVisitor {
            writer,
            result: Ok(()),
        };
        fields.record(&mut visitor);
        visitor.result
    }
}

struct PlainVisitor<'writer> {
    writer: Writer<'writer>,
    result: fmt::Result,
}

impl<'writer> Visit for PlainVisitor<'writer> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if self.result.is_err() {
            return;
        }
        self.result = match field.name() {
            "message" => write!(self.writer, "{:?}", value),
            CRITICAL_FIELD => Ok(()),
            name => write!(self.writer, " {}={:?}", name, value),
        };
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if self.result.is_err() {
            return;
        }
        self.result = match field.name() {
            "message" => write!(self.writer, "{}", value),
            name => write!(self.writer, " {}={}", name, value),
        };
    }
}

/// JSON event formatter: one object per line.
///
/// Records carry `asctime`, `levelname`, `name` (the event target), `message`,
/// `filename` and `lineno`, plus every event field at the top level. Renames
/// are applied last; by default `levelname` becomes `severity`.
///
/// Field names are always strings in `tracing`; values that are not strings,
/// booleans or numbers are stringified through `Debug`.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    renames: Vec<(String, String)>,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self {
            renames: vec![("levelname".to_string(), "severity".to_string())],
        }
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `from` under the key `to`. Renaming the same key twice keeps the
    /// last target.
    pub fn rename_field(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        match self.renames.iter_mut().find(|(key, _)| *key == from) {
            Some(entry) => entry.1 = to,
            None => self.renames.push((from, to)),
        }
        self
    }

    /// Build the JSON record for one event.
    pub fn record(&self, event: &Event<'_>) -> Map<String, Value> {
        let metadata = event.metadata();
        let mut record = Map::new();

        event.record(&mut JsonVisitor {
            record: &mut record,
        });

        record.insert(
            "asctime".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert(
            "levelname".to_string(),
            Value::String(Severity::from_metadata(metadata).to_string()),
        );
        record.insert("name".to_string(), Value::String(metadata.target().to_string()));
        record
            .entry("message".to_string())
            .or_insert_with(|| Value::String(String::new()));
        if let Some(file) = metadata.file() {
            record.insert("filename".to_string(), Value::String(file.to_string()));
        }
        if let Some(line) = metadata.line() {
            record.insert("lineno".to_string(), Value::from(line));
        }

        for (from, to) in &self.renames {
            if let Some(value) = record.remove(from) {
                record.insert(to.clone(), value);
            }
        }
        record
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let line = serde_json::to_string(&self.record(event)).map_err(|_| fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

struct JsonVisitor<'a> {
    record: &'a mut Map<String, Value>,
}

impl JsonVisitor<'_> {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() != CRITICAL_FIELD {
            self.record.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for JsonVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.insert(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }
}
