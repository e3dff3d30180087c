//! # Logger Initialization
//!
//! Builds one `tracing-subscriber` registry that fans events out to a set of
//! named loggers. Each logger owns a stdout sink and, optionally, a file sink
//! backed by a rolling appender. Every sink is a formatting layer behind a
//! per-layer [`Filter`] that checks three things:
//!
//! 1. the event's target belongs to the logger (`app` covers `app`, `app::db`
//!    and `app.db`; the empty name covers every target),
//! 2. the logger's own [`Threshold`] lets the event through,
//! 3. the sink's [`Threshold`] lets the event through.
//!
//! Thresholds are shared cells, so the [`Logger`] and [`Sink`] handles returned
//! from initialization can raise or lower verbosity at runtime without
//! rebuilding the subscriber. This is what the log level listener mutates.
//!
//! Events whose target no logger covers are not written anywhere. There is no
//! implicit root configuration that could interleave differently formatted
//! output with the configured sinks.

use crate::defaults;
use crate::logging::{ColorizedFormatter, JsonFormatter, PlainFields};
use crate::severity::{Severity, Threshold};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, Metadata};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Filter, Layered, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

/// A type-erased sink layer.
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// The subscriber built by [`build_subscriber`].
pub type LoggingSubscriber = Layered<Vec<BoxedLayer>, Registry>;

/// Output format shared by every sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line (see [`JsonFormatter`])
    #[default]
    Json,

    /// Human-readable, whole line colored by severity
    Colorized,
}

/// Where and how the file sink writes.
#[derive(Debug, Clone)]
pub struct LogFileConfig {
    pub directory: PathBuf,
    pub file_name_prefix: String,
    pub rotation: Rotation,
    /// Rotated files kept on disk, including the active one.
    pub max_log_files: usize,
}

impl LogFileConfig {
    /// A daily-rotated file `directory/file_name_prefix.<date>`.
    pub fn new(directory: impl Into<PathBuf>, file_name_prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name_prefix: file_name_prefix.into(),
            rotation: Rotation::DAILY,
            max_log_files: defaults::MAX_LOG_FILES,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_max_log_files(mut self, max_log_files: usize) -> Self {
        self.max_log_files = max_log_files;
        self
    }

    /// Path of the active file, without the rotation suffix.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name_prefix)
    }
}

/// Configuration for [`init_loggers`].
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Logger names, matched against event targets.
    pub loggers: Vec<String>,
    /// Threshold of each logger's stdout sink.
    pub log_level: Severity,
    /// Threshold of each logger's file sink. The file sink only exists when
    /// both this and `log_file` are set.
    pub file_log_level: Option<Severity>,
    pub log_file: Option<LogFileConfig>,
    pub format: LogFormat,
    /// Logger that announces the configuration and receives this crate's own
    /// events (listener, slow-poll monitor). Must be one of `loggers`.
    pub info_logger: Option<String>,
}

impl LoggerConfig {
    pub fn new<I, S>(loggers: I, log_level: Severity) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            loggers: loggers.into_iter().map(Into::into).collect(),
            log_level,
            file_log_level: None,
            log_file: None,
            format: LogFormat::default(),
            info_logger: None,
        }
    }

    pub fn with_file(mut self, file_log_level: Severity, log_file: LogFileConfig) -> Self {
        self.file_log_level = Some(file_log_level);
        self.log_file = Some(log_file);
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_info_logger(mut self, name: impl Into<String>) -> Self {
        self.info_logger = Some(name.into());
        self
    }

    /// The file sink configuration, if file logging is fully configured.
    fn file_sink(&self) -> Option<(Severity, &LogFileConfig)> {
        match (self.file_log_level, &self.log_file) {
            (Some(level), Some(file)) => Some((level, file)),
            _ => None,
        }
    }
}

/// Errors raised while building or installing the subscriber.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to initialize rolling file appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("A global subscriber is already installed: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// A named output with its own threshold.
#[derive(Debug, Clone)]
pub struct Sink {
    name: String,
    threshold: Threshold,
}

impl Sink {
    pub fn new(name: impl Into<String>, level: Severity) -> Self {
        Self {
            name: name.into(),
            threshold: Threshold::new(level),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> &Threshold {
        &self.threshold
    }

    pub fn level(&self) -> Severity {
        self.threshold.get()
    }

    pub fn set_level(&self, level: Severity) {
        self.threshold.set(level);
    }
}

/// Handle to a named logger: its own threshold plus the sinks attached to it.
///
/// Handles are cheap to clone and all clones share thresholds. A logger can
/// only be created with a name; there is no root logger handle.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    threshold: Threshold,
    sinks: Vec<Sink>,
    adopts_internal: bool,
}

impl Logger {
    pub fn new(name: impl Into<String>, level: Severity) -> Self {
        Self {
            name: name.into(),
            threshold: Threshold::new(level),
            sinks: Vec::new(),
            adopts_internal: false,
        }
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Route this crate's own events to this logger as well.
    pub fn adopting_internal_events(mut self) -> Self {
        self.adopts_internal = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> &Threshold {
        &self.threshold
    }

    pub fn level(&self) -> Severity {
        self.threshold.get()
    }

    pub fn set_level(&self, level: Severity) {
        self.threshold.set(level);
    }

    pub fn sink(&self, name: &str) -> Option<&Sink> {
        self.sinks.iter().find(|sink| sink.name == name)
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    /// Whether events with this target belong to the logger.
    pub fn covers(&self, target: &str) -> bool {
        if self.name.is_empty() || (self.adopts_internal && is_internal_target(target)) {
            return true;
        }
        match target.strip_prefix(self.name.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with("::") || rest.starts_with('.'),
            None => false,
        }
    }
}

fn is_internal_target(target: &str) -> bool {
    const CRATE: &str = env!("CARGO_CRATE_NAME");
    target
        .strip_prefix(CRATE)
        .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
}

/// Per-layer filter for one sink of one logger.
struct SinkFilter {
    logger: Logger,
    sink: Threshold,
}

impl<S> Filter<S> for SinkFilter {
    fn enabled(&self, metadata: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        if !self.logger.covers(metadata.target()) {
            return false;
        }
        let severity = Severity::from_metadata(metadata);
        self.logger.threshold.allows(severity) && self.sink.allows(severity)
    }

    // Thresholds change at runtime, so no callsite may be cached as always
    // or never enabled.
    fn callsite_enabled(
        &self,
        _metadata: &'static Metadata<'static>,
    ) -> tracing::subscriber::Interest {
        tracing::subscriber::Interest::sometimes()
    }
}

/// Logger handles produced by initialization, plus the file writer guard.
///
/// Buffered file output is flushed when this value is dropped, so keep it
/// alive for as long as the process logs.
pub struct LoggingHandles {
    loggers: Vec<Logger>,
    _guard: Option<WorkerGuard>,
}

impl LoggingHandles {
    pub fn logger(&self, name: &str) -> Option<&Logger> {
        self.loggers.iter().find(|logger| logger.name == name)
    }

    pub fn loggers(&self) -> &[Logger] {
        &self.loggers
    }
}

impl std::fmt::Debug for LoggingHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingHandles")
            .field("loggers", &self.loggers)
            .field("file_writer", &self._guard.is_some())
            .finish()
    }
}

fn sink_layer<W>(format: LogFormat, writer: W, filter: SinkFilter) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .event_format(JsonFormatter::default())
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Colorized => tracing_subscriber::fmt::layer()
            .fmt_fields(PlainFields)
            .event_format(ColorizedFormatter)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

fn open_file_writer(file: &LogFileConfig) -> Result<(NonBlocking, WorkerGuard), InitError> {
    // The appender only creates the file, not missing parent directories.
    std::fs::create_dir_all(&file.directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(file.rotation.clone())
        .filename_prefix(file.file_name_prefix.as_str())
        .max_log_files(file.max_log_files.max(1))
        .build(&file.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Build the subscriber and logger handles without installing anything.
///
/// `stdout` is the writer used by every stdout sink; pass `std::io::stdout`
/// for the real thing or an in-memory writer in tests.
pub fn build_subscriber<W>(
    config: &LoggerConfig,
    stdout: W,
) -> Result<(LoggingSubscriber, LoggingHandles), InitError>
where
    W: for<'a> MakeWriter<'a> + Clone + Send + Sync + 'static,
{
    if config.loggers.is_empty() {
        return Err(InitError::Config("no loggers configured".to_string()));
    }
    if let Some(info_logger) = &config.info_logger {
        if !config.loggers.contains(info_logger) {
            return Err(InitError::Config(format!(
                "info logger '{}' is not one of the configured loggers",
                info_logger
            )));
        }
    }

    let file_sink = config.file_sink();
    let (file_writer, guard) = match file_sink {
        Some((_, file)) => {
            let (writer, guard) = open_file_writer(file)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // The logger threshold must not be stricter than either sink.
    let logger_level = config.log_level.most_verbose(config.file_log_level);

    let mut loggers = Vec::with_capacity(config.loggers.len());
    let mut layers: Vec<BoxedLayer> = Vec::new();

    for name in &config.loggers {
        let mut logger = Logger::new(name.as_str(), logger_level)
            .with_sink(Sink::new(defaults::STDOUT_SINK_NAME, config.log_level));
        if let Some((file_level, _)) = file_sink {
            logger = logger.with_sink(Sink::new(defaults::FILE_SINK_NAME, file_level));
        }
        if config.info_logger.as_deref() == Some(name.as_str()) {
            logger = logger.adopting_internal_events();
        }

        for sink in logger.sinks() {
            let filter = SinkFilter {
                logger: logger.clone(),
                sink: sink.threshold().clone(),
            };
            let layer = match (&file_writer, sink.name()) {
                (Some(writer), defaults::FILE_SINK_NAME) => {
                    sink_layer(config.format, writer.clone(), filter)
                }
                _ => sink_layer(config.format, stdout.clone(), filter),
            };
            layers.push(layer);
        }
        loggers.push(logger);
    }

    let subscriber = tracing_subscriber::registry().with(layers);
    Ok((
        subscriber,
        LoggingHandles {
            loggers,
            _guard: guard,
        },
    ))
}

/// Log the effective configuration through the info logger, if one is set.
///
/// Must run with the configured subscriber active.
pub fn announce(config: &LoggerConfig) {
    if config.info_logger.is_none() {
        return;
    }

    info!(log_level = %config.log_level, "Logging at level {}", config.log_level);
    match config.file_sink() {
        Some((level, file)) => info!(
            file_log_level = %level,
            rotation = ?file.rotation,
            max_log_files = file.max_log_files,
            "Logging at level {} to file {}",
            level,
            file.path().display()
        ),
        None => info!("Not logging to a file"),
    }
}

/// Configure the loggers, install the subscriber globally and announce the
/// configuration.
///
/// ## Errors
///
/// - [`InitError::Config`] for an empty logger list or an unknown info logger
/// - [`InitError::Io`] / [`InitError::Appender`] when the log file cannot be set up
/// - [`InitError::SetGlobal`] when a global subscriber already exists
pub fn init_loggers(config: &LoggerConfig) -> Result<LoggingHandles, InitError> {
    let (subscriber, handles) = build_subscriber(config, std::io::stdout)?;
    tracing::subscriber::set_global_default(subscriber)?;
    announce(config);
    Ok(handles)
}
