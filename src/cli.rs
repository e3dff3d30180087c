use crate::defaults;
use crate::init::{LogFileConfig, LogFormat, LoggerConfig};
use crate::listener::ListenerConfig;
use crate::severity::Severity;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Log Level Demo - drive a remote log level listener from stdin
///
/// Each line read from stdin is sent to the listener as a level change
/// request, e.g. `{"level": "DEBUG", "duration": 30}`.
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Minimum severity written to stdout
    #[clap(short = 'l', long, default_value_t = Severity::Info, help_heading = "Logging")]
    pub log_level: Severity,

    /// Minimum severity written to the log file (requires --log-dir)
    #[clap(long, requires = "log_dir", help_heading = "Logging")]
    pub file_log_level: Option<Severity>,

    /// Directory for rotated log files
    #[clap(long, help_heading = "Logging")]
    pub log_dir: Option<PathBuf>,

    /// Log file name prefix
    #[clap(long, default_value = "log-level-demo.log", help_heading = "Logging")]
    pub log_prefix: String,

    /// Rotated log files to keep
    #[clap(long, default_value_t = defaults::MAX_LOG_FILES, help_heading = "Logging")]
    pub max_log_files: usize,

    /// Output format for every sink
    #[clap(long, value_enum, default_value_t = LogFormat::Json, help_heading = "Logging")]
    pub format: LogFormat,

    /// Subject the listener subscribes to
    #[clap(long, env = "LOG_LEVEL_LISTENER_SUBJECT", default_value = defaults::LISTENER_SUBJECT, help_heading = "Listener")]
    pub subject: String,

    /// Level restored after a temporary change
    #[clap(long, env = "FALLBACK_LOG_LEVEL", default_value_t = defaults::FALLBACK_LEVEL, help_heading = "Listener")]
    pub fallback_level: Severity,

    /// Cancel the pending reset when a newer request arrives
    #[clap(long, default_value_t = false, help_heading = "Listener")]
    pub supersede_pending: bool,

    /// How long to wait for the listener's reply
    #[clap(long, value_parser = parse_duration, default_value = "2s", help_heading = "Listener")]
    pub reply_timeout: Duration,

    /// Interval between heartbeat log bursts
    #[clap(long, value_parser = parse_interval, default_value = "10s")]
    pub heartbeat: Duration,
}

impl Args {
    /// Logging configuration for a single logger named `name`, which also
    /// receives this crate's own events.
    pub fn logger_config(&self, name: &str) -> LoggerConfig {
        let mut config = LoggerConfig::new([name], self.log_level)
            .with_format(self.format)
            .with_info_logger(name);

        if let Some(directory) = &self.log_dir {
            let file = LogFileConfig::new(directory, self.log_prefix.as_str())
                .with_max_log_files(self.max_log_files);
            config = config.with_file(self.file_log_level.unwrap_or(self.log_level), file);
        }
        config
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig::new(self.subject.as_str())
            .with_fallback_level(self.fallback_level)
            .with_supersede_pending(self.supersede_pending)
    }
}

/// Parse duration from string (e.g., "10s", "5m", "1h")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;

    let seconds = match unit {
        "ms" => num / 1000.0,
        "s" => num,
        "m" => num * 60.0,
        "h" => num * 3600.0,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Duration::try_from_secs_f64(seconds).map_err(|e| format!("Invalid duration {}: {}", s, e))
}

/// Parse a repeating interval; same syntax as [`parse_duration`] but never zero.
fn parse_interval(s: &str) -> Result<Duration, String> {
    let interval = parse_duration(s)?;
    if interval.is_zero() {
        return Err("Interval must be greater than zero".to_string());
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{FALLBACK_LEVEL_VAR, SUBJECT_VAR};

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_interval("1ms").unwrap(), Duration::from_millis(1));

        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("0.0001ms").is_ok());

        assert!(Args::try_parse_from(["log-level-demo", "--heartbeat", "0s"]).is_err());
        let args = Args::try_parse_from(["log-level-demo", "--heartbeat", "250ms"]).unwrap();
        assert_eq!(args.heartbeat, Duration::from_millis(250));
    }

    #[test]
    fn test_env_names_match_listener() {
        let command = <Args as clap::CommandFactory>::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|env| env.to_string_lossy().into_owned())
        };
        assert_eq!(env_of("subject").as_deref(), Some(SUBJECT_VAR));
        assert_eq!(env_of("fallback_level").as_deref(), Some(FALLBACK_LEVEL_VAR));
    }

    #[test]
    fn test_stdout_only_config() {
        let args = Args::try_parse_from(["log-level-demo", "--log-level", "debug"]).unwrap();
        assert_eq!(args.log_level, Severity::Debug);
        assert_eq!(args.format, LogFormat::Json);

        let config = args.logger_config("demo");
        assert_eq!(config.loggers, vec!["demo".to_string()]);
        assert_eq!(config.info_logger.as_deref(), Some("demo"));
        assert!(config.log_file.is_none());
        assert!(config.file_log_level.is_none());
    }

    #[test]
    fn test_file_config() {
        let args = Args::try_parse_from([
            "log-level-demo",
            "--log-dir",
            "/tmp/logs",
            "--file-log-level",
            "TRACE",
            "--max-log-files",
            "3",
            "--format",
            "colorized",
        ])
        .unwrap();

        let config = args.logger_config("demo");
        assert_eq!(config.file_log_level, Some(Severity::Trace));
        assert_eq!(config.format, LogFormat::Colorized);
        let file = config.log_file.unwrap();
        assert_eq!(file.directory, PathBuf::from("/tmp/logs"));
        assert_eq!(file.file_name_prefix, "log-level-demo.log");
        assert_eq!(file.max_log_files, 3);
    }

    #[test]
    fn test_file_level_requires_directory() {
        assert!(Args::try_parse_from(["log-level-demo", "--file-log-level", "DEBUG"]).is_err());
    }

    #[test]
    fn test_listener_config() {
        let args = Args::try_parse_from([
            "log-level-demo",
            "--subject",
            "levels.demo",
            "--fallback-level",
            "WARNING",
            "--supersede-pending",
        ])
        .unwrap();

        let config = args.listener_config();
        assert_eq!(config.subject, "levels.demo");
        assert_eq!(config.fallback_level, Severity::Warning);
        assert!(config.supersede_pending);
    }
}
