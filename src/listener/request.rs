use crate::defaults;
use crate::severity::Severity;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Why an inbound payload could not become a [`LevelChangeRequest`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// The payload is not JSON at all.
    #[error("Error when parsing JSON\n{0}")]
    MalformedPayload(#[source] serde_json::Error),

    /// The payload is JSON but not a valid request.
    #[error("1 validation error for LevelChangeRequest\n{0}")]
    Validation(String),
}

/// A request to temporarily change a log level.
///
/// Wire shape: `{"level": "DEBUG", "duration": 30}`. `level` must be one of
/// CRITICAL, ERROR, WARNING, INFO, DEBUG (case-sensitive); `duration` is in
/// seconds, must be finite and non-negative, and defaults to 60. A duration
/// of zero means the change is never reverted automatically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelChangeRequest {
    level: Severity,
    duration: Duration,
}

#[derive(Deserialize)]
struct RawRequest {
    level: String,
    #[serde(default = "default_duration_secs")]
    duration: f64,
}

fn default_duration_secs() -> f64 {
    defaults::LEVEL_CHANGE_DURATION.as_secs_f64()
}

impl LevelChangeRequest {
    /// Validate a level and a duration in seconds.
    pub fn new(level: Severity, duration_secs: f64) -> Result<Self, RequestError> {
        if !Severity::REQUESTABLE.contains(&level) {
            return Err(invalid_level(level.as_str()));
        }
        Ok(Self {
            level,
            duration: parse_duration_secs(duration_secs)?,
        })
    }

    /// Decode and validate a raw bus payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, RequestError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(RequestError::MalformedPayload)?;
        // Derived Deserialize would also accept a struct written as an array.
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(RequestError::Validation(format!(
                    "request must be a JSON object, got {}",
                    other
                )))
            }
        };
        let raw: RawRequest = serde_json::from_value(Value::Object(fields))
            .map_err(|e| RequestError::Validation(e.to_string()))?;

        let level = Severity::from_request_name(&raw.level)
            .ok_or_else(|| invalid_level(&raw.level))?;
        Ok(Self {
            level,
            duration: parse_duration_secs(raw.duration)?,
        })
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

fn invalid_level(name: &str) -> RequestError {
    RequestError::Validation(format!(
        "level\n  expected one of 'CRITICAL', 'ERROR', 'WARNING', 'INFO', 'DEBUG', got '{}'",
        name
    ))
}

fn parse_duration_secs(secs: f64) -> Result<Duration, RequestError> {
    if secs.is_nan() || secs < 0.0 {
        return Err(RequestError::Validation(format!(
            "duration\n  must be greater than or equal to 0, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| {
        RequestError::Validation(format!("duration\n  {} seconds is out of range", secs))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_requests() {
        let request = LevelChangeRequest::new(Severity::Critical, 1.0).unwrap();
        assert_eq!(request.level(), Severity::Critical);
        assert_eq!(request.duration(), Duration::from_secs(1));

        let request = LevelChangeRequest::new(Severity::Info, 0.5).unwrap();
        assert_eq!(request.duration(), Duration::from_millis(500));

        for level in Severity::REQUESTABLE {
            let payload = format!(r#"{{"level": "{}", "duration": 0}}"#, level);
            let request = LevelChangeRequest::from_slice(payload.as_bytes()).unwrap();
            assert_eq!(request.level(), level);
            assert_eq!(request.duration(), Duration::ZERO);
        }
    }

    #[test]
    fn test_duration_defaults_to_sixty_seconds() {
        let request = LevelChangeRequest::from_slice(br#"{"level": "DEBUG"}"#).unwrap();
        assert_eq!(request.duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let request =
            LevelChangeRequest::from_slice(br#"{"level": "ERROR", "duration": 2, "who": "ops"}"#)
                .unwrap();
        assert_eq!(request.level(), Severity::Error);
    }

    #[test]
    fn test_invalid_requests() {
        let bad_payloads: [&[u8]; 10] = [
            br#"{"level": "critical", "duration": 1}"#,
            br#"{"level": "CRITICAL", "duration": -1}"#,
            br#"{"level": "unknown", "duration": 1}"#,
            br#"{"level": "TRACE", "duration": 1}"#,
            br#"{"bad_field_name": "DEBUG", "duration": 1}"#,
            br#"{"level": 10}"#,
            br#"["DEBUG", 5]"#,
            br#""DEBUG""#,
            b"5",
            b"null",
        ];
        for payload in bad_payloads {
            let err = LevelChangeRequest::from_slice(payload).unwrap_err();
            assert!(matches!(err, RequestError::Validation(_)), "{:?}", err);
            assert!(err.to_string().contains("validation error"));
        }

        assert!(LevelChangeRequest::new(Severity::Trace, 1.0).is_err());
        assert!(LevelChangeRequest::new(Severity::Info, -0.1).is_err());
        assert!(LevelChangeRequest::new(Severity::Info, f64::NAN).is_err());
        assert!(LevelChangeRequest::new(Severity::Info, f64::INFINITY).is_err());
    }

    #[test]
    fn test_malformed_payload() {
        let err = LevelChangeRequest::from_slice(b"hello").unwrap_err();
        assert!(matches!(err, RequestError::MalformedPayload(_)));
        assert!(err.to_string().starts_with("Error when parsing JSON\n"));
    }
}
