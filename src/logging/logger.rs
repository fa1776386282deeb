use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::error::FrameworkError;

/// Application log severities, most severe first.
///
/// The numeric codes (8 for emergency down to 1 for debug) are stable and are
/// accepted wherever a level can be given as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug = 1,
    Info = 2,
    Notice = 3,
    Warning = 4,
    Error = 5,
    Critical = 6,
    Alert = 7,
    Emergency = 8,
}

impl LogLevel {
    pub const ALL: [LogLevel; 8] = [
        LogLevel::Emergency,
        LogLevel::Alert,
        LogLevel::Critical,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Notice,
        LogLevel::Info,
        LogLevel::Debug,
    ];

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Emergency => "EMERGENCY",
            LogLevel::Alert => "ALERT",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Notice => "NOTICE",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FrameworkError::InvalidLogLevel {
                level: s.to_string(),
            })
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = FrameworkError;

    fn try_from(code: u8) -> Result<Self, FrameworkError> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.code() == code)
            .ok_or_else(|| FrameworkError::InvalidLogLevel {
                level: code.to_string(),
            })
    }
}

/// Sink for formatted application log lines.
pub trait LogWriter: Send + Sync {
    fn write(&self, level: LogLevel, message: &str);
}

/// Forwards records to `tracing`, which decides format and destination.
pub struct TracingWriter;

impl LogWriter for TracingWriter {
    fn write(&self, level: LogLevel, message: &str) {
        let severity = level.as_str();
        match level {
            LogLevel::Emergency | LogLevel::Alert | LogLevel::Critical | LogLevel::Error => {
                tracing::error!(severity, "{}", message);
            }
            LogLevel::Warning => tracing::warn!(severity, "{}", message),
            LogLevel::Notice | LogLevel::Info => tracing::info!(severity, "{}", message),
            LogLevel::Debug => tracing::debug!(severity, "{}", message),
        }
    }
}

/// The `logger` service.
///
/// Messages may contain `{key}` placeholders that are filled from a JSON object
/// context. An `exception` entry in the context is appended to the message as
/// ` - <value>` instead of being interpolated. Logging never fails the caller.
pub struct Logger {
    writer: Arc<dyn LogWriter>,
    enabled: AtomicBool,
}

impl Logger {
    #[must_use]
    pub fn new(writer: Arc<dyn LogWriter>) -> Self {
        Self {
            writer,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Write one record. Returns `false` when the logger is disabled.
    pub fn log(&self, level: LogLevel, message: &str, context: &Value) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut message = message.to_string();
        if let Value::Object(map) = context {
            if let Some(exception) = map.get("exception") {
                message.push_str(" - ");
                message.push_str(&display_value(exception));
            }
            message = interpolate(&message, context);
        }
        self.writer.write(level, &message);
        true
    }

    /// Same as [`Logger::log`] with the level given by name (`"warning"`, `"INFO"`...).
    pub fn log_named(&self, level: &str, message: &str, context: &Value) -> Result<bool, FrameworkError> {
        let level: LogLevel = level.parse()?;
        Ok(self.log(level, message, context))
    }

    pub fn emergency(&self, message: &str, context: &Value) -> bool {
        self.log(LogLevel::Emergency, message, context)
    }

    pub fn alert(&self, message: &str, context: &Value) -> bool {
        self.log(LogLevel::Alert, message, context)
    }

    pub fn critical(&self, message: &str, context: &Value) -> bool {
        self.log(LogLevel::Critical, message, context)
    }

    pub fn error(&self, message: &str, context: &Value) -> bool {
        self.log(LogLevel::Error, message, context)
    }

    pub fn warning(&self, message: &str, context: &Value) -> bool {
        self.log(LogLevel::Warning, message, context)
    }

    pub fn notice(&self, message: &str, context: &Value) -> bool {
        self.log(LogLevel::Notice, message, context)
    }

    pub fn info(&self, message: &str, context: &Value) -> bool {
        self.log(LogLevel::Info, message, context)
    }

    pub fn debug(&self, message: &str, context: &Value) -> bool {
        self.log(LogLevel::Debug, message, context)
    }
}

/// Replace `{key}` placeholders with values from a JSON object.
///
/// Unknown placeholders are left untouched; the `exception` key is never
/// interpolated.
#[must_use]
pub fn interpolate(message: &str, context: &Value) -> String {
    let Value::Object(map) = context else {
        return message.to_string();
    };
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        match tail.find('}') {
            Some(close) => {
                let key = &tail[..close];
                match map.get(key).filter(|_| key != "exception") {
                    Some(value) => out.push_str(&display_value(value)),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &tail[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(LogLevel, String)>>);

    impl LogWriter for Capture {
        fn write(&self, level: LogLevel, message: &str) {
            self.0.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[test]
    fn test_level_parse_and_codes() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("EMERGENCY".parse::<LogLevel>().unwrap(), LogLevel::Emergency);
        assert_eq!(LogLevel::try_from(1).unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::Emergency.code(), 8);
        assert!(matches!(
            "loud".parse::<LogLevel>(),
            Err(FrameworkError::InvalidLogLevel { .. })
        ));
        assert!(LogLevel::try_from(9).is_err());
    }

    #[test]
    fn test_interpolate_placeholders() {
        let ctx = json!({ "user": "ada", "count": 3, "missing": null });
        assert_eq!(
            interpolate("{user} posted {count} times{missing}", &ctx),
            "ada posted 3 times"
        );
        assert_eq!(interpolate("{unknown} stays", &ctx), "{unknown} stays");
        assert_eq!(interpolate("dangling {brace", &ctx), "dangling {brace");
        assert_eq!(interpolate("no context {user}", &Value::Null), "no context {user}");
    }

    #[test]
    fn test_exception_is_appended() {
        let capture = Arc::new(Capture::default());
        let logger = Logger::new(capture.clone());
        logger.error("save failed for {id}", &json!({ "id": 7, "exception": "disk full" }));
        let logged = capture.0.lock().unwrap();
        assert_eq!(logged[0], (LogLevel::Error, "save failed for 7 - disk full".to_string()));
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let capture = Arc::new(Capture::default());
        let logger = Logger::new(capture.clone());
        logger.set_enabled(false);
        assert!(!logger.info("quiet", &Value::Null));
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_log_named_rejects_unknown_level() {
        let logger = Logger::new(Arc::new(TracingWriter));
        assert!(logger.log_named("notice", "hello", &Value::Null).unwrap());
        assert!(logger.log_named("verbose", "hello", &Value::Null).is_err());
    }
}
