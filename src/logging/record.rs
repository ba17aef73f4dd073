//! Log records and their persisted text form

use std::fmt;

use chrono::{DateTime, Local};

use super::level::Severity;

/// Timestamp format used at the start of every persisted line
pub const LINE_TIMESTAMP_FORMAT: &str = "%m-%d %H:%M:%S%.3f";

/// A single log call, captured just before it is queued for persistence
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// When the call was made (millisecond precision when rendered)
    pub timestamp: DateTime<Local>,
    /// Process that produced the record
    pub pid: u32,
    /// Caller-supplied tag
    pub tag: String,
    /// Severity of the call
    pub severity: Severity,
    /// Message, possibly followed by a rendered error trace
    pub message: String,
}

impl LogRecord {
    /// Create a record stamped with the current time and process id
    pub fn new(severity: Severity, tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at(Local::now(), std::process::id(), severity, tag, message)
    }

    /// Create a record with an explicit timestamp and pid
    pub fn at(
        timestamp: DateTime<Local>,
        pid: u32,
        severity: Severity,
        tag: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            pid,
            tag: tag.into(),
            severity,
            message: message.into(),
        }
    }

    /// Render to `"<MM-dd HH:mm:ss.SSS> pid=<pid> <tag>: <message>\n"`
    pub fn to_line(&self) -> LogLine {
        LogLine(format!(
            "{} pid={} {}: {}\n",
            self.timestamp.format(LINE_TIMESTAMP_FORMAT),
            self.pid,
            self.tag,
            self.message
        ))
    }
}

/// Formatted text of a record, newline terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine(String);

impl LogLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte length of the rendered line
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for LogLine {
    fn from(line: String) -> Self {
        Self(line)
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
