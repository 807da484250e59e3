//! The record model filters and the counter operate on.
//!
//! A `LogRecord` is the crate's read-only view of a `tracing::Event`. It is
//! built by the infrastructure visitor so that every policy can be exercised
//! without a subscriber.

use crate::domain::severity::{Severity, SeverityLabel};

/// Exception details attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Kind identifier, resolved against an `ErrorKindRegistry` when matching
    pub kind: String,
    /// Rendered error message
    pub message: String,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// A single log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    pub exception: Option<ExceptionInfo>,
}

impl LogRecord {
    /// Create a record without exception info.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            exception: None,
        }
    }

    /// Create an ERROR record carrying exception info.
    pub fn exception(
        kind: impl Into<String>,
        error_message: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::ERROR,
            message: message.into(),
            exception: Some(ExceptionInfo::new(kind, error_message)),
        }
    }

    /// Attach exception info to this record.
    pub fn with_exception(mut self, info: ExceptionInfo) -> Self {
        self.exception = Some(info);
        self
    }

    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    /// The label this record is tallied under.
    pub fn label(&self) -> SeverityLabel {
        SeverityLabel::for_record(self.severity, self.has_exception())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_record_is_error() {
        let record = LogRecord::exception("ValueError", "bad value", "failed");
        assert_eq!(record.severity, Severity::ERROR);
        assert!(record.has_exception());
        assert_eq!(record.label(), SeverityLabel::Exception);
    }

    #[test]
    fn test_exception_on_warning_keeps_warning_label() {
        let record = LogRecord::new(Severity::WARNING, "retrying")
            .with_exception(ExceptionInfo::new("TimedOut", "deadline exceeded"));
        assert_eq!(record.label(), SeverityLabel::Warning);
    }
}
