//! Field visitor turning a `tracing::Event` into a `LogRecord`.
//!
//! Recognized fields:
//! - `message`: the formatted message
//! - `severity`: numeric (or named) severity overriding the event level
//! - `exception.kind` / `exception.message`: written by the `exception!` macro
//! - `error` / `exception`: an error value recorded through `record_error`
//!
//! Exception info is attached iff a kind or an error value is present. An
//! error value without an explicit kind is classified under the root kind.

use crate::domain::error_kind::ROOT_KIND;
use crate::domain::record::{ExceptionInfo, LogRecord};
use crate::domain::severity::Severity;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::Event;

pub(crate) const MESSAGE_FIELD: &str = "message";
pub(crate) const SEVERITY_FIELD: &str = "severity";
pub(crate) const EXCEPTION_KIND_FIELD: &str = "exception.kind";
pub(crate) const EXCEPTION_MESSAGE_FIELD: &str = "exception.message";

/// Collects the fields a `LogRecord` is built from.
#[derive(Debug, Default)]
pub(crate) struct RecordVisitor {
    message: Option<String>,
    severity: Option<Severity>,
    kind: Option<String>,
    exception_message: Option<String>,
    error: Option<String>,
}

impl RecordVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the visitor, falling back to `level` when no `severity` field
    /// was recorded.
    pub fn into_record(self, level: &tracing::Level) -> LogRecord {
        let severity = self
            .severity
            .unwrap_or_else(|| Severity::from_level(level));
        let exception = match (self.kind, self.error) {
            (None, None) => None,
            (kind, error) => Some(ExceptionInfo::new(
                kind.unwrap_or_else(|| ROOT_KIND.to_string()),
                self.exception_message.or(error).unwrap_or_default(),
            )),
        };
        LogRecord {
            severity,
            message: self.message.unwrap_or_default(),
            exception,
        }
    }

    fn record_severity(&mut self, value: u64) {
        let value = u32::try_from(value).unwrap_or(u32::MAX);
        self.severity = Some(Severity::new(value));
    }
}

impl Visit for RecordVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == SEVERITY_FIELD {
            self.record_severity(u64::try_from(value).unwrap_or(0));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == SEVERITY_FIELD {
            self.record_severity(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            MESSAGE_FIELD => self.message = Some(value.to_string()),
            EXCEPTION_KIND_FIELD => self.kind = Some(value.to_string()),
            EXCEPTION_MESSAGE_FIELD => self.exception_message = Some(value.to_string()),
            SEVERITY_FIELD => {
                if let Ok(severity) = value.parse() {
                    self.severity = Some(severity);
                }
            }
            _ => {}
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        match field.name() {
            "error" | "exception" => self.error = Some(value.to_string()),
            EXCEPTION_MESSAGE_FIELD => self.exception_message = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            MESSAGE_FIELD => self.message = Some(format!("{:?}", value)),
            EXCEPTION_KIND_FIELD => self.kind = Some(format!("{:?}", value)),
            EXCEPTION_MESSAGE_FIELD => self.exception_message = Some(format!("{:?}", value)),
            _ => {}
        }
    }
}

/// Build the record view of an event.
pub(crate) fn record_from_event(event: &Event<'_>) -> LogRecord {
    let mut visitor = RecordVisitor::new();
    event.record(&mut visitor);
    visitor.into_record(event.metadata().level())
}
