//! Severity levels and the labels tallies are keyed by.
//!
//! `tracing` only knows five levels. Severities are numeric so that CRITICAL
//! and application-defined levels can be expressed through a `severity` event
//! field, and so that ranges can be compared by plain ordering.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use tracing::Level;

/// Numeric, ordered log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Severity(u32);

impl Severity {
    pub const NOTSET: Severity = Severity(0);
    pub const TRACE: Severity = Severity(5);
    pub const DEBUG: Severity = Severity(10);
    pub const INFO: Severity = Severity(20);
    pub const WARNING: Severity = Severity(30);
    pub const ERROR: Severity = Severity(40);
    pub const CRITICAL: Severity = Severity(50);

    /// Create a severity from its numeric value.
    pub const fn new(value: u32) -> Self {
        Severity(value)
    }

    /// The numeric value of this severity.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Map a `tracing` level onto the numeric scale.
    pub fn from_level(level: &Level) -> Self {
        match *level {
            Level::TRACE => Severity::TRACE,
            Level::DEBUG => Severity::DEBUG,
            Level::INFO => Severity::INFO,
            Level::WARN => Severity::WARNING,
            Level::ERROR => Severity::ERROR,
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        Severity::from_level(&level)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SeverityLabel::for_severity(*self))
    }
}

/// Error returned when a severity name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid log level '{0}'")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    /// Accepts standard names (case-insensitive, `WARN` and `FATAL` included)
    /// or a plain number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let severity = match trimmed.to_ascii_uppercase().as_str() {
            "NOTSET" => Severity::NOTSET,
            "TRACE" => Severity::TRACE,
            "DEBUG" => Severity::DEBUG,
            "INFO" => Severity::INFO,
            "WARN" | "WARNING" => Severity::WARNING,
            "ERROR" => Severity::ERROR,
            "CRITICAL" | "FATAL" => Severity::CRITICAL,
            other => other
                .parse::<u32>()
                .map(Severity)
                .map_err(|_| ParseSeverityError(trimmed.to_string()))?,
        };
        Ok(severity)
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u32),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Severity(n)),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Label a tallied record is counted under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeverityLabel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    /// Severity 50. Dumps have always named it FATAL, so rules written as
    /// `FATAL` or `CRITICAL` both resolve here.
    Fatal,
    /// An ERROR record that carries exception info.
    Exception,
    /// Any severity outside the standard set.
    Level(u32),
}

impl SeverityLabel {
    /// Label for a bare severity.
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::TRACE => SeverityLabel::Trace,
            Severity::DEBUG => SeverityLabel::Debug,
            Severity::INFO => SeverityLabel::Info,
            Severity::WARNING => SeverityLabel::Warning,
            Severity::ERROR => SeverityLabel::Error,
            Severity::CRITICAL => SeverityLabel::Fatal,
            Severity(other) => SeverityLabel::Level(other),
        }
    }

    /// Label for a record: ERROR with exception info is tallied as EXCEPTION.
    pub fn for_record(severity: Severity, has_exception: bool) -> Self {
        match Self::for_severity(severity) {
            SeverityLabel::Error if has_exception => SeverityLabel::Exception,
            label => label,
        }
    }
}

impl fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityLabel::Trace => f.write_str("TRACE"),
            SeverityLabel::Debug => f.write_str("DEBUG"),
            SeverityLabel::Info => f.write_str("INFO"),
            SeverityLabel::Warning => f.write_str("WARNING"),
            SeverityLabel::Error => f.write_str("ERROR"),
            SeverityLabel::Fatal => f.write_str("FATAL"),
            SeverityLabel::Exception => f.write_str("EXCEPTION"),
            SeverityLabel::Level(n) => write!(f, "LEVEL{}", n),
        }
    }
}

impl FromStr for SeverityLabel {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        if upper == "EXCEPTION" {
            return Ok(SeverityLabel::Exception);
        }
        if let Some(number) = upper.strip_prefix("LEVEL") {
            let value = number
                .parse::<u32>()
                .map_err(|_| ParseSeverityError(s.trim().to_string()))?;
            return Ok(SeverityLabel::for_severity(Severity(value)));
        }
        // Bare numbers are levels, not labels.
        if upper.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseSeverityError(s.trim().to_string()));
        }
        upper.parse::<Severity>().map(SeverityLabel::for_severity)
    }
}
