//! Exception classification.
//!
//! An `ExceptionClassifier` answers "does this record carry one of the
//! configured exception kinds?". `MessagePatterns` narrows that answer to
//! exceptions whose message matches.

use crate::domain::error_kind::{ErrorKind, ErrorKindError, ErrorKindRegistry, ExceptionKinds};
use crate::domain::record::LogRecord;
use regex::Regex;
use std::sync::Arc;

/// Error returned when a classifier cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("at least one exception kind must be configured")]
    NoExceptionKinds,
    #[error(transparent)]
    Kind(#[from] ErrorKindError),
}

/// Matches records whose exception kind is one of (or descends from) the
/// configured kinds.
#[derive(Debug, Clone)]
pub struct ExceptionClassifier {
    registry: Arc<ErrorKindRegistry>,
    kinds: Vec<ErrorKind>,
}

impl ExceptionClassifier {
    /// Resolve `kinds` against `registry`.
    ///
    /// # Errors
    /// Fails on an empty kind list or on any identifier the registry does not
    /// know, so misconfiguration surfaces when the filter is built.
    pub fn new(
        kinds: impl Into<ExceptionKinds>,
        registry: Arc<ErrorKindRegistry>,
    ) -> Result<Self, ClassifierError> {
        let kinds: ExceptionKinds = kinds.into();
        if kinds.is_empty() {
            return Err(ClassifierError::NoExceptionKinds);
        }
        let kinds = kinds
            .iter()
            .map(|name| registry.resolve(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { registry, kinds })
    }

    /// The resolved kinds, in configuration order.
    pub fn kinds(&self) -> &[ErrorKind] {
        &self.kinds
    }

    /// True iff the record carries exception info of a configured kind.
    pub fn matches(&self, record: &LogRecord) -> bool {
        match &record.exception {
            Some(info) => self
                .kinds
                .iter()
                .any(|kind| self.registry.is_a(&info.kind, kind)),
            None => false,
        }
    }
}

/// Message patterns that narrow which exceptions are suppressed.
#[derive(Debug, Clone, Default)]
pub enum MessagePatterns {
    /// No narrowing: every message matches
    #[default]
    None,
    /// Literal substrings found anywhere in the message
    Substrings(Vec<String>),
    /// Regular expressions anchored at the start of the message
    Regexes(Vec<Regex>),
}

impl MessagePatterns {
    /// Literal substring patterns. An empty list means no narrowing.
    pub fn substrings<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if patterns.is_empty() {
            MessagePatterns::None
        } else {
            MessagePatterns::Substrings(patterns)
        }
    }

    /// Regular expression patterns, matched from the start of the message.
    ///
    /// # Errors
    /// Returns the first pattern that fails to compile.
    pub fn regexes<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|pattern| Regex::new(&format!("^(?:{})", pattern.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        if compiled.is_empty() {
            Ok(MessagePatterns::None)
        } else {
            Ok(MessagePatterns::Regexes(compiled))
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, MessagePatterns::None)
    }

    /// Whether `message` matches any pattern. With no patterns, always true.
    pub fn matches(&self, message: &str) -> bool {
        match self {
            MessagePatterns::None => true,
            MessagePatterns::Substrings(patterns) => {
                patterns.iter().any(|pattern| message.contains(pattern.as_str()))
            }
            MessagePatterns::Regexes(patterns) => {
                patterns.iter().any(|pattern| pattern.is_match(message))
            }
        }
    }
}
