//! Keep/suppress policies applied to every record.
//!
//! Each policy is a pure decision over a `LogRecord`; the infrastructure layer
//! wraps them in a `tracing_subscriber` filter.

use crate::application::classifier::{ClassifierError, ExceptionClassifier, MessagePatterns};
use crate::application::limiter::RateLimiter;
use crate::domain::record::LogRecord;
use crate::domain::severity::Severity;
use crate::domain::window::RateLimitError;
use std::fmt::Debug;
use std::sync::Arc;

/// Error returned when a policy cannot be built from its configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("invalid message pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error("empty severity range: minimum {min} is above maximum {max}")]
    EmptyRange { min: Severity, max: Severity },
}

/// Decides whether a record is kept.
pub trait RecordPolicy: Send + Sync + Debug {
    /// Return `true` to keep the record, `false` to suppress it.
    fn keep(&self, record: &LogRecord) -> bool;
}

impl<P: RecordPolicy + ?Sized> RecordPolicy for Box<P> {
    fn keep(&self, record: &LogRecord) -> bool {
        (**self).keep(record)
    }
}

impl<P: RecordPolicy + ?Sized> RecordPolicy for Arc<P> {
    fn keep(&self, record: &LogRecord) -> bool {
        (**self).keep(record)
    }
}

/// A chain keeps a record only if every policy keeps it. Evaluation stops at
/// the first policy that suppresses, so later rate limiters are not charged.
impl<P: RecordPolicy> RecordPolicy for Vec<P> {
    fn keep(&self, record: &LogRecord) -> bool {
        self.iter().all(|policy| policy.keep(record))
    }
}

/// Suppress records carrying one of the configured exception kinds.
#[derive(Debug, Clone)]
pub struct SkipException {
    classifier: ExceptionClassifier,
}

impl SkipException {
    pub fn new(classifier: ExceptionClassifier) -> Self {
        Self { classifier }
    }
}

impl RecordPolicy for SkipException {
    fn keep(&self, record: &LogRecord) -> bool {
        !self.classifier.matches(record)
    }
}

/// Suppress matching exceptions whose message matches one of the patterns.
///
/// With no patterns this behaves exactly like [`SkipException`].
#[derive(Debug, Clone)]
pub struct SkipExceptionMessage {
    classifier: ExceptionClassifier,
    patterns: MessagePatterns,
}

impl SkipExceptionMessage {
    pub fn new(classifier: ExceptionClassifier, patterns: MessagePatterns) -> Self {
        Self {
            classifier,
            patterns,
        }
    }

    fn suppresses(&self, record: &LogRecord) -> bool {
        match &record.exception {
            Some(info) if self.classifier.matches(record) => self.patterns.matches(&info.message),
            _ => false,
        }
    }
}

impl RecordPolicy for SkipExceptionMessage {
    fn keep(&self, record: &LogRecord) -> bool {
        !self.suppresses(record)
    }
}

/// Like [`SkipExceptionMessage`], but lets matching records through at a
/// limited rate instead of dropping all of them.
///
/// Only records that would otherwise be suppressed consume the quota.
#[derive(Debug, Clone)]
pub struct SkipExceptionMessageRateLimited {
    inner: SkipExceptionMessage,
    limiter: RateLimiter,
}

impl SkipExceptionMessageRateLimited {
    pub fn new(inner: SkipExceptionMessage, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

impl RecordPolicy for SkipExceptionMessageRateLimited {
    fn keep(&self, record: &LogRecord) -> bool {
        !self.inner.suppresses(record) || self.limiter.admit()
    }
}

/// Rate-limit every record regardless of content.
#[derive(Debug, Clone)]
pub struct RateLimit {
    limiter: RateLimiter,
}

impl RateLimit {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

impl RecordPolicy for RateLimit {
    fn keep(&self, _record: &LogRecord) -> bool {
        self.limiter.admit()
    }
}

/// Keep only records that carry exception info.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlyException;

impl RecordPolicy for OnlyException {
    fn keep(&self, record: &LogRecord) -> bool {
        record.has_exception()
    }
}

/// Keep records whose severity lies in an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityRange {
    min: Severity,
    max: Severity,
}

impl SeverityRange {
    /// # Errors
    /// Returns [`BuildError::EmptyRange`] when `min > max`.
    pub fn new(min: Severity, max: Severity) -> Result<Self, BuildError> {
        if min > max {
            return Err(BuildError::EmptyRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Severity {
        self.min
    }

    pub fn max(&self) -> Severity {
        self.max
    }
}

impl RecordPolicy for SeverityRange {
    fn keep(&self, record: &LogRecord) -> bool {
        (self.min..=self.max).contains(&record.severity)
    }
}
