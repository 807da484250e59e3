//! Tracing integration for keep/suppress policies.
//!
//! `RecordFilter` wraps a [`RecordPolicy`] as a per-layer
//! `tracing_subscriber` filter:
//!
//! ```rust
//! use tracing_tally::infrastructure::filter::ExceptionFilterBuilder;
//! use tracing_subscriber::layer::SubscriberExt;
//! use tracing_subscriber::Layer;
//!
//! let filter = ExceptionFilterBuilder::new("Io,Parse")
//!     .with_messages(["connection reset"])
//!     .build_skip_messages()
//!     .unwrap();
//!
//! let subscriber = tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer().with_filter(filter));
//! # drop(subscriber);
//! ```
//!
//! Clones of a filter share their policy (and therefore any rate-limiting
//! window) and their metrics.

use crate::application::classifier::{ExceptionClassifier, MessagePatterns};
use crate::application::limiter::RateLimiter;
use crate::application::metrics::FilterMetrics;
use crate::application::policy::{
    BuildError, OnlyException, RateLimit, RecordPolicy, SeverityRange, SkipException,
    SkipExceptionMessage, SkipExceptionMessageRateLimited,
};
use crate::application::ports::Clock;
use crate::domain::error_kind::{ErrorKindRegistry, ExceptionKinds};
use crate::domain::record::LogRecord;
use crate::domain::severity::Severity;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::visitor::record_from_event;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Filter};

/// Suppresses configured exception kinds.
pub type SkipExceptionFilter = RecordFilter<SkipException>;
/// Suppresses configured exception kinds with matching messages.
pub type SkipExceptionMessageFilter = RecordFilter<SkipExceptionMessage>;
/// Rate-limits configured exception kinds with matching messages.
pub type SkipExceptionMessageRateLimitedFilter = RecordFilter<SkipExceptionMessageRateLimited>;
/// Rate-limits every record.
pub type RateLimiterFilter = RecordFilter<RateLimit>;
/// Keeps only records carrying exception info.
pub type OnlyExceptionFilter = RecordFilter<OnlyException>;
/// Keeps records inside an inclusive severity range.
pub type SeverityRangeFilter = RecordFilter<SeverityRange>;
/// A filter whose policy is chosen at runtime, e.g. from configuration.
pub type DynRecordFilter = RecordFilter<Box<dyn RecordPolicy>>;

/// A per-layer filter applying a [`RecordPolicy`] to every event.
#[derive(Debug)]
pub struct RecordFilter<P: ?Sized> {
    metrics: FilterMetrics,
    policy: Arc<P>,
}

impl<P: ?Sized> Clone for RecordFilter<P> {
    fn clone(&self) -> Self {
        Self {
            metrics: self.metrics.clone(),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<P: RecordPolicy> RecordFilter<P> {
    pub fn new(policy: P) -> Self {
        Self {
            metrics: FilterMetrics::new(),
            policy: Arc::new(policy),
        }
    }
}

impl<P: RecordPolicy + ?Sized> RecordFilter<P> {
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Kept/suppressed counters of this filter and its clones.
    pub fn metrics(&self) -> &FilterMetrics {
        &self.metrics
    }

    /// Apply the policy to a record, counting the decision.
    pub fn keep(&self, record: &LogRecord) -> bool {
        let kept = self.policy.keep(record);
        self.metrics.record(kept);
        kept
    }
}

impl RateLimiterFilter {
    /// Keep at most `max_calls` records per trailing `period`.
    pub fn rate_limited(max_calls: usize, period: Duration) -> Self {
        Self::rate_limited_with_clock(max_calls, period, Arc::new(SystemClock::new()))
    }

    /// Like [`rate_limited`](Self::rate_limited) with a custom clock.
    pub fn rate_limited_with_clock(
        max_calls: usize,
        period: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(RateLimit::new(RateLimiter::new(max_calls, period, clock)))
    }
}

impl OnlyExceptionFilter {
    pub fn only_exceptions() -> Self {
        Self::new(OnlyException)
    }
}

impl SeverityRangeFilter {
    /// # Errors
    /// Fails when `min > max`.
    pub fn severity_range(min: Severity, max: Severity) -> Result<Self, BuildError> {
        Ok(Self::new(SeverityRange::new(min, max)?))
    }
}

impl<P, S> Filter<S> for RecordFilter<P>
where
    P: RecordPolicy + ?Sized + 'static,
    S: Subscriber,
{
    fn enabled(&self, _meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        // Decisions need the event's fields, see event_enabled
        true
    }

    fn event_enabled(&self, event: &tracing::Event<'_>, _cx: &Context<'_, S>) -> bool {
        self.keep(&record_from_event(event))
    }
}

#[derive(Debug, Clone)]
enum PatternSpec {
    Substrings(Vec<String>),
    Regexes(Vec<String>),
}

/// Builder for the exception-matching filters.
///
/// Kinds are resolved against the registry when a filter is built, so an
/// unknown kind or an invalid pattern fails there rather than at log time.
#[derive(Debug, Clone)]
pub struct ExceptionFilterBuilder {
    kinds: ExceptionKinds,
    registry: Option<Arc<ErrorKindRegistry>>,
    patterns: Option<PatternSpec>,
    clock: Option<Arc<dyn Clock>>,
}

impl ExceptionFilterBuilder {
    /// Start a builder for the given kinds (a list or a comma-separated
    /// string).
    pub fn new(kinds: impl Into<ExceptionKinds>) -> Self {
        Self {
            kinds: kinds.into(),
            registry: None,
            patterns: None,
            clock: None,
        }
    }

    /// Resolve kinds against a custom registry instead of the built-in one.
    pub fn with_registry(mut self, registry: Arc<ErrorKindRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Narrow suppression to messages containing one of `messages`.
    pub fn with_messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = Some(PatternSpec::Substrings(
            messages.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Narrow suppression to messages matching one of `patterns`, anchored
    /// at the start of the message.
    pub fn with_regex<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = Some(PatternSpec::Regexes(
            patterns.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Set a custom clock for rate limiting (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    fn classifier(&self) -> Result<ExceptionClassifier, BuildError> {
        let registry = self
            .registry
            .clone()
            .unwrap_or_else(|| Arc::new(ErrorKindRegistry::builtin()));
        Ok(ExceptionClassifier::new(self.kinds.clone(), registry)?)
    }

    fn patterns(&self) -> Result<MessagePatterns, BuildError> {
        match &self.patterns {
            None => Ok(MessagePatterns::None),
            Some(PatternSpec::Substrings(messages)) => {
                Ok(MessagePatterns::substrings(messages.iter().cloned()))
            }
            Some(PatternSpec::Regexes(patterns)) => Ok(MessagePatterns::regexes(patterns)?),
        }
    }

    /// Suppress every record of the configured kinds; message patterns are
    /// ignored.
    ///
    /// # Errors
    /// Fails on an empty or unknown kind.
    pub fn build_skip(self) -> Result<SkipExceptionFilter, BuildError> {
        Ok(RecordFilter::new(SkipException::new(self.classifier()?)))
    }

    /// Suppress records of the configured kinds whose message matches.
    ///
    /// # Errors
    /// Fails on an empty or unknown kind, or an invalid regular expression.
    pub fn build_skip_messages(self) -> Result<SkipExceptionMessageFilter, BuildError> {
        Ok(RecordFilter::new(SkipExceptionMessage::new(
            self.classifier()?,
            self.patterns()?,
        )))
    }

    /// Let matching records through at most `max_calls` times per `period`.
    ///
    /// # Errors
    /// Same as [`build_skip_messages`](Self::build_skip_messages).
    pub fn build_rate_limited(
        self,
        max_calls: usize,
        period: Duration,
    ) -> Result<SkipExceptionMessageRateLimitedFilter, BuildError> {
        let inner = SkipExceptionMessage::new(self.classifier()?, self.patterns()?);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));
        let limiter = RateLimiter::new(max_calls, period, clock);
        Ok(RecordFilter::new(SkipExceptionMessageRateLimited::new(
            inner, limiter,
        )))
    }
}
