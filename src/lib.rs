//! # tracing-tally
//!
//! Exception-aware filtering, rate limiting and severity tallies for the
//! `tracing` ecosystem.
//!
//! This crate provides:
//! - **Per-layer filters** that suppress or rate-limit noisy exception records,
//!   keep only exceptions, or keep a severity range
//! - **A counter layer** tallying records by severity, with the time each
//!   severity was last seen
//! - **Signal-triggered dumps** of those tallies to a file
//! - **A check command** (`tracing-tally check-log-dump`) that pokes a running
//!   process, reads its fresh dump and evaluates threshold rules, for use in
//!   health-check scripts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tracing_tally::{CounterLayer, DumpConfig, ExceptionFilterBuilder};
//! use tracing_subscriber::prelude::*;
//! use std::time::Duration;
//!
//! // Let at most 5 "connection reset" I/O errors through per minute
//! let noisy = ExceptionFilterBuilder::new("Io")
//!     .with_messages(["connection reset"])
//!     .build_rate_limited(5, Duration::from_secs(60))
//!     .unwrap();
//!
//! // Tally everything, and dump the tallies on SIGUSR2
//! let counter = CounterLayer::new();
//! let _dump = counter
//!     .dump_on_signal(DumpConfig::new("/run/myapp/tally.json"))
//!     .unwrap();
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer().with_filter(noisy))
//!     .with(counter)
//!     .init();
//! ```
//!
//! Then, from a health check:
//!
//! ```text
//! $ tracing-tally check-log-dump "$PID" /run/myapp/tally.json SIGUSR2 \
//!     "exception count lt 10" "any last_record gt -300"
//! ```
//!
//! ## Exceptions
//!
//! A record carries exception info when it is emitted through [`exception!`],
//! or when it records an error value on an `error` or `exception` field:
//!
//! ```rust,no_run
//! # use std::io;
//! # let err = io::Error::other("peer went away");
//! tracing_tally::exception!("ConnectionReset", err, "upstream call failed");
//!
//! // Classified under the root kind "Error"
//! tracing::error!(error = &err as &(dyn std::error::Error + 'static), "upstream call failed");
//! ```
//!
//! Kinds are names in an [`ErrorKindRegistry`], each with an optional parent.
//! Filters match a kind and all of its descendants, so `"Io"` also matches
//! `"ConnectionReset"`. Unknown kinds are rejected when the filter is built.
//!
//! ## Severities
//!
//! `tracing` levels map to numeric severities (TRACE=5, DEBUG=10, INFO=20,
//! WARN=30, ERROR=40). A numeric `severity` field overrides the level, which
//! is how CRITICAL (50) and custom levels are expressed:
//!
//! ```rust,no_run
//! tracing::error!(severity = 50, "disk full");
//! ```
//!
//! ## Dumps
//!
//! Tallies are keyed by label: `TRACE`, `DEBUG`, `INFO`, `WARNING`, `ERROR`,
//! `FATAL` (severity 50), `EXCEPTION` (an ERROR record with exception info) and
//! `LEVEL<N>` for other severities. JSON dumps look like
//!
//! ```text
//! {"count": {"ERROR": 2, "INFO": 10}, "last_record": {"ERROR": 1700000000.5, "INFO": 1700000003.25}}
//! ```
//!
//! and text dumps hold one `LABEL COUNT TIMESTAMP` line per label.
//!
//! ## Observability
//!
//! Every filter counts what it kept and suppressed:
//!
//! ```rust,no_run
//! # use tracing_tally::RateLimiterFilter;
//! # use std::time::Duration;
//! let filter = RateLimiterFilter::rate_limited(10, Duration::from_secs(600));
//! let snapshot = filter.metrics().snapshot();
//! println!("Suppression rate: {:.2}%", snapshot.suppression_rate() * 100.0);
//! ```

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

#[doc(hidden)]
pub use tracing as __tracing;

/// Log an ERROR record carrying exception info.
///
/// ```rust,no_run
/// # use std::io;
/// let err = io::Error::from(io::ErrorKind::NotFound);
/// tracing_tally::exception!("NotFound", err, "config file {} missing", "app.toml");
/// ```
///
/// The record's kind is `$kind` and its exception message is the error's
/// `Display` output.
#[macro_export]
macro_rules! exception {
    ($kind:expr, $error:expr, $($arg:tt)+) => {
        $crate::__tracing::error!(
            exception.kind = $kind,
            exception.message = $crate::__tracing::field::display(&$error),
            $($arg)+
        )
    };
}

// Re-export commonly used types for convenience
pub use domain::{
    error_kind::{ErrorKind, ErrorKindError, ErrorKindRegistry, ExceptionKinds, ROOT_KIND},
    record::{ExceptionInfo, LogRecord},
    rule::{RuleParseError, ThresholdRule},
    severity::{ParseSeverityError, Severity, SeverityLabel},
    signal::{Signal, UnknownSignalError},
    tally::{DumpFormat, DumpParseError, DumpSnapshot},
    window::RateLimitError,
};

pub use application::{
    check::{CheckError, CheckOptions, CheckOutcome, DumpChecker},
    classifier::{ExceptionClassifier, MessagePatterns},
    limiter::RateLimiter,
    metrics::{FilterMetrics, MetricsSnapshot},
    policy::{BuildError, RecordPolicy},
    ports::{Clock, Signaller},
};

pub use infrastructure::{
    clock::SystemClock,
    config::{ConfigError, FilterConfig, TallyConfig, TallySetup},
    counter::CounterLayer,
    dump::{DumpConfig, DumpError, DumpRegistration},
    filter::{
        DynRecordFilter, ExceptionFilterBuilder, OnlyExceptionFilter, RateLimiterFilter,
        RecordFilter, SeverityRangeFilter, SkipExceptionFilter, SkipExceptionMessageFilter,
        SkipExceptionMessageRateLimitedFilter,
    },
    signal::{check_dump, KillSignaller},
};
