//! Declarative configuration.
//!
//! A `TallyConfig` describes extra exception kinds, a chain of filters and an
//! optional signal dump, and can be loaded from JSON:
//!
//! ```json
//! {
//!   "error_kinds": [{"name": "ValueError", "parent": "Error"}],
//!   "filters": [
//!     {"type": "skip_exception_message_rate_limited",
//!      "kinds": "ValueError", "messages": ["timeout"], "calls": 5, "period": 60},
//!     {"type": "severity_range", "min": "INFO", "max": "CRITICAL"}
//!   ],
//!   "dump": {"path": "/run/myapp/tally.json", "signal": "SIGUSR2", "format": "json"}
//! }
//! ```
//!
//! The filters form a chain: a record is kept only if every filter keeps it.

use crate::application::classifier::{ExceptionClassifier, MessagePatterns};
use crate::application::limiter::RateLimiter;
use crate::application::policy::{
    BuildError, OnlyException, RateLimit, RecordPolicy, SeverityRange, SkipException,
    SkipExceptionMessage, SkipExceptionMessageRateLimited,
};
use crate::application::ports::Clock;
use crate::domain::error_kind::{ErrorKindError, ErrorKindRegistry, ExceptionKinds};
use crate::domain::severity::Severity;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::counter::CounterLayer;
use crate::infrastructure::dump::{DumpConfig, DumpError, DumpRegistration};
use crate::infrastructure::filter::{DynRecordFilter, RecordFilter};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Calls admitted per period by the rate-limited exception filter.
pub const DEFAULT_EXCEPTION_CALLS: usize = 1;
/// Period of the rate-limited exception filter, in seconds.
pub const DEFAULT_EXCEPTION_PERIOD_SECS: f64 = 60.0;
/// Calls admitted per period by the plain rate limiter filter.
pub const DEFAULT_RATE_LIMIT_CALLS: usize = 10;
/// Period of the plain rate limiter filter, in seconds.
pub const DEFAULT_RATE_LIMIT_PERIOD_SECS: f64 = 600.0;

/// Failure to load or apply a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid exception kind '{name}': {source}")]
    Kind {
        name: String,
        #[source]
        source: ErrorKindError,
    },
    #[error("invalid filter #{index}: {source}")]
    Filter {
        index: usize,
        #[source]
        source: BuildError,
    },
    #[error(transparent)]
    Dump(#[from] DumpError),
}

/// An exception kind to add to the built-in registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindConfig {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// One filter of the chain, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum FilterConfig {
    SkipException {
        kinds: ExceptionKinds,
    },
    SkipExceptionMessage {
        kinds: ExceptionKinds,
        #[serde(default)]
        messages: Vec<String>,
        #[serde(default)]
        regex: bool,
    },
    SkipExceptionMessageRateLimited {
        kinds: ExceptionKinds,
        #[serde(default)]
        messages: Vec<String>,
        #[serde(default)]
        regex: bool,
        #[serde(default = "default_exception_calls")]
        calls: usize,
        #[serde(default = "default_exception_period")]
        period: f64,
    },
    RateLimiter {
        #[serde(default = "default_rate_limit_calls")]
        calls: usize,
        #[serde(default = "default_rate_limit_period")]
        period: f64,
    },
    OnlyException,
    SeverityRange {
        min: Severity,
        max: Severity,
    },
}

fn default_exception_calls() -> usize {
    DEFAULT_EXCEPTION_CALLS
}

fn default_exception_period() -> f64 {
    DEFAULT_EXCEPTION_PERIOD_SECS
}

fn default_rate_limit_calls() -> usize {
    DEFAULT_RATE_LIMIT_CALLS
}

fn default_rate_limit_period() -> f64 {
    DEFAULT_RATE_LIMIT_PERIOD_SECS
}

fn message_patterns(messages: &[String], regex: bool) -> Result<MessagePatterns, BuildError> {
    if regex {
        Ok(MessagePatterns::regexes(messages)?)
    } else {
        Ok(MessagePatterns::substrings(messages.iter().cloned()))
    }
}

fn limiter(calls: usize, period: f64, clock: &Arc<dyn Clock>) -> Result<RateLimiter, BuildError> {
    Ok(RateLimiter::from_secs(calls, period, Arc::clone(clock))?)
}

impl FilterConfig {
    /// Build the policy this entry describes.
    ///
    /// # Errors
    /// Fails on unknown kinds, invalid patterns, invalid periods or an empty
    /// severity range.
    pub fn policy(
        &self,
        registry: &Arc<ErrorKindRegistry>,
        clock: &Arc<dyn Clock>,
    ) -> Result<Box<dyn RecordPolicy>, BuildError> {
        let classifier =
            |kinds: &ExceptionKinds| ExceptionClassifier::new(kinds.clone(), Arc::clone(registry));

        let policy: Box<dyn RecordPolicy> = match self {
            FilterConfig::SkipException { kinds } => {
                Box::new(SkipException::new(classifier(kinds)?))
            }
            FilterConfig::SkipExceptionMessage {
                kinds,
                messages,
                regex,
            } => Box::new(SkipExceptionMessage::new(
                classifier(kinds)?,
                message_patterns(messages, *regex)?,
            )),
            FilterConfig::SkipExceptionMessageRateLimited {
                kinds,
                messages,
                regex,
                calls,
                period,
            } => Box::new(SkipExceptionMessageRateLimited::new(
                SkipExceptionMessage::new(classifier(kinds)?, message_patterns(messages, *regex)?),
                limiter(*calls, *period, clock)?,
            )),
            FilterConfig::RateLimiter { calls, period } => {
                Box::new(RateLimit::new(limiter(*calls, *period, clock)?))
            }
            FilterConfig::OnlyException => Box::new(OnlyException),
            FilterConfig::SeverityRange { min, max } => Box::new(SeverityRange::new(*min, *max)?),
        };
        Ok(policy)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    #[serde(default)]
    pub error_kinds: Vec<KindConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    #[serde(default)]
    pub dump: Option<DumpConfig>,
}

/// What a configuration builds.
#[derive(Debug)]
pub struct TallySetup {
    /// The whole filter chain as one per-layer filter
    pub filter: DynRecordFilter,
    pub counter: CounterLayer,
    /// Present when the configuration asked for a signal dump
    pub registration: Option<DumpRegistration>,
}

impl TallyConfig {
    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The built-in registry extended with the configured kinds, in order.
    pub fn registry(&self) -> Result<ErrorKindRegistry, ConfigError> {
        let mut registry = ErrorKindRegistry::builtin();
        for kind in &self.error_kinds {
            registry
                .register(kind.name.as_str(), kind.parent.as_deref())
                .map_err(|source| ConfigError::Kind {
                    name: kind.name.clone(),
                    source,
                })?;
        }
        Ok(registry)
    }

    /// Build the filter chain using the system clock.
    pub fn build_filter(&self) -> Result<DynRecordFilter, ConfigError> {
        self.build_filter_with_clock(Arc::new(SystemClock::new()))
    }

    /// Build the filter chain with a custom clock (mainly for testing).
    pub fn build_filter_with_clock(
        &self,
        clock: Arc<dyn Clock>,
    ) -> Result<DynRecordFilter, ConfigError> {
        let registry = Arc::new(self.registry()?);
        let chain = self
            .filters
            .iter()
            .enumerate()
            .map(|(index, filter)| {
                filter
                    .policy(&registry, &clock)
                    .map_err(|source| ConfigError::Filter { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RecordFilter::new(Box::new(chain) as Box<dyn RecordPolicy>))
    }

    /// Build the filter chain and counter, registering the dump if configured.
    pub fn build(&self) -> Result<TallySetup, ConfigError> {
        let filter = self.build_filter()?;
        let counter = CounterLayer::new();
        let registration = match &self.dump {
            Some(dump) => Some(counter.dump_on_signal(dump.clone())?),
            None => None,
        };
        Ok(TallySetup {
            filter,
            counter,
            registration,
        })
    }
}
