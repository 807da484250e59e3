//! Counter handler.
//!
//! `CounterLayer` tallies every event it sees by severity label and remembers
//! when each label was last seen. Tallies only ever grow; they are exposed as
//! JSON or text dumps, on demand or when a signal arrives.
//!
//! ```rust
//! use tracing_tally::infrastructure::counter::CounterLayer;
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let counter = CounterLayer::new();
//! let subscriber = tracing_subscriber::registry().with(counter.clone());
//!
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::info!("one");
//!     tracing::info!("two");
//! });
//!
//! assert_eq!(counter.snapshot().count_of("INFO"), 2);
//! ```

use crate::application::ports::Clock;
use crate::domain::record::LogRecord;
use crate::domain::severity::SeverityLabel;
use crate::domain::tally::{CounterState, DumpFormat, DumpSnapshot};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::dump::{self, DumpConfig, DumpError, DumpRegistration};
use crate::infrastructure::visitor::record_from_event;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Layer tallying records per severity label.
///
/// Clones share the same tallies.
#[derive(Debug, Clone)]
pub struct CounterLayer {
    state: Arc<Mutex<CounterState>>,
    clock: Arc<dyn Clock>,
}

impl CounterLayer {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a counter reading wall time from a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CounterState::new())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CounterState> {
        // Every update leaves the tallies consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tally one record.
    pub fn intake(&self, record: &LogRecord) {
        let label = record.label();
        let at = self.clock.wall_time();
        self.lock().record(label, at);
    }

    /// Count for one label.
    pub fn count(&self, label: &SeverityLabel) -> u64 {
        self.lock().count(label)
    }

    /// A consistent copy of every tally.
    pub fn snapshot(&self) -> DumpSnapshot {
        self.lock().snapshot()
    }

    pub fn dump_json(&self) -> serde_json::Result<String> {
        self.snapshot().to_json()
    }

    pub fn dump_text(&self) -> String {
        self.snapshot().to_text()
    }

    /// Serialize in the given format.
    pub fn serialize(&self, format: DumpFormat) -> serde_json::Result<String> {
        self.snapshot().render(format)
    }

    /// Write a dump to `path`, replacing any previous content.
    ///
    /// # Errors
    /// Fails when the tallies cannot be serialized or the file cannot be
    /// written.
    pub fn write_dump(&self, path: &Path, format: DumpFormat) -> Result<(), DumpError> {
        let content = self.serialize(format)?;
        dump::write_atomically(path, &content)
    }

    /// Write a dump whenever `config.signal` is delivered to this process.
    ///
    /// The last registration for a signal wins. Dumping stops when the
    /// returned guard is dropped or unregistered.
    ///
    /// # Errors
    /// Fails when the process cannot listen for the signal.
    pub fn dump_on_signal(&self, config: DumpConfig) -> Result<DumpRegistration, DumpError> {
        dump::register(self.clone(), config)
    }
}

impl Default for CounterLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CounterLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.intake(&record_from_event(event));
    }
}
