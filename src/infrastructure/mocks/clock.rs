//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly. The monotonic instant
/// and the wall-clock time advance together.
///
/// # Examples
///
/// ```
/// use tracing_tally::infrastructure::mocks::MockClock;
/// use tracing_tally::application::ports::Clock;
/// use std::time::{Duration, Instant, UNIX_EPOCH};
///
/// let start = Instant::now();
/// let clock = MockClock::with_wall_time(start, UNIX_EPOCH + Duration::from_secs(1_000));
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), start + Duration::from_secs(10));
/// assert_eq!(clock.wall_time(), UNIX_EPOCH + Duration::from_secs(1_010));
/// ```
///
/// # Thread Safety
///
/// `MockClock` can be cloned to share across threads. All clones share the
/// same underlying time, so advancing one clone affects all of them.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<(Instant, SystemTime)>>,
}

impl MockClock {
    /// Create a mock clock starting at `start`, with wall time starting now.
    pub fn new(start: Instant) -> Self {
        Self::with_wall_time(start, SystemTime::now())
    }

    /// Create a mock clock with explicit starting instant and wall time.
    pub fn with_wall_time(start: Instant, wall: SystemTime) -> Self {
        Self {
            current: Arc::new(Mutex::new((start, wall))),
        }
    }

    /// Advance both clocks by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        time.0 += duration;
        time.1 += duration;
    }

    /// Set the monotonic clock to a specific instant.
    pub fn set(&self, instant: Instant) {
        let mut time = self
            .current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        time.0 = instant;
    }

    /// Set the wall clock to a specific time.
    pub fn set_wall_time(&self, wall: SystemTime) {
        let mut time = self
            .current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        time.1 = wall;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
            .0
    }

    fn wall_time(&self) -> SystemTime {
        self.current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
            .1
    }
}
