//! Thread-safe rate limiter.
//!
//! Wraps a `SlidingWindow` in a mutex so concurrent logging calls against the
//! same limiter serialize their check-and-update.

use crate::application::ports::Clock;
use crate::domain::window::{Admission, RateLimitError, SlidingWindow};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Admission control shared by every clone of the same limiter.
///
/// Clones are handles onto one window; independent limiters never share
/// state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Arc<Mutex<SlidingWindow>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_calls` per trailing `period`, reading
    /// time from `clock`.
    pub fn new(max_calls: usize, period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::from_window(SlidingWindow::new(max_calls, period), clock)
    }

    /// Create a limiter from a period in (fractional) seconds.
    ///
    /// # Errors
    /// Fails when the period is negative or not finite.
    pub fn from_secs(
        max_calls: usize,
        period_secs: f64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RateLimitError> {
        let window = SlidingWindow::from_secs(max_calls, period_secs)?;
        Ok(Self::from_window(window, clock))
    }

    fn from_window(window: SlidingWindow, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: Arc::new(Mutex::new(window)),
            clock,
        }
    }

    /// Decide whether a call happening now is admitted.
    pub fn admit(&self) -> bool {
        self.admit_at(self.clock.now())
    }

    /// Decide whether a call at `now` is admitted.
    pub fn admit_at(&self, now: Instant) -> bool {
        // The window is consistent after every operation, so a poisoned lock
        // is still safe to use.
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(window.admit(now), Admission::Admitted)
    }

    pub fn max_calls(&self) -> usize {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .max_calls()
    }

    pub fn period(&self) -> Duration {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .period()
    }
}
