//! Sliding-window admission.
//!
//! At most `max_calls` admissions may fall inside any trailing window of
//! `period`. Unlike a fixed reset window, a burst is rejected until the
//! oldest admission in the window has aged out.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Decision made for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call fits in the window
    Admitted,
    /// The window is full
    Rejected,
}

impl Admission {
    /// Check if this decision is Admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// Check if this decision is Rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Admission::Rejected)
    }
}

/// Error returned when a window cannot be built from user input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit period must be a finite, non-negative number of seconds (got {0})")]
    InvalidPeriod(f64),
}

/// Sliding-log window of admitted call instants.
///
/// # Example
/// ```
/// use tracing_tally::domain::window::SlidingWindow;
/// use std::time::{Duration, Instant};
///
/// let mut window = SlidingWindow::new(2, Duration::from_secs(60));
/// let now = Instant::now();
///
/// assert!(window.admit(now).is_admitted());
/// assert!(window.admit(now).is_admitted());
/// assert!(window.admit(now).is_rejected());
///
/// // Once the first admissions are a full period old they stop counting
/// let later = now + Duration::from_secs(60);
/// assert!(window.admit(later).is_admitted());
/// ```
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    max_calls: usize,
    period: Duration,
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Create a new window.
    ///
    /// # Arguments
    /// * `max_calls` - Admissions allowed per window
    /// * `period` - Length of the trailing window
    pub fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            max_calls,
            period,
            admitted: VecDeque::with_capacity(max_calls.min(64)),
        }
    }

    /// Create a window from a period expressed in (fractional) seconds.
    pub fn from_secs(max_calls: usize, period_secs: f64) -> Result<Self, RateLimitError> {
        let period = Duration::try_from_secs_f64(period_secs)
            .map_err(|_| RateLimitError::InvalidPeriod(period_secs))?;
        Ok(Self::new(max_calls, period))
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of admissions still inside the window as of the last call.
    pub fn in_window(&self) -> usize {
        self.admitted.len()
    }

    /// Drop admissions that are at least one period old.
    fn expire(&mut self, now: Instant) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= self.period {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Decide whether a call at `now` is admitted, recording it if so.
    pub fn admit(&mut self, now: Instant) -> Admission {
        self.expire(now);

        if self.admitted.len() < self.max_calls {
            self.admitted.push_back(now);
            Admission::Admitted
        } else {
            Admission::Rejected
        }
    }

    /// Forget every recorded admission.
    pub fn reset(&mut self) {
        self.admitted.clear();
    }
}
