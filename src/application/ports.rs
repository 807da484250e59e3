//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::signal::Signal;
use std::fmt::Debug;
use std::io;
use std::time::{Instant, SystemTime};

/// Port for obtaining current time.
///
/// Rate limiting works on the monotonic clock; tallies and threshold rules
/// work on wall-clock time. Infrastructure provides concrete implementations
/// (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;

    /// Get the current wall-clock time.
    fn wall_time(&self) -> SystemTime;
}

/// Port for delivering a signal to a process.
///
/// The check client only needs "poke this pid"; keeping it behind a port lets
/// the polling and rule logic run without real signals.
pub trait Signaller: Send + Sync + Debug {
    /// Send `signal` to the process identified by `pid`.
    fn send(&self, pid: u32, signal: Signal) -> io::Result<()>;
}
