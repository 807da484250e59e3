//! Signal delivery through `kill(2)`.

use crate::application::check::{CheckError, CheckOutcome, DumpChecker};
use crate::application::ports::Signaller;
use crate::domain::rule::ThresholdRule;
use crate::domain::signal::Signal;
use crate::infrastructure::clock::SystemClock;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Sends real signals to other processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct KillSignaller;

impl Signaller for KillSignaller {
    fn send(&self, pid: u32, signal: Signal) -> io::Result<()> {
        // 0 and negative pids address process groups
        let target = libc::pid_t::try_from(pid)
            .ok()
            .filter(|pid| *pid > 0)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {}", pid))
            })?;

        let result = unsafe { libc::kill(target, signal.number()) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Check `pid` with real signals, the system clock and default options.
///
/// # Errors
/// See [`DumpChecker::check`].
pub fn check_dump(
    pid: u32,
    path: &Path,
    signal: Signal,
    rules: &[ThresholdRule],
) -> Result<CheckOutcome, CheckError> {
    DumpChecker::new(Arc::new(KillSignaller), Arc::new(SystemClock::new()))
        .check(pid, path, signal, rules)
}
