//! Remote check of a running process's tallies.
//!
//! The checker signals the target, waits for its dump file to be rewritten,
//! then evaluates threshold rules in order. The first violated rule decides
//! the outcome, which maps onto a process exit code for health-check scripts.

use crate::application::ports::{Clock, Signaller};
use crate::domain::rule::ThresholdRule;
use crate::domain::signal::Signal;
use crate::domain::tally::{epoch_secs, DumpParseError, DumpSnapshot};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How long to wait for the target to rewrite its dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Number of polls before giving up
    pub attempts: u32,
    /// Sleep before each poll
    pub interval: Duration,
}

impl CheckOptions {
    /// Upper bound on the time spent waiting.
    pub fn max_wait(&self) -> Duration {
        self.interval.saturating_mul(self.attempts)
    }
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

/// Result of a completed check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Every rule holds.
    Passed,
    /// The dump file was not rewritten in time.
    Unresponsive { path: PathBuf, waited: Duration },
    /// Rule `index` (0-based, in argument order) does not hold.
    RuleViolated {
        index: usize,
        rule: ThresholdRule,
        observed: f64,
    },
}

impl CheckOutcome {
    /// Exit code for the outcome: 0 passed, 2 unresponsive, `3 + index` for a
    /// violated rule.
    pub fn exit_code(&self) -> i32 {
        match self {
            CheckOutcome::Passed => 0,
            CheckOutcome::Unresponsive { .. } => 2,
            CheckOutcome::RuleViolated { index, .. } => {
                i32::try_from(*index).map_or(i32::MAX, |i| i.saturating_add(3))
            }
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, CheckOutcome::Passed)
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Passed => f.write_str("all rules passed"),
            CheckOutcome::Unresponsive { path, waited } => write!(
                f,
                "Error {} not updated after {:.1} seconds, process not responding",
                path.display(),
                waited.as_secs_f64()
            ),
            CheckOutcome::RuleViolated { rule, observed, .. } => write!(
                f,
                "Error in rule '{}' {} {} = {}",
                rule,
                rule.target(),
                rule.field(),
                observed
            ),
        }
    }
}

/// Failure that prevents a check from reaching an outcome.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("failed to send {signal} to process {pid}: {source}")]
    Signal {
        pid: u32,
        signal: Signal,
        #[source]
        source: io::Error,
    },
    #[error("failed to read dump {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse dump {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: DumpParseError,
    },
}

/// Signals a process and evaluates rules against its fresh dump.
#[derive(Debug, Clone)]
pub struct DumpChecker {
    signaller: Arc<dyn Signaller>,
    clock: Arc<dyn Clock>,
    options: CheckOptions,
}

impl DumpChecker {
    pub fn new(signaller: Arc<dyn Signaller>, clock: Arc<dyn Clock>) -> Self {
        Self {
            signaller,
            clock,
            options: CheckOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> CheckOptions {
        self.options
    }

    /// Run one check against `pid`.
    ///
    /// # Errors
    /// Fails when the signal cannot be delivered or when the rewritten dump
    /// cannot be read or parsed. An unresponsive target or a violated rule is
    /// an outcome, not an error.
    pub fn check(
        &self,
        pid: u32,
        path: &Path,
        signal: Signal,
        rules: &[ThresholdRule],
    ) -> Result<CheckOutcome, CheckError> {
        let before = modified(path);
        self.signaller
            .send(pid, signal)
            .map_err(|source| CheckError::Signal {
                pid,
                signal,
                source,
            })?;

        if !self.wait_for_update(path, before) {
            return Ok(CheckOutcome::Unresponsive {
                path: path.to_path_buf(),
                waited: self.options.max_wait(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| CheckError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = DumpSnapshot::parse(&content).map_err(|source| CheckError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(self.evaluate(&snapshot, rules))
    }

    /// Evaluate rules in order against an already parsed snapshot.
    pub fn evaluate(&self, snapshot: &DumpSnapshot, rules: &[ThresholdRule]) -> CheckOutcome {
        let now = epoch_secs(self.clock.wall_time());
        for (index, rule) in rules.iter().enumerate() {
            let evaluation = rule.evaluate(snapshot, now);
            if !evaluation.passed {
                return CheckOutcome::RuleViolated {
                    index,
                    rule: rule.clone(),
                    observed: evaluation.observed,
                };
            }
        }
        CheckOutcome::Passed
    }

    fn wait_for_update(&self, path: &Path, before: SystemTime) -> bool {
        for _ in 0..self.options.attempts {
            thread::sleep(self.options.interval);
            if modified(path) > before {
                return true;
            }
        }
        false
    }
}

/// Modification time, or the epoch when the file is missing.
fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::{MockClock, MockSignaller};
    use std::time::Instant;

    const DUMP: &str = r#"{"count": {"ERROR": 1, "INFO": 3}, "last_record": {"ERROR": 1000.0, "INFO": 990.0}}"#;

    fn fast() -> CheckOptions {
        CheckOptions {
            attempts: 3,
            interval: Duration::from_millis(5),
        }
    }

    fn clock_at(secs: u64) -> Arc<MockClock> {
        Arc::new(MockClock::with_wall_time(
            Instant::now(),
            UNIX_EPOCH + Duration::from_secs(secs),
        ))
    }

    fn writing_signaller(path: &Path, content: &'static str) -> MockSignaller {
        let path = path.to_path_buf();
        MockSignaller::new().with_action(move |_, _| fs::write(&path, content))
    }

    fn rules(rules: &[&str]) -> Vec<ThresholdRule> {
        rules.iter().map(|r| r.parse().unwrap()).collect()
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CheckOutcome::Passed.exit_code(), 0);
        let unresponsive = CheckOutcome::Unresponsive {
            path: PathBuf::from("/tmp/x"),
            waited: Duration::from_secs(5),
        };
        assert_eq!(unresponsive.exit_code(), 2);
        assert_eq!(
            unresponsive.to_string(),
            "Error /tmp/x not updated after 5.0 seconds, process not responding"
        );

        let violated = CheckOutcome::RuleViolated {
            index: 1,
            rule: "info count gt 2".parse().unwrap(),
            observed: 0.0,
        };
        assert_eq!(violated.exit_code(), 4);
        assert_eq!(
            violated.to_string(),
            "Error in rule 'info count gt 2' INFO count = 0"
        );
    }

    #[test]
    fn test_default_options() {
        let options = CheckOptions::default();
        assert_eq!(options.attempts, 10);
        assert_eq!(options.max_wait(), Duration::from_secs(5));
    }

    #[test]
    fn test_passes_when_dump_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        let signaller = writing_signaller(&path, DUMP);
        let checker =
            DumpChecker::new(Arc::new(signaller.clone()), clock_at(1_005)).with_options(fast());

        let outcome = checker
            .check(42, &path, Signal::USR2, &rules(&["info count gt 2"]))
            .unwrap();

        assert_eq!(outcome, CheckOutcome::Passed);
        assert_eq!(signaller.sent(), vec![(42, Signal::USR2)]);
    }

    #[test]
    fn test_unresponsive_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-written");
        let checker =
            DumpChecker::new(Arc::new(MockSignaller::new()), clock_at(0)).with_options(fast());

        let outcome = checker.check(42, &path, Signal::USR2, &[]).unwrap();
        assert_eq!(outcome.exit_code(), 2);
    }

    #[test]
    fn test_first_violated_rule_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");
        let signaller = writing_signaller(&path, "ERROR 1 1000.000\nINFO 3 990.000\n");
        let checker = DumpChecker::new(Arc::new(signaller), clock_at(1_005)).with_options(fast());

        let outcome = checker
            .check(
                42,
                &path,
                Signal::USR1,
                &rules(&["any count gt 3", "error count lt 1", "any count lt 1"]),
            )
            .unwrap();

        match outcome {
            CheckOutcome::RuleViolated {
                index, observed, ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(observed, 1.0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_last_record_is_relative_to_now() {
        let checker = DumpChecker::new(Arc::new(MockSignaller::new()), clock_at(1_005));
        let snapshot = DumpSnapshot::parse(DUMP).unwrap();

        assert!(checker
            .evaluate(&snapshot, &rules(&["any last_record gt -10"]))
            .is_passed());
        assert_eq!(
            checker
                .evaluate(&snapshot, &rules(&["info last_record gt -10"]))
                .exit_code(),
            3
        );
    }

    #[test]
    fn test_signal_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let signaller = MockSignaller::new()
            .with_action(|_, _| Err(io::Error::from_raw_os_error(libc::ESRCH)));
        let checker = DumpChecker::new(Arc::new(signaller), clock_at(0)).with_options(fast());

        let err = checker
            .check(42, &dir.path().join("dump"), Signal::USR2, &[])
            .unwrap_err();
        assert!(matches!(err, CheckError::Signal { pid: 42, .. }));
    }

    #[test]
    fn test_malformed_dump_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump");
        let signaller = writing_signaller(&path, "INFO three 1.0\n");
        let checker = DumpChecker::new(Arc::new(signaller), clock_at(0)).with_options(fast());

        let err = checker.check(42, &path, Signal::USR2, &[]).unwrap_err();
        assert!(matches!(err, CheckError::Parse { .. }));
    }
}
