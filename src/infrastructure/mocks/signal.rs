//! Mock signaller for testing.

use crate::application::ports::Signaller;
use crate::domain::signal::Signal;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

type SendAction = dyn Fn(u32, Signal) -> io::Result<()> + Send + Sync;

/// Signaller that records deliveries instead of sending them.
///
/// An optional action runs on every send, e.g. writing the dump file the
/// target process would have written, or failing like `kill` would.
#[derive(Clone, Default)]
pub struct MockSignaller {
    sent: Arc<Mutex<Vec<(u32, Signal)>>>,
    action: Option<Arc<SendAction>>,
}

impl MockSignaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` on every send; its result is what `send` returns.
    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(u32, Signal) -> io::Result<()> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    /// Every `(pid, signal)` pair sent so far.
    pub fn sent(&self) -> Vec<(u32, Signal)> {
        self.sent
            .lock()
            .expect("MockSignaller mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }
}

impl fmt::Debug for MockSignaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSignaller")
            .field("sent", &self.sent)
            .field("action", &self.action.is_some())
            .finish()
    }
}

impl Signaller for MockSignaller {
    fn send(&self, pid: u32, signal: Signal) -> io::Result<()> {
        self.sent
            .lock()
            .expect("MockSignaller mutex poisoned - a test thread panicked while holding the lock")
            .push((pid, signal));
        match &self.action {
            Some(action) => action(pid, signal),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_sends() {
        let signaller = MockSignaller::new();
        signaller.send(7, Signal::USR1).unwrap();
        signaller.clone().send(8, Signal::HUP).unwrap();
        assert_eq!(signaller.sent(), vec![(7, Signal::USR1), (8, Signal::HUP)]);
    }

    #[test]
    fn test_action_result_is_returned() {
        let signaller = MockSignaller::new().with_action(|_, _| Err(io::ErrorKind::Other.into()));
        assert!(signaller.send(7, Signal::USR2).is_err());
        assert_eq!(signaller.sent().len(), 1);
    }
}
