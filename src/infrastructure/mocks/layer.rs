//! Mock tracing layer for testing.

use crate::domain::record::{ExceptionInfo, LogRecord};
use crate::infrastructure::visitor::record_from_event;
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::Layer;

/// Mock layer that stores every event it receives.
///
/// Put it behind a filter to observe which records the filter keeps.
#[derive(Debug, Clone, Default)]
pub struct MockCaptureLayer {
    captured: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// Captured event information.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub record: LogRecord,
}

impl CapturedEvent {
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.record.exception.as_ref()
    }
}

impl MockCaptureLayer {
    /// Create a new mock capture layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured events.
    pub fn get_captured(&self) -> Vec<CapturedEvent> {
        self.captured
            .lock()
            .expect(
                "MockCaptureLayer mutex poisoned - a test thread panicked while holding the lock",
            )
            .clone()
    }

    /// Messages of all captured events, in order.
    pub fn messages(&self) -> Vec<String> {
        self.get_captured().into_iter().map(|e| e.message).collect()
    }

    /// Get the count of captured events.
    pub fn count(&self) -> usize {
        self.captured
            .lock()
            .expect(
                "MockCaptureLayer mutex poisoned - a test thread panicked while holding the lock",
            )
            .len()
    }

    /// Clear all captured events.
    ///
    /// # Examples
    ///
    /// ```
    /// use tracing_tally::infrastructure::mocks::MockCaptureLayer;
    /// use tracing::info;
    /// use tracing_subscriber::layer::SubscriberExt;
    ///
    /// let capture = MockCaptureLayer::new();
    /// let subscriber = tracing_subscriber::registry().with(capture.clone());
    ///
    /// tracing::subscriber::with_default(subscriber, || {
    ///     info!("test message");
    ///     assert_eq!(capture.count(), 1);
    ///
    ///     capture.clear();
    ///     assert_eq!(capture.count(), 0);
    /// });
    /// ```
    pub fn clear(&self) {
        self.captured
            .lock()
            .expect(
                "MockCaptureLayer mutex poisoned - a test thread panicked while holding the lock",
            )
            .clear();
    }
}

impl<S> Layer<S> for MockCaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let record = record_from_event(event);
        self.captured
            .lock()
            .expect(
                "MockCaptureLayer mutex poisoned - a test thread panicked while holding the lock",
            )
            .push(CapturedEvent {
                level: *event.metadata().level(),
                message: record.message.clone(),
                record,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error_kind::ROOT_KIND;
    use crate::domain::severity::Severity;
    use std::io;
    use tracing::{error, info};
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_mock_capture_layer() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!("test message");
        });

        assert_eq!(capture.count(), 1);
        let events = capture.get_captured();
        assert_eq!(events[0].level, Level::INFO);
        assert_eq!(events[0].message, "test message");
        assert!(events[0].exception().is_none());
    }

    #[test]
    fn test_captures_record_fields() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            crate::exception!("Io", io::Error::other("disk gone"), "write failed");
            let err = io::Error::other("boom");
            error!(error = &err as &(dyn std::error::Error + 'static), "plain error");
            error!(severity = 50u64, "critical");
        });

        let events = capture.get_captured();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].message, "write failed");
        assert_eq!(
            events[0].exception(),
            Some(&ExceptionInfo::new("Io", "disk gone"))
        );
        assert_eq!(
            events[1].exception(),
            Some(&ExceptionInfo::new(ROOT_KIND, "boom"))
        );
        assert_eq!(events[2].record.severity, Severity::CRITICAL);
        assert!(events[2].exception().is_none());
    }
}
