//! Event-recording hooks.

use parking_lot::Mutex;
use txflow_backend::{Event, Hooks};

/// Hook that records every event for later assertions.
///
/// Wrap it in an `Arc`, keep a clone, and hand the other to the pool or
/// executor as `Arc<dyn Hooks>`.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<Event>>,
}

impl RecordingHooks {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|event| pred(event)).count()
    }

    /// Checkouts delivered.
    #[must_use]
    pub fn checkouts(&self) -> usize {
        self.count(|event| matches!(event, Event::CheckedOut { .. }))
    }

    /// Returns that re-pooled the connection.
    #[must_use]
    pub fn checkins(&self) -> usize {
        self.count(|event| matches!(event, Event::CheckedIn { discarded: false, .. }))
    }

    /// Returns that destroyed the connection.
    #[must_use]
    pub fn discards(&self) -> usize {
        self.count(|event| matches!(event, Event::CheckedIn { discarded: true, .. }))
    }

    /// Transactions committed.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.count(|event| matches!(event, Event::TransactionCommitted { .. }))
    }

    /// Transactions rolled back.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.count(|event| matches!(event, Event::TransactionRolledBack { .. }))
    }

    /// Retry backoffs announced.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.count(|event| matches!(event, Event::RetryAttempted { .. }))
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Hooks for RecordingHooks {
    fn on_event(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn records_in_order_and_counts() {
        let hooks = RecordingHooks::new();
        hooks.on_event(&Event::CheckedOut {
            connection_id: 1,
            reused: false,
            waited: Duration::ZERO,
        });
        hooks.on_event(&Event::CheckedIn {
            connection_id: 1,
            discarded: true,
        });
        assert_eq!(hooks.checkouts(), 1);
        assert_eq!(hooks.checkins(), 0);
        assert_eq!(hooks.discards(), 1);
        assert_eq!(hooks.events().len(), 2);
        hooks.clear();
        assert!(hooks.events().is_empty());
    }
}
