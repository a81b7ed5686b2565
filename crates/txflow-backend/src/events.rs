//! Lifecycle events and the hook trait observers implement.
//!
//! Events are pure notifications: the pool and executor emit them after the
//! fact, synchronously, and ignore whatever the hook does. A hook must not
//! block; anything slow belongs on a channel the hook owns.

use std::time::Duration;

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    /// A pool finished construction.
    PoolCreated {
        /// Core capacity.
        max_size: usize,
        /// Extra capacity admitted under load.
        max_overflow: usize,
    },

    /// A connection was handed to a caller.
    CheckedOut {
        /// Pool-assigned connection id.
        connection_id: u64,
        /// Whether an idle connection was reused (vs freshly opened).
        reused: bool,
        /// Time spent waiting for capacity.
        waited: Duration,
    },

    /// A checked-out connection came back.
    CheckedIn {
        /// Pool-assigned connection id.
        connection_id: u64,
        /// Whether the connection was destroyed instead of re-pooled.
        discarded: bool,
    },

    /// A transaction committed.
    TransactionCommitted {
        /// Connection the transaction ran on.
        connection_id: u64,
    },

    /// A transaction rolled back.
    TransactionRolledBack {
        /// Connection the transaction ran on.
        connection_id: u64,
    },

    /// A retryable failure will be re-attempted after a backoff sleep.
    RetryAttempted {
        /// 1-based number of the attempt that just failed.
        attempt: u32,
        /// Sleep preceding the next attempt.
        delay: Duration,
    },
}

/// Receiver for lifecycle [`Event`]s.
pub trait Hooks: Send + Sync {
    /// Called once per event, after the event took effect.
    fn on_event(&self, event: &Event);
}

/// Hook that ignores every event; the default when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopHooks;

impl Hooks for NopHooks {
    fn on_event(&self, _event: &Event) {}
}
