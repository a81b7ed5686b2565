//! Pool error types.

use std::time::Duration;

use thiserror::Error;
use txflow_backend::BackendError;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Timed out waiting for pool capacity.
    #[error("pool exhausted: no connection available within {waited:?}")]
    Exhausted {
        /// How long the caller waited.
        waited: Duration,
    },

    /// The pool has been disposed.
    #[error("pool is closed")]
    Closed,

    /// Opening a new connection failed.
    #[error("failed to open connection: {0}")]
    Connect(#[from] BackendError),

    /// Acquisition aborted by the caller's cancellation signal.
    #[error("acquire cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = PoolError::Exhausted {
            waited: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "pool exhausted: no connection available within 30s"
        );
        assert_eq!(PoolError::Closed.to_string(), "pool is closed");
    }

    #[test]
    fn test_connect_wraps_backend_error() {
        let err: PoolError = BackendError::ConnectionLost("refused".into()).into();
        assert!(matches!(err, PoolError::Connect(_)));
        assert!(err.to_string().contains("connection lost: refused"));
    }
}
