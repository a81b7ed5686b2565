//! Backend error types.

use thiserror::Error;

/// Errors reported by a connection provider.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network or transport failure; the physical link is gone.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Deadlock victim or serialization failure reported by the store.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// Statement rejected by the backing store.
    #[error("database error {code}: {message}")]
    Database {
        /// Store-specific error code.
        code: i32,
        /// Error message from the store.
        message: String,
    },

    /// Connection used after it was closed.
    #[error("connection closed")]
    Closed,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Statement not supported by this provider.
    #[error("unsupported statement: {0}")]
    Unsupported(String),

    /// Value conversion failed.
    #[error("type mismatch: expected {expected}, got {actual}")]
    Type {
        /// Requested Rust type.
        expected: &'static str,
        /// Actual value variant.
        actual: &'static str,
    },

    /// Named column missing from a row.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// Column index past the end of a row.
    #[error("column index {index} out of range ({len} columns)")]
    ColumnIndex {
        /// Requested index.
        index: usize,
        /// Number of columns in the row.
        len: usize,
    },

    /// Malformed DSN.
    #[error("invalid DSN: {0}")]
    Dsn(String),
}

impl BackendError {
    /// Check if this error is transient and may succeed on a fresh connection.
    ///
    /// Transient errors include transport failures, conflicts the store asks
    /// the client to re-attempt, and IO errors. Statement-level rejections
    /// are not transient: re-running them would fail the same way.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost(_) | Self::Conflict(_) | Self::Closed | Self::Io(_)
        )
    }

    /// Check if this error indicates the physical connection is unusable.
    ///
    /// The pool discards (rather than re-pools) connections that report one
    /// of these.
    #[must_use]
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Closed | Self::Io(_))
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::ConnectionLost("reset by peer".into()).is_transient());
        assert!(BackendError::Conflict("deadlock victim".into()).is_transient());
        assert!(BackendError::Closed.is_transient());
        assert!(
            BackendError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"))
                .is_transient()
        );

        assert!(
            !BackendError::Database {
                code: 547,
                message: "constraint violated".into()
            }
            .is_transient()
        );
        assert!(!BackendError::Unsupported("MERGE".into()).is_transient());
        assert!(
            !BackendError::Type {
                expected: "i64",
                actual: "text"
            }
            .is_transient()
        );
    }

    #[test]
    fn test_fatal_for_connection() {
        assert!(BackendError::ConnectionLost("eof".into()).is_fatal_for_connection());
        assert!(BackendError::Closed.is_fatal_for_connection());
        // A conflict is retryable but the connection itself is still usable.
        assert!(!BackendError::Conflict("serialization".into()).is_fatal_for_connection());
        assert!(
            !BackendError::Database {
                code: 1,
                message: "bad".into()
            }
            .is_fatal_for_connection()
        );
    }

    #[test]
    fn test_display() {
        let err = BackendError::Database {
            code: 1205,
            message: "chosen as deadlock victim".into(),
        };
        assert_eq!(err.to_string(), "database error 1205: chosen as deadlock victim");

        let err = BackendError::ColumnIndex { index: 3, len: 2 };
        assert_eq!(err.to_string(), "column index 3 out of range (2 columns)");
    }
}
