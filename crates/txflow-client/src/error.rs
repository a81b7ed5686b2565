//! Client error types.

use thiserror::Error;
use txflow_backend::BackendError;
use txflow_pool::PoolError;

use crate::session::SessionState;

/// Errors that can occur while running transactional work.
#[derive(Debug, Error)]
pub enum Error {
    /// Acquiring a pooled connection failed.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// A statement failed inside the transaction.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Opening the transaction failed; the connection was discarded.
    #[error("failed to begin transaction: {source}")]
    Begin {
        /// The provider error.
        source: BackendError,
    },

    /// Commit failed; the transaction was rolled back.
    #[error("failed to commit transaction: {source}")]
    Commit {
        /// The provider error.
        source: BackendError,
    },

    /// Rollback failed while handling `cause`; the connection was discarded.
    ///
    /// `source()` is the error that triggered the rollback, so the original
    /// failure stays on the causal chain.
    #[error("rollback failed ({rollback}) while handling: {cause}")]
    RollbackFailed {
        /// The error that triggered the rollback.
        #[source]
        cause: Box<Error>,
        /// The error the rollback itself failed with.
        rollback: BackendError,
    },

    /// Application-level failure signalled by a unit of work.
    #[error("{0}")]
    Business(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A session operation was called in the wrong state.
    #[error("{operation} on a {state} session")]
    InvalidState {
        /// The session's current state.
        state: SessionState,
        /// The rejected operation.
        operation: &'static str,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an application failure so it flows through a transaction scope.
    ///
    /// Accepts error types and plain messages:
    ///
    /// ```rust,ignore
    /// return Err(Error::business("insufficient funds"));
    /// return Err(Error::business(my_domain_error));
    /// ```
    pub fn business(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Business(err.into())
    }

    /// Check if retrying the whole transaction may succeed.
    ///
    /// Transient backend failures (lost connections, conflicts) are worth a
    /// fresh attempt on a fresh session. Pool exhaustion is not: retrying
    /// into a starved pool only adds load. Business failures, failed
    /// rollbacks, and cancellation are never retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Pool(PoolError::Connect(err)) => err.is_transient(),
            Self::Pool(_) => false,
            Self::Backend(err) => err.is_transient(),
            Self::Begin { source } | Self::Commit { source } => source.is_transient(),
            Self::RollbackFailed { .. }
            | Self::Business(_)
            | Self::Cancelled
            | Self::InvalidState { .. }
            | Self::Config(_) => false,
        }
    }

    /// Check if this is a transaction conflict, the classic retry case.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Backend(BackendError::Conflict(_))
                | Self::Commit {
                    source: BackendError::Conflict(_),
                }
        )
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
