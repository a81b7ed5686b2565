//! Pooled sessions with transaction state tracking.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use txflow_backend::{
    BackendError, Connection, ConnectionManager, Event, Hooks, Row, TransactionOptions, Value,
};
use txflow_pool::PooledConn;

use crate::error::{Error, Result};

/// Lifecycle state of a [`Session`].
///
/// A session starts `Open` and ends in exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transaction active, statements accepted.
    Open,
    /// Commit succeeded.
    Committed,
    /// Rollback ran.
    RolledBack,
    /// The session gave up its connection without resolving cleanly.
    Closed,
}

impl SessionState {
    /// Lowercase state name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One pooled connection bound to one transaction.
///
/// A session is created with its transaction already begun and moves through
/// exactly one of [`commit`](Session::commit) or
/// [`rollback`](Session::rollback). Statements are accepted only while
/// `Open`; afterwards they fail with [`Error::InvalidState`]. Dropping a
/// session whose transaction never resolved discards the connection, so an
/// abandoned transaction cannot leak into a later checkout.
pub struct Session<M: ConnectionManager> {
    conn: PooledConn<M>,
    state: SessionState,
    hooks: Arc<dyn Hooks>,
}

impl<M: ConnectionManager> Session<M> {
    /// Begin a transaction on `conn`. On failure the connection is discarded.
    pub(crate) async fn open(
        mut conn: PooledConn<M>,
        options: TransactionOptions,
        hooks: Arc<dyn Hooks>,
    ) -> Result<Self> {
        // Dirty until the transaction resolves; an unresolved transaction
        // must never ride back into the pool.
        conn.mark_dirty();
        if let Err(source) = conn.begin(&options).await {
            return Err(Error::Begin { source });
        }
        trace!(connection_id = conn.id(), "transaction begun");
        Ok(Self {
            conn,
            state: SessionState::Open,
            hooks,
        })
    }

    /// The session's lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pool-assigned id of the underlying connection.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.conn.id()
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.state == SessionState::Open {
            Ok(())
        } else {
            Err(Error::InvalidState {
                state: self.state,
                operation,
            })
        }
    }

    /// Execute a statement, returning the affected row count.
    pub async fn execute(&mut self, command: &str, params: &[Value]) -> Result<u64> {
        self.ensure_open("execute")?;
        Ok(self.conn.execute(command, params).await?)
    }

    /// Run a query, returning all rows.
    pub async fn query(&mut self, command: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.ensure_open("query")?;
        Ok(self.conn.query(command, params).await?)
    }

    /// Run a query, returning the first row if any.
    pub async fn query_opt(&mut self, command: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(command, params).await?.into_iter().next())
    }

    /// Commit the transaction.
    ///
    /// On success the connection is clean again and returns to the pool when
    /// the session drops. On failure the transaction is still open; roll
    /// back, or drop the session to discard the connection.
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_open("commit")?;
        self.conn
            .commit()
            .await
            .map_err(|source| Error::Commit { source })?;
        self.state = SessionState::Committed;
        self.conn.clear_dirty();
        debug!(connection_id = self.conn.id(), "transaction committed");
        self.hooks.on_event(&Event::TransactionCommitted {
            connection_id: self.conn.id(),
        });
        Ok(())
    }

    /// Roll back the transaction.
    ///
    /// On failure the connection state is unknown; the session becomes
    /// `Closed` and the connection is discarded when it drops.
    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_open("rollback")?;
        self.rollback_inner().await.map_err(Error::Backend)
    }

    /// Rollback without the state precondition, for scope-driven cleanup.
    pub(crate) async fn rollback_inner(&mut self) -> std::result::Result<(), BackendError> {
        match self.conn.rollback().await {
            Ok(()) => {
                self.state = SessionState::RolledBack;
                self.conn.clear_dirty();
                debug!(connection_id = self.conn.id(), "transaction rolled back");
                self.hooks.on_event(&Event::TransactionRolledBack {
                    connection_id: self.conn.id(),
                });
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Closed;
                warn!(connection_id = self.conn.id(), error = %err, "rollback failed");
                Err(err)
            }
        }
    }

    /// Release the session's connection explicitly.
    ///
    /// Equivalent to dropping. A transaction that never resolved means the
    /// connection is discarded rather than re-pooled.
    pub fn close(self) {
        trace!(
            connection_id = self.conn.id(),
            state = %self.state,
            "session closed"
        );
    }

    /// Destroy the connection immediately.
    pub(crate) fn discard(self) {
        self.conn.discard();
    }
}

impl<M: ConnectionManager> fmt::Debug for Session<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connection_id", &self.conn.id())
            .field("state", &self.state)
            .finish()
    }
}
