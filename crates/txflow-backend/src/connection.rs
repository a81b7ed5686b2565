//! Connection provider traits.
//!
//! A provider supplies two implementations: a [`ConnectionManager`] that opens
//! physical connections, and the [`Connection`] those opens produce. The pool
//! owns managers; units of work only ever see a connection through a session
//! handle.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::value::{Row, Value};

/// Transaction isolation level.
///
/// The level names follow the SQL standard; providers translate them into
/// whatever their store expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted (dirty reads allowed).
    ReadUncommitted,

    /// Read committed (the common default).
    ///
    /// Transactions can only read committed data. Prevents dirty reads
    /// but allows non-repeatable reads and phantom reads.
    #[default]
    ReadCommitted,

    /// Repeatable read.
    ///
    /// Rows read by a transaction don't change during the transaction.
    /// Allows phantom reads.
    RepeatableRead,

    /// Serializable (highest isolation).
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL statement to set this isolation level.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
            Self::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            Self::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            Self::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }

    /// Get the isolation level name as it appears in SQL.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options applied when a transaction begins.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct TransactionOptions {
    /// Isolation level override; `None` keeps the connection's current level.
    pub isolation: Option<IsolationLevel>,
    /// Reject writes inside this transaction.
    pub read_only: bool,
}

impl TransactionOptions {
    /// Create options with defaults (store-default isolation, read-write).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level.
    #[must_use]
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Mark the transaction read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// One physical connection to the backing store.
///
/// Implementations are exclusively owned while checked out; methods take
/// `&mut self` and never need interior locking. Closing is dropping: a
/// provider that must tear down its link gracefully does so in `Drop`.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&mut self, statement: &str, params: &[Value]) -> Result<u64, BackendError>;

    /// Run a query, returning its result rows.
    async fn query(&mut self, statement: &str, params: &[Value])
    -> Result<Vec<Row>, BackendError>;

    /// Liveness probe; the pool's pre-ping issues this before reusing an
    /// idle connection.
    async fn ping(&mut self) -> Result<(), BackendError>;

    /// Begin a transaction with the given options.
    async fn begin(&mut self, options: &TransactionOptions) -> Result<(), BackendError>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<(), BackendError>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<(), BackendError>;

    /// Cheap liveness flag; `false` once the link is known dead.
    fn is_open(&self) -> bool;
}

/// Opens physical connections on demand; the pool's factory.
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    /// The connection type this manager produces.
    type Connection: Connection;

    /// Open a new physical connection.
    async fn connect(&self) -> Result<Self::Connection, BackendError>;
}
