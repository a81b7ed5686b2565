//! # txflow-client
//!
//! Transactional execution over pooled sessions with retry composition.
//!
//! This is the primary public API surface for the txflow project. It ties a
//! bounded connection pool, a transaction-scoped session, and an
//! exponential-backoff retry policy into one execution path with strict
//! resource guarantees.
//!
//! ## Features
//!
//! - **Transaction scopes**: commit on success, rollback on failure,
//!   discard on rollback failure, with the original error preserved
//! - **Session state machine**: statements accepted only while the
//!   transaction is open, violations caught at runtime with clear errors
//! - **Retry composition**: every attempt runs on a fresh session, and no
//!   connection is held during a backoff sleep
//! - **Error classification**: transient failures retried, business errors
//!   and pool exhaustion surfaced immediately
//! - **Cancellation**: a token aborts blocked acquires and backoff sleeps,
//!   and still rolls back a transaction in flight
//! - **Lifecycle hooks**: pool, transaction, and retry events for
//!   observability
//!
//! ## Session Lifecycle
//!
//! Each unit of work sees a session that moves through exactly one path:
//!
//! ```text
//! Open -> Committed  (work returned Ok, commit succeeded)
//! Open -> RolledBack (work returned Err or was cancelled)
//! Open -> Closed     (rollback failed; connection discarded)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use txflow_client::{Error, Executor, Pool, PoolConfig, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Pool::new(manager, PoolConfig::new().max_size(10))?;
//!     let executor = Executor::new(pool)
//!         .retry_policy(RetryPolicy::new().max_attempts(5));
//!
//!     let order_id = executor
//!         .run_with_retry(|session| {
//!             Box::pin(async move {
//!                 session.execute("insert orders widget", &[]).await?;
//!                 let row = session.query_opt("select orders", &[]).await?;
//!                 let id: i64 = match row {
//!                     Some(row) => row.try_get(0)?,
//!                     None => return Err(Error::business("order vanished")),
//!                 };
//!                 Ok(id)
//!             })
//!         })
//!         .await?;
//!
//!     println!("created order {order_id}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod executor;
pub mod retry;
pub mod session;

// Re-export commonly used types
pub use error::{Error, Result};
pub use executor::Executor;
pub use retry::{RetryContext, RetryPolicy, with_retry, with_retry_observed};
pub use session::{Session, SessionState};
pub use txflow_backend::{
    BackendError, Connection, ConnectionManager, Dsn, Event, Hooks, IsolationLevel, NopHooks,
    Row, TransactionOptions, Value,
};
pub use txflow_pool::{Pool, PoolConfig, PoolError, PoolStats, PooledConn};
