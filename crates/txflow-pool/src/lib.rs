//! # txflow-pool
//!
//! Bounded asynchronous connection pool with overflow and liveness probing.
//!
//! Capacity is `max_size + max_overflow` concurrent checkouts; at most
//! `max_size` connections are kept idle, so overflow connections live only
//! for the duration of one checkout. Acquire waits (bounded by
//! `pool_timeout`) instead of failing fast, and can be aborted through a
//! cancellation token.
//!
//! ## Features
//!
//! - Overflow connections destroyed on return, never pooled
//! - Liveness probe (`pre_ping`) with transparent replacement of dead
//!   connections
//! - Idle and lifetime expiry of pooled connections
//! - Dirty-checkout tracking so connections with unknown state are never
//!   reused
//! - Idempotent `dispose` that wakes blocked waiters
//! - Counter snapshots for observability
//!
//! ## Example
//!
//! ```rust,ignore
//! use txflow_pool::{Pool, PoolConfig};
//!
//! let config = PoolConfig::new()
//!     .max_size(10)
//!     .max_overflow(5)
//!     .pool_timeout(Duration::from_secs(30));
//!
//! let pool = Pool::new(manager, config)?;
//! let conn = pool.acquire().await?;
//! // Use connection...
//! // Connection automatically returned to pool on drop
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use pool::{Pool, PoolStats, PooledConn};
