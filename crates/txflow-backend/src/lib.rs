//! # txflow-backend
//!
//! Driver-facing foundation for the txflow transactional execution framework.
//!
//! This crate defines the seam between txflow and whatever actually talks to
//! a database: the [`Connection`] and [`ConnectionManager`] traits, the small
//! [`Value`]/[`Row`] data model statements exchange, the [`BackendError`]
//! taxonomy with its transient/fatal classification, DSN parsing, and the
//! lifecycle [`Event`]s the pool and executor emit.
//!
//! ## Design Philosophy
//!
//! This crate is intentionally IO-agnostic. It contains no pooling or retry
//! logic and makes no assumptions about how a provider reaches its store.
//! Higher-level crates (`txflow-pool`, `txflow-client`) build upon this
//! foundation; providers implement the two traits and nothing else.
//!
//! ## Example
//!
//! ```rust,ignore
//! use txflow_backend::{Connection, ConnectionManager, BackendError};
//!
//! struct PgManager { dsn: txflow_backend::Dsn }
//!
//! #[async_trait::async_trait]
//! impl ConnectionManager for PgManager {
//!     type Connection = PgConnection;
//!
//!     async fn connect(&self) -> Result<PgConnection, BackendError> {
//!         PgConnection::open(&self.dsn).await
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connection;
pub mod dsn;
pub mod error;
pub mod events;
pub mod value;

pub use connection::{Connection, ConnectionManager, IsolationLevel, TransactionOptions};
pub use dsn::Dsn;
pub use error::BackendError;
pub use events::{Event, Hooks, NopHooks};
pub use value::{FromValue, Row, Value};
