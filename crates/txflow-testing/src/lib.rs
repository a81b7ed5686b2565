//! # txflow-testing
//!
//! Test infrastructure for txflow development.
//!
//! This crate provides an in-memory transactional backend so pool, session,
//! and retry behavior can be tested without a database, plus scripted fault
//! injection and event recording.
//!
//! ## Features
//!
//! - In-memory store with real commit/rollback visibility semantics
//! - Scripted per-operation fault injection via [`FaultPlan`]
//! - `mem://<name>` DSN registry for sharing stores across managers
//! - Event recorder for asserting on lifecycle notifications
//! - Fixture helpers for seeded stores
//!
//! ## Example
//!
//! ```rust,ignore
//! use txflow_testing::{RecordingHooks, TestBackend};
//! use txflow_backend::BackendError;
//!
//! #[tokio::test]
//! async fn commit_makes_rows_visible() {
//!     let backend = TestBackend::new();
//!     backend.faults.fail_commit(BackendError::Conflict("busy".into()));
//!
//!     let pool = Pool::new(backend.manager.clone(), PoolConfig::new())?;
//!     // Drive the pool; then assert on backend.store counters...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod hooks;
pub mod memory;

pub use fixtures::TestBackend;
pub use hooks::RecordingHooks;
pub use memory::{FaultPlan, MemConnection, MemManager, MemStore};
