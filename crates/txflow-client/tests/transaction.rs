//! Transaction scope tests.
//!
//! Each scope must resolve its transaction exactly once: commit on success,
//! rollback on failure, discard on rollback failure, with the work's own
//! error always surfaced.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use txflow_backend::BackendError;
use txflow_client::{
    Error, Executor, IsolationLevel, Pool, PoolConfig, TransactionOptions, Value,
};
use txflow_testing::{RecordingHooks, TestBackend};

fn executor_over(backend: &TestBackend) -> Executor<txflow_testing::MemManager> {
    let pool = Pool::new(backend.manager.clone(), PoolConfig::new()).unwrap();
    Executor::new(pool)
}

// =============================================================================
// Commit Path
// =============================================================================

/// Test that successful work commits and its value is returned.
#[tokio::test]
async fn success_commits_and_returns_value() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);

    let affected = executor
        .with_transaction(|session| {
            Box::pin(async move {
                let n = session.execute("insert accounts alice", &[]).await?;
                session.execute("insert accounts bob", &[]).await?;
                Ok(n)
            })
        })
        .await
        .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(backend.store.count("accounts"), 2);
    assert_eq!(backend.store.commits(), 1);
    assert_eq!(backend.store.rollbacks(), 0);
}

/// Test that a committed scope returns its connection to the pool clean.
#[tokio::test]
async fn commit_repools_the_connection() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);

    executor
        .with_transaction(|session| {
            Box::pin(async move {
                session.execute("insert accounts alice", &[]).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    let stats = executor.pool().stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.discarded, 0);
}

/// Test that work reads its own uncommitted writes.
#[tokio::test]
async fn work_reads_its_own_writes() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);

    let seen = executor
        .with_transaction(|session| {
            Box::pin(async move {
                session.execute("insert events first", &[]).await?;
                let row = session.query_opt("count events", &[]).await?.unwrap();
                let count: i64 = row.try_get(0)?;
                Ok(count)
            })
        })
        .await
        .unwrap();

    assert_eq!(seen, 1);
}

// =============================================================================
// Rollback Path
// =============================================================================

/// Test that failed work rolls back and surfaces the work's error unchanged.
#[tokio::test]
async fn failure_rolls_back_and_surfaces_error() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);

    let err = executor
        .with_transaction::<(), _>(|session| {
            Box::pin(async move {
                session.execute("insert accounts alice", &[]).await?;
                Err(Error::business("insufficient funds"))
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "insufficient funds");
    assert_eq!(backend.store.count("accounts"), 0);
    assert_eq!(backend.store.rollbacks(), 1);
    assert_eq!(backend.store.commits(), 0);
}

/// Test that a clean rollback still re-pools the connection.
#[tokio::test]
async fn clean_rollback_repools_the_connection() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);

    let _ = executor
        .with_transaction::<(), _>(|_| Box::pin(async { Err(Error::business("nope")) }))
        .await;

    let stats = executor.pool().stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.discarded, 0);
}

/// Test that a backend failure inside the work also triggers rollback.
#[tokio::test]
async fn backend_failure_in_work_rolls_back() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);
    backend
        .faults
        .fail_execute(BackendError::Conflict("write lock".into()));

    let err = executor
        .with_transaction::<(), _>(|session| {
            Box::pin(async move {
                session.execute("insert accounts alice", &[]).await?;
                Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Backend(BackendError::Conflict(_))));
    assert_eq!(backend.store.rollbacks(), 1);
}

// =============================================================================
// Commit Failure
// =============================================================================

/// Test that a commit failure rolls back and surfaces as a commit error.
#[tokio::test]
async fn commit_failure_rolls_back() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);
    backend
        .faults
        .fail_commit(BackendError::Conflict("serialization".into()));

    let err = executor
        .with_transaction(|session| {
            Box::pin(async move {
                session.execute("insert accounts alice", &[]).await?;
                Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Commit { .. }));
    assert!(err.is_conflict());
    assert_eq!(backend.store.count("accounts"), 0);
    assert_eq!(backend.store.rollbacks(), 1);
    // The connection resolved cleanly, so it is reusable.
    assert_eq!(executor.pool().stats().idle, 1);
}

// =============================================================================
// Rollback Failure
// =============================================================================

/// Test that a failed rollback discards the connection and keeps the
/// original error as the cause.
#[tokio::test]
async fn rollback_failure_discards_and_chains() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);
    backend
        .faults
        .fail_rollback(BackendError::ConnectionLost("gone".into()));

    let err = executor
        .with_transaction::<(), _>(|session| {
            Box::pin(async move {
                session.execute("insert accounts alice", &[]).await?;
                Err(Error::business("boom"))
            })
        })
        .await
        .unwrap_err();

    match err {
        Error::RollbackFailed { cause, rollback } => {
            assert_eq!(cause.to_string(), "boom");
            assert!(matches!(rollback, BackendError::ConnectionLost(_)));
        }
        other => panic!("expected RollbackFailed, got {other:?}"),
    }
    assert_eq!(executor.pool().stats().discarded, 1);
    assert_eq!(executor.pool().stats().idle, 0);
}

/// Test that rollback failure is never considered retryable.
#[tokio::test]
async fn rollback_failure_is_terminal() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);
    backend
        .faults
        .fail_rollback(BackendError::ConnectionLost("gone".into()));

    let err = executor
        .with_transaction::<(), _>(|_| {
            Box::pin(async { Err(Error::Backend(BackendError::Conflict("busy".into()))) })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RollbackFailed { .. }));
    assert!(!err.is_retryable());
}

// =============================================================================
// Transaction Options
// =============================================================================

/// Test that isolation and read-only options reach the backend.
#[tokio::test]
async fn options_plumb_through_to_begin() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);
    let options = TransactionOptions::new()
        .isolation(IsolationLevel::Serializable)
        .read_only(true);

    let rows = executor
        .with_transaction_opts(options, |session| {
            Box::pin(async move { session.query("select accounts", &[]).await })
        })
        .await
        .unwrap();
    assert!(rows.is_empty());

    let begun = backend.store.last_begin_options().unwrap();
    assert_eq!(begun.isolation, Some(IsolationLevel::Serializable));
    assert!(begun.read_only);
}

/// Test that writes inside a read-only transaction fail and roll back.
#[tokio::test]
async fn read_only_rejects_writes() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);

    let err = executor
        .with_transaction_opts(TransactionOptions::new().read_only(true), |session| {
            Box::pin(async move {
                session.execute("insert accounts alice", &[]).await?;
                Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Backend(BackendError::Database { code: 25006, .. })
    ));
    assert_eq!(backend.store.rollbacks(), 1);
}

/// Test that bound parameters flow through the session.
#[tokio::test]
async fn parameters_bind_through_session() {
    let backend = TestBackend::new();
    let executor = executor_over(&backend);

    executor
        .with_transaction(|session| {
            Box::pin(async move {
                session
                    .execute("insert accounts ?", &[Value::from("carol")])
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    assert_eq!(backend.store.rows("accounts")[0].1, "carol");
}

// =============================================================================
// Cancellation
// =============================================================================

/// Test that cancelling mid-work rolls the transaction back.
#[tokio::test]
async fn cancel_mid_work_rolls_back() {
    let backend = TestBackend::new();
    let token = CancellationToken::new();
    let executor = executor_over(&backend).cancellation(token.clone());

    let canceller = tokio::spawn({
        let token = token.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        }
    });

    let err = executor
        .with_transaction::<(), _>(|session| {
            Box::pin(async move {
                session.execute("insert accounts alice", &[]).await?;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
        })
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(backend.store.count("accounts"), 0);
    assert_eq!(backend.store.rollbacks(), 1);
    // The rolled-back connection went home clean.
    assert_eq!(executor.pool().stats().idle, 1);
}

// =============================================================================
// Hooks
// =============================================================================

/// Test that commit and rollback events reach the hooks.
#[tokio::test]
async fn hooks_observe_transaction_outcomes() {
    let backend = TestBackend::new();
    let hooks = Arc::new(RecordingHooks::new());
    let pool =
        Pool::with_hooks(backend.manager.clone(), PoolConfig::new(), hooks.clone()).unwrap();
    let executor = Executor::new(pool);

    executor
        .with_transaction(|session| {
            Box::pin(async move {
                session.execute("insert events ok", &[]).await?;
                Ok(())
            })
        })
        .await
        .unwrap();
    let _ = executor
        .with_transaction::<(), _>(|_| Box::pin(async { Err(Error::business("no")) }))
        .await;

    assert_eq!(hooks.commits(), 1);
    assert_eq!(hooks.rollbacks(), 1);
    assert_eq!(hooks.checkouts(), 2);
}

/// Test that a failed rollback produces no rolled-back event.
#[tokio::test]
async fn no_rollback_event_when_rollback_fails() {
    let backend = TestBackend::new();
    let hooks = Arc::new(RecordingHooks::new());
    let pool =
        Pool::with_hooks(backend.manager.clone(), PoolConfig::new(), hooks.clone()).unwrap();
    let executor = Executor::new(pool);
    backend
        .faults
        .fail_rollback(BackendError::ConnectionLost("gone".into()));

    let _ = executor
        .with_transaction::<(), _>(|_| Box::pin(async { Err(Error::business("no")) }))
        .await;

    assert_eq!(hooks.rollbacks(), 0);
    assert_eq!(hooks.discards(), 1);
}
