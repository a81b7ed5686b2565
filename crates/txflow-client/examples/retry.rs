//! Retry policy example.
//!
//! This example demonstrates retrying transient failures including:
//! - Configuring an exponential backoff policy
//! - Automatic rollback and re-attempt on transient errors
//! - Observing retry attempts through lifecycle hooks
//! - Errors that are never retried
//!
//! # Running
//!
//! ```bash
//! cargo run --example retry
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use txflow_backend::BackendError;
use txflow_client::{Error, Executor, Pool, PoolConfig, RetryPolicy};
use txflow_testing::{RecordingHooks, TestBackend};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let backend = TestBackend::new();
    let hooks = Arc::new(RecordingHooks::new());
    let pool = Pool::with_hooks(
        backend.manager.clone(),
        PoolConfig::new().max_size(5),
        hooks.clone(),
    )?;
    let policy = RetryPolicy::new()
        .max_attempts(4)
        .base_delay(Duration::from_millis(25))
        .backoff_factor(2.0);
    let executor = Executor::new(pool).retry_policy(policy);
    println!("Retrying up to 4 attempts, backoff 25ms doubling");

    // Example 1: Recovering from transient conflicts
    println!("\n--- Example 1: Transient Conflicts ---");
    // The first two commits will be rejected, as a contended store would.
    backend
        .faults
        .fail_commit(BackendError::Conflict("deadlock victim".into()));
    backend
        .faults
        .fail_commit(BackendError::Conflict("deadlock victim".into()));

    executor
        .run_with_retry(|session| {
            Box::pin(async move {
                session.execute("insert orders widget", &[]).await?;
                Ok(())
            })
        })
        .await?;
    println!(
        "Order committed after {} retries ({} transactions begun)",
        hooks.retries(),
        backend.store.begins()
    );
    for (attempt, delay) in backoffs(&hooks) {
        println!("  attempt {attempt} backed off {delay:?}");
    }

    // Example 2: Business errors are not retried
    println!("\n--- Example 2: Non-Retryable Failures ---");
    let before = backend.store.begins();
    let result: Result<(), Error> = executor
        .run_with_retry(|_| Box::pin(async { Err(Error::business("order limit reached")) }))
        .await;
    match result {
        Err(err) => println!("Gave up immediately: {err}"),
        Ok(()) => println!("Unexpected success"),
    }
    println!(
        "Attempts used: {} (business failures fail fast)",
        backend.store.begins() - before
    );

    // Example 3: The last real error is surfaced when attempts run out
    println!("\n--- Example 3: Exhausted Attempts ---");
    for _ in 0..4 {
        backend
            .faults
            .fail_commit(BackendError::Conflict("still contended".into()));
    }
    let result: Result<(), Error> = executor
        .run_with_retry(|session| {
            Box::pin(async move {
                session.execute("insert orders gadget", &[]).await?;
                Ok(())
            })
        })
        .await;
    if let Err(err) = result {
        println!("All attempts failed, last error: {err}");
    }
    println!("Store holds {} committed orders", backend.store.count("orders"));

    Ok(())
}

/// Pull (attempt, delay) pairs out of the recorded lifecycle events.
fn backoffs(hooks: &RecordingHooks) -> Vec<(u32, Duration)> {
    hooks
        .events()
        .into_iter()
        .filter_map(|event| match event {
            txflow_backend::Event::RetryAttempted { attempt, delay } => Some((attempt, delay)),
            _ => None,
        })
        .collect()
}
