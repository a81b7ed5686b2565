//! Transaction scope example.
//!
//! This example demonstrates transactional execution including:
//! - Running a unit of work that commits on success
//! - Automatic rollback when the work fails
//! - Transaction options (isolation level, read-only)
//! - Driving a session by hand
//!
//! # Running
//!
//! ```bash
//! cargo run --example transactions
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use txflow_client::{
    Error, Executor, IsolationLevel, Pool, PoolConfig, TransactionOptions, Value,
};
use txflow_testing::MemManager;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    // The in-memory backend stands in for a real store; swap in any
    // ConnectionManager to talk to one.
    let manager = MemManager::new();
    let store = manager.store();
    let pool = Pool::new(manager, PoolConfig::new().max_size(5))?;
    let executor = Executor::new(pool);
    println!("Pool ready");

    // Example 1: Commit on success
    println!("\n--- Example 1: Commit on Success ---");
    let inserted = executor
        .with_transaction(|session| {
            Box::pin(async move {
                session.execute("insert accounts alice", &[]).await?;
                session.execute("insert accounts bob", &[]).await?;
                Ok(2u64)
            })
        })
        .await?;
    println!("Committed {inserted} rows");
    println!("Store now holds {} accounts", store.count("accounts"));

    // Example 2: Rollback on failure
    println!("\n--- Example 2: Rollback on Failure ---");
    let result: Result<(), Error> = executor
        .with_transaction(|session| {
            Box::pin(async move {
                session.execute("insert accounts mallory", &[]).await?;
                // The scope sees this error, rolls back, and surfaces it.
                Err(Error::business("account rejected by policy"))
            })
        })
        .await;
    match result {
        Err(err) => println!("Work failed as expected: {err}"),
        Ok(()) => println!("Unexpected success"),
    }
    println!(
        "Store still holds {} accounts (mallory was rolled back)",
        store.count("accounts")
    );

    // Example 3: Transaction options
    println!("\n--- Example 3: Transaction Options ---");
    let options = TransactionOptions::new()
        .isolation(IsolationLevel::Serializable)
        .read_only(true);
    let names = executor
        .with_transaction_opts(options, |session| {
            Box::pin(async move {
                let rows = session.query("select accounts", &[]).await?;
                let mut names = Vec::new();
                for row in rows {
                    names.push(row.try_get_named::<String>("value")?);
                }
                Ok(names)
            })
        })
        .await?;
    println!("Read {names:?} under serializable read-only");

    // Example 4: Driving a session by hand
    println!("\n--- Example 4: Manual Session ---");
    manual_session_example(&executor).await?;
    println!("Store finished with {} accounts", store.count("accounts"));

    Ok(())
}

/// Open a session, inspect mid-transaction state, and commit explicitly.
async fn manual_session_example(executor: &Executor<MemManager>) -> Result<(), Error> {
    let mut session = executor.session().await?;
    println!("Session {} open, state: {}", session.connection_id(), session.state());

    session
        .execute("insert accounts ?", &[Value::from("carol")])
        .await?;
    let row = session.query_opt("count accounts", &[]).await?.unwrap();
    let count: i64 = row.try_get(0)?;
    println!("This transaction sees {count} accounts before commit");

    session.commit().await?;
    println!("Committed, state: {}", session.state());
    Ok(())
}
