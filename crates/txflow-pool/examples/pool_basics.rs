//! Pool checkout, overflow, and counters walkthrough.
//!
//! Runs against the in-memory backend, so no database is needed.
//!
//! # Running
//!
//! ```bash
//! cargo run -p txflow-pool --example pool_basics
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use txflow_backend::Connection;
use txflow_pool::{Pool, PoolConfig};
use txflow_testing::TestBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Connection Pool Example ===\n");

    let backend = TestBackend::new();
    let config = PoolConfig::new()
        .max_size(2)
        .max_overflow(2)
        .pool_timeout(Duration::from_secs(5));

    println!("Pool configuration:");
    println!("  Max size: {}", config.max_size);
    println!("  Max overflow: {}", config.max_overflow);
    println!("  Pool timeout: {:?}", config.pool_timeout);
    println!();

    let pool = Pool::new(backend.manager.clone(), config)?;
    pool.warm(2).await?;

    // Example 1: Basic checkout
    println!("1. Basic checkout:");
    {
        let mut conn = pool.acquire().await?;
        conn.execute("insert greetings hello", &[]).await?;
        let rows = conn.query("select greetings", &[]).await?;
        for row in &rows {
            let id: i64 = row.try_get(0)?;
            let value: String = row.try_get(1)?;
            println!("  row {id}: {value}");
        }
        // Connection is automatically returned to pool when dropped
    }
    print_stats(&pool);

    // Example 2: Overflow connections live only while checked out
    println!("\n2. Overflow beyond max_size:");
    {
        let _a = pool.acquire().await?;
        let _b = pool.acquire().await?;
        let _c = pool.acquire().await?;
        println!("  3 connections out with max_size 2");
        print_stats(&pool);
    }
    println!("  ...all returned, overflow destroyed");
    print_stats(&pool);

    pool.dispose();
    println!("\nPool disposed.");
    print_stats(&pool);

    Ok(())
}

fn print_stats<M: txflow_backend::ConnectionManager>(pool: &Pool<M>) {
    let stats = pool.stats();
    println!(
        "  [stats] idle={} in_use={} created={} destroyed={}",
        stats.idle, stats.in_use, stats.created, stats.destroyed
    );
}
