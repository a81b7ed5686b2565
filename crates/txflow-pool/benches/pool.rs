//! Benchmarks for pool checkout hot paths.

#![allow(missing_docs, clippy::unwrap_used)]

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use tokio::runtime::Runtime;
use txflow_pool::{Pool, PoolConfig};
use txflow_testing::MemManager;

/// Benchmark reusing an idle connection, with and without the liveness probe.
fn bench_acquire_release(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("acquire_release");

    let probed = Pool::new(
        MemManager::new(),
        PoolConfig::new().max_size(4).pool_timeout(Duration::from_secs(1)),
    )
    .unwrap();
    rt.block_on(probed.warm(1)).unwrap();
    group.bench_function("hot_with_probe", |b| {
        b.to_async(&rt).iter(|| async {
            let conn = probed.acquire().await.unwrap();
            black_box(conn.id());
        })
    });

    let unprobed = Pool::new(
        MemManager::new(),
        PoolConfig::new()
            .max_size(4)
            .pool_timeout(Duration::from_secs(1))
            .pre_ping(false),
    )
    .unwrap();
    rt.block_on(unprobed.warm(1)).unwrap();
    group.bench_function("hot_without_probe", |b| {
        b.to_async(&rt).iter(|| async {
            let conn = unprobed.acquire().await.unwrap();
            black_box(conn.id());
        })
    });

    group.finish();
}

/// Benchmark the stats snapshot, which tests and dashboards poll.
fn bench_stats_snapshot(c: &mut Criterion) {
    let pool = Pool::new(MemManager::new(), PoolConfig::new()).unwrap();
    c.bench_function("stats_snapshot", |b| {
        b.iter(|| black_box(pool.stats()))
    });
}

criterion_group!(benches, bench_acquire_release, bench_stats_snapshot);
criterion_main!(benches);
