//! # Pool Throughput Benchmark
//!
//! Acquire/release must stay O(1) under wave-sized bursts.
//!
//! Run with: `cargo bench --package respawn_core`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use respawn_core::{GenericPool, PoolBuilder, Poolable};

#[derive(Default)]
struct Actor {
    position: [f32; 3],
    visible: bool,
}

impl Poolable for Actor {
    fn activate(&mut self) {
        self.visible = true;
    }

    fn deactivate(&mut self) {
        self.visible = false;
    }
}

fn actor_pool(size: usize, growth: bool) -> GenericPool<Actor> {
    PoolBuilder::new("bench")
        .with_default_factory()
        .initial_size(size)
        .max_size(size)
        .allow_growth(growth)
        .build()
        .expect("valid bench pool")
}

/// Benchmark: acquire then release, steady state.
fn bench_acquire_release(c: &mut Criterion) {
    let mut pool = actor_pool(1024, false);
    c.bench_function("acquire_release_single", |b| {
        b.iter(|| {
            let handle = pool.acquire().expect("pool has room");
            black_box(pool.release(handle));
        });
    });
}

/// Benchmark: drain a whole pool, then return every unit.
fn bench_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("burst");

    for size in [64, 512, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut pool = actor_pool(size, false);
            let mut handles = Vec::with_capacity(size);
            b.iter(|| {
                for _ in 0..size {
                    if let Some(handle) = pool.acquire() {
                        handles.push(handle);
                    }
                }
                for handle in handles.drain(..) {
                    pool.release(handle);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark: every acquire at capacity is a forced reclaim.
fn bench_forced_reclaim(c: &mut Criterion) {
    let mut pool = actor_pool(256, false);
    for _ in 0..256 {
        pool.acquire();
    }
    c.bench_function("forced_reclaim", |b| {
        b.iter(|| {
            let handle = pool.acquire().expect("reclaim always succeeds");
            if let Some(actor) = pool.get_mut(handle) {
                actor.position = black_box([1.0, 0.0, 1.0]);
            }
        });
    });
}

criterion_group!(benches, bench_acquire_release, bench_burst, bench_forced_reclaim);
criterion_main!(benches);
