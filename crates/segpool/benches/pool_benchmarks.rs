//! Pool suballocator benchmarks
//!
//! Compares the gap-selection policies across workloads, with the system
//! allocator as a baseline.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use segpool::{AllocPolicy, PoolConfig, PoolManager};
use std::hint::black_box;

const POOL_SIZE: usize = 1024 * 1024;

/// Benchmark a single carve/release cycle
fn bench_carve_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("carve_release");

    for (name, policy) in [
        ("best_fit_64b", AllocPolicy::BestFit),
        ("first_fit_64b", AllocPolicy::FirstFit),
    ] {
        group.bench_function(name, |b| {
            let mut pool =
                PoolManager::open_with_config(POOL_SIZE, policy, PoolConfig::production()).unwrap();

            b.iter(|| {
                let ptr = pool.allocate(64).unwrap();
                pool.free(black_box(ptr)).unwrap();
            });
        });
    }

    // System allocator (baseline)
    group.bench_function("system_64b", |b| {
        let layout = std::alloc::Layout::from_size_align(64, 8).unwrap();

        b.iter(|| unsafe {
            let ptr = std::alloc::alloc(layout);
            std::alloc::dealloc(ptr, layout);
            black_box(ptr);
        });
    });

    group.finish();
}

/// Benchmark churn on a fragmented pool: fill with mixed sizes, free every
/// other block, then refill the holes.
fn bench_fragmentation_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmentation_churn");
    group.throughput(Throughput::Elements(128));

    for (name, policy) in [
        ("best_fit", AllocPolicy::BestFit),
        ("first_fit", AllocPolicy::FirstFit),
    ] {
        group.bench_function(name, |b| {
            let mut pool =
                PoolManager::open_with_config(POOL_SIZE, policy, PoolConfig::production()).unwrap();

            b.iter(|| {
                let mut blocks = Vec::with_capacity(128);
                for i in 0..128usize {
                    let size = 64 + (i % 7) * 32;
                    blocks.push((pool.allocate(size).unwrap(), size));
                }

                // Punch holes, refill them with smaller blocks, then
                // return everything.
                let mut refills = Vec::with_capacity(64);
                for (ptr, _) in blocks.iter().step_by(2) {
                    pool.free(*ptr).unwrap();
                }
                for _ in 0..64 {
                    refills.push(pool.allocate(48).unwrap());
                }

                for ptr in refills {
                    pool.free(ptr).unwrap();
                }
                for (ptr, _) in blocks.iter().skip(1).step_by(2) {
                    pool.free(*ptr).unwrap();
                }
                black_box(pool.num_gaps());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_carve_release, bench_fragmentation_churn);
criterion_main!(benches);
