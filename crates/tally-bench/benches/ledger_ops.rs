//! Criterion micro-benchmarks for raw ledger acquire/release traffic.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tally::Ledger;

/// Benchmark: bump and drop the count on one tracked address.
fn bench_acquire_release_shared(c: &mut Criterion) {
    let ledger = Ledger::new();
    let ptr = Box::into_raw(Box::new(0u64));
    unsafe { ledger.acquire(ptr) };

    c.bench_function("ledger_acquire_release_shared", |b| {
        b.iter(|| {
            let count = unsafe { ledger.acquire(black_box(ptr)) };
            black_box(count);
            let outcome = unsafe { ledger.release(black_box(ptr)) };
            let _ = black_box(outcome);
        });
    });

    unsafe { ledger.release(ptr).unwrap() };
}

/// Benchmark: create and retire an entry per iteration (Box alloc + reclaim).
fn bench_entry_churn(c: &mut Criterion) {
    let ledger = Ledger::new();
    c.bench_function("ledger_entry_churn", |b| {
        b.iter(|| {
            let ptr = Box::into_raw(Box::new(black_box(7u64)));
            unsafe {
                ledger.acquire(ptr);
                let _ = black_box(ledger.release(ptr));
            }
        });
    });
}

/// Benchmark: count lookup against a table of 10K entries.
fn bench_count_lookup_10k(c: &mut Criterion) {
    let ledger = Ledger::new();
    let handles = tally_bench::distinct(&ledger, 10_000);
    let probe = handles[5_000].as_ptr();
    c.bench_function("ledger_count_lookup_10k", |b| {
        b.iter(|| black_box(ledger.count(black_box(probe))));
    });
}

criterion_group!(
    benches,
    bench_acquire_release_shared,
    bench_entry_churn,
    bench_count_lookup_10k
);
criterion_main!(benches);
