//! Measurement Overhead Benchmarks
//!
//! Cost a scoped timer adds to the processing hot path.

use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rf_stream::{LightweightProcessingTimeMeasurement, ProcessingTimeMeasurement, SyncPoint};

fn bench_scope_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_overhead");

    group.bench_function("instant_pair", |b| {
        b.iter(|| {
            let start = Instant::now();
            black_box(start.elapsed())
        })
    });

    let threaded = ProcessingTimeMeasurement::new(u64::MAX, |_| {}).unwrap();
    group.bench_function("threaded_scope", |b| {
        b.iter(|| {
            let _scope = threaded.scope(black_box(256));
        })
    });

    let mut lightweight = LightweightProcessingTimeMeasurement::new(u64::MAX, |_| {}).unwrap();
    group.bench_function("lightweight_scope", |b| {
        b.iter(|| {
            let _scope = lightweight.scope(black_box(256));
        })
    });

    group.finish();
}

fn bench_sync_point(c: &mut Criterion) {
    let sync = SyncPoint::new();

    c.bench_function("sync_point_signal_wait", |b| {
        b.iter(|| {
            sync.signal();
            black_box(sync.wait_for_signal(None))
        })
    });
}

criterion_group!(benches, bench_scope_overhead, bench_sync_point);
criterion_main!(benches);
