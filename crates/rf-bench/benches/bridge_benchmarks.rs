//! Bridge Handoff Benchmarks
//!
//! Round trip of one full block through the worker thread: the second
//! `process_rf_sample_block` call waits until the worker has finished the
//! first, so each iteration covers swap, wake-up, callback and completion.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rf_stream::{FnSampleCallback, RfSampleCallback, SampleBuffer, ThreadedCallbackBridge};

const SAMPLE_RATE: f64 = 10_000_000.0;

fn bench_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge_handoff");

    for &size in &[256usize, 4096] {
        group.throughput(Throughput::Elements(size as u64));

        let cb = FnSampleCallback::new(|_: &mut SampleBuffer, _: &mut SampleBuffer| {});
        let mut bridge = ThreadedCallbackBridge::new(cb, size).unwrap();
        bridge.prepare_for_streaming(SAMPLE_RATE, 1, 1, size).unwrap();

        let mut rx = SampleBuffer::new(1, size);
        let mut tx = SampleBuffer::new(1, size);

        group.bench_with_input(BenchmarkId::new("round_trip", size), &size, |b, &size| {
            b.iter(|| {
                rx.set_num_samples(size);
                bridge.process_rf_sample_block(&mut rx, &mut tx);
            })
        });

        bridge.stop_streaming().unwrap();
    }

    group.finish();
}

criterion_group!(benches, bench_handoff);
criterion_main!(benches);
