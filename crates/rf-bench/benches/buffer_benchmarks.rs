//! Sample Buffer Benchmarks
//!
//! Handoff cost of the two ways to move a block between threads: swapping
//! storage handles versus copying samples. Plus chunked accumulation as a
//! hardware thread does it.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rf_bench::{generate_iq_buffer, generate_iq_noise, BLOCK_SIZES};
use rf_core::{IqSample, SampleBuffer};

const CHANNELS: usize = 2;

/// Benchmark storage swap against per-sample copy
fn bench_block_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_handoff");

    for &size in BLOCK_SIZES {
        // Complex32 = 8 bytes
        group.throughput(Throughput::Bytes((size * CHANNELS * 8) as u64));

        let mut hardware = generate_iq_buffer(CHANNELS, size, 42);
        let mut worker = SampleBuffer::new(CHANNELS, size);

        group.bench_with_input(BenchmarkId::new("swap", size), &size, |b, _| {
            b.iter(|| {
                hardware.swap_with(black_box(&mut worker));
                black_box(&hardware);
            })
        });

        group.bench_with_input(BenchmarkId::new("copy", size), &size, |b, _| {
            b.iter(|| {
                worker.copy_from(black_box(&hardware));
                black_box(&worker);
            })
        });

        group.bench_with_input(BenchmarkId::new("clone", size), &size, |b, _| {
            b.iter(|| black_box(hardware.clone()))
        });
    }

    group.finish();
}

/// Benchmark filling a block from driver-sized chunks
fn bench_chunked_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_append");
    let block = 4096;

    for &chunk in &[64usize, 256, 1024] {
        group.throughput(Throughput::Elements(block as u64));

        let sources: Vec<Vec<IqSample>> = (0..CHANNELS)
            .map(|ch| generate_iq_noise(chunk, ch as u64))
            .collect();
        let mut buffer = SampleBuffer::new(CHANNELS, block);

        group.bench_with_input(BenchmarkId::new("append", chunk), &chunk, |b, _| {
            b.iter(|| {
                buffer.clear();
                while !buffer.is_full() {
                    let slices: Vec<&[IqSample]> = sources.iter().map(|s| s.as_slice()).collect();
                    buffer.append(black_box(&slices));
                }
                black_box(&buffer);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_block_handoff, bench_chunked_append);
criterion_main!(benches);
