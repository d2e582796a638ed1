//! Bridge load profile
//!
//! Drives a paced simulated radio through the threaded bridge with a
//! configurable amount of busy work per block and logs the measured load.
//!
//! Usage: cargo run -p rf-bench --example bridge_profile --release -- --work-us 300

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rf_bench::{spin_for, ThroughputMetrics};
use rf_stream::{
    FnSampleCallback, ProcessingTimeMeasurement, SampleBuffer, SimulatedEngine,
    SimulatedEngineConfig, ThreadedCallbackBridge,
};

#[derive(Parser, Debug)]
#[command(about = "Profile the threaded callback bridge against a simulated radio")]
struct Args {
    /// Sample rate in Hz
    #[arg(long, default_value_t = 2_048_000.0)]
    sample_rate: f64,

    /// Block size the user callback sees
    #[arg(long, default_value_t = 4096)]
    block_size: usize,

    /// Samples the simulated driver delivers per period
    #[arg(long, default_value_t = 512)]
    chunk_size: usize,

    /// Receive channels
    #[arg(long, default_value_t = 1)]
    rx: usize,

    /// Transmit channels
    #[arg(long, default_value_t = 0)]
    tx: usize,

    /// Run time in seconds
    #[arg(long, default_value_t = 3.0)]
    seconds: f64,

    /// Busy work per block in microseconds
    #[arg(long, default_value_t = 200)]
    work_us: u64,

    /// Samples per load report
    #[arg(long, default_value_t = 1_000_000)]
    average: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.seconds <= 0.0 {
        bail!("--seconds must be positive");
    }

    let measurement = Arc::new(
        ProcessingTimeMeasurement::new(args.average, |report| {
            log::info!("load: {report}");
        })
        .context("creating load measurement")?,
    );

    let work = Duration::from_micros(args.work_us);
    let callback = FnSampleCallback::new(move |rx: &mut SampleBuffer, _tx: &mut SampleBuffer| {
        spin_for(work);
        std::hint::black_box(rx.num_samples());
    });

    let bridge = ThreadedCallbackBridge::new(callback, args.block_size)?
        .with_measurement(Arc::clone(&measurement));
    let stats = bridge.stats_handle();

    let mut engine = SimulatedEngine::new(SimulatedEngineConfig {
        sample_rate: args.sample_rate,
        block_size: args.block_size,
        chunk_size: args.chunk_size,
        num_rx_channels: args.rx,
        num_tx_channels: args.tx,
        paced: true,
        max_samples: Some((args.sample_rate * args.seconds) as u64),
        realtime_priority: true,
    })?;

    println!("Profiling bridge: {args:?}");
    let start = Instant::now();
    engine.start(bridge).context("starting simulated engine")?;
    engine.wait().context("waiting for simulated engine")?;
    let elapsed = start.elapsed();

    let bridge_stats = stats.snapshot();
    let counters = engine.counters();
    let processed = bridge_stats.blocks_forwarded as usize * args.block_size;
    let metrics = ThroughputMetrics::from_benchmark(processed, elapsed, args.sample_rate);

    println!("Bridge:   {bridge_stats:?}");
    println!("Hardware: {counters:?}");
    println!("Delivery: {}", metrics.summary());

    if bridge_stats.deadline_misses > 0 {
        println!(
            "{} deadline misses: {}us of work per {}-sample block is over budget",
            bridge_stats.deadline_misses, args.work_us, args.block_size
        );
    }

    Ok(())
}
