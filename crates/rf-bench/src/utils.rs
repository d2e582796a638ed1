//! Benchmark utilities

use std::time::{Duration, Instant};

/// Throughput of a block-processing loop
#[derive(Debug, Clone)]
pub struct ThroughputMetrics {
    /// Samples per channel processed per second
    pub samples_per_sec: f64,
    /// Time per sample in nanoseconds
    pub ns_per_sample: f64,
    /// Real-time ratio (>1.0 means faster than the radio delivers)
    pub realtime_ratio: f64,
    /// Time spent per block
    pub block_time_us: f64,
}

impl ThroughputMetrics {
    /// Metrics for `samples` processed in `duration` at `sample_rate`
    pub fn from_benchmark(samples: usize, duration: Duration, sample_rate: f64) -> Self {
        let secs = duration.as_secs_f64();
        let samples_per_sec = samples as f64 / secs;

        Self {
            samples_per_sec,
            ns_per_sample: duration.as_nanos() as f64 / samples as f64,
            realtime_ratio: samples_per_sec / sample_rate,
            block_time_us: secs * 1_000_000.0,
        }
    }

    pub fn is_realtime(&self) -> bool {
        self.realtime_ratio > 1.0
    }

    pub fn summary(&self) -> String {
        format!(
            "{:.2} MS/s ({:.1}ns/sample), {:.1}x realtime, {:.2}us/block",
            self.samples_per_sec / 1_000_000.0,
            self.ns_per_sample,
            self.realtime_ratio,
            self.block_time_us
        )
    }
}

/// Average duration of `f` over `iterations` runs, after a short warmup
pub fn time_average<F>(iterations: usize, mut f: F) -> Duration
where
    F: FnMut(),
{
    for _ in 0..10 {
        f();
    }

    let start = Instant::now();
    for _ in 0..iterations {
        f();
    }
    average_duration(start.elapsed(), iterations)
}

/// `total` split evenly over `iterations` (at least one)
pub fn average_duration(total: Duration, iterations: usize) -> Duration {
    Duration::from_secs_f64(total.as_secs_f64() / iterations.max(1) as f64)
}

/// Busy-wait for `duration` (simulated processing work)
pub fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_metrics() {
        let metrics = ThroughputMetrics::from_benchmark(1_000_000, Duration::from_millis(10), 1_000_000.0);
        assert!((metrics.realtime_ratio - 100.0).abs() < 1e-6);
        assert!(metrics.is_realtime());
        assert!(metrics.summary().contains("realtime"));
    }

    #[test]
    fn test_throughput_not_realtime() {
        let metrics = ThroughputMetrics::from_benchmark(1, Duration::from_secs(1), 1_000_000.0);
        assert!(!metrics.is_realtime());
    }

    #[test]
    fn test_spin_for_waits() {
        let start = Instant::now();
        spin_for(Duration::from_millis(2));
        assert!(start.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn test_time_average_runs() {
        let mut calls = 0usize;
        let _ = time_average(5, || calls += 1);
        assert_eq!(calls, 15);
    }

    #[test]
    fn test_average_duration_beyond_u32_iterations() {
        let iterations = u32::MAX as usize + 2;
        let avg = average_duration(Duration::from_secs(iterations as u64), iterations);
        assert!((avg.as_secs_f64() - 1.0).abs() < 1e-6);
        assert_eq!(average_duration(Duration::from_millis(5), 0), Duration::from_millis(5));
    }
}
