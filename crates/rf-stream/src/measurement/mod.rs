//! Processing-time measurement.
//!
//! Scoped timers wrap the processing hot path and accumulate elapsed time and
//! sample counts. Once enough samples have been averaged, a [`LoadReport`] is
//! delivered to a caller-supplied callback.
//!
//! ```text
//!  hot path                              reporting
//!  ────────                              ─────────
//!  scope(n) ──drop──▶ Accumulator ──▶ polling thread ──▶ callback   (ProcessingTimeMeasurement)
//!  scope(n) ──drop──▶ Accumulator ──────────────────────▶ callback   (Lightweight, same thread)
//! ```

mod lightweight;
mod spin;
mod threaded;

use std::fmt;
use std::time::Duration;

pub use lightweight::*;
pub use spin::{SpinLock, SpinLockGuard};
pub use threaded::*;

/// Caller-supplied sink for load reports
pub type ReportCallback = Box<dyn FnMut(LoadReport) + Send + 'static>;

/// Aggregate processing load over an averaging window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadReport {
    /// Average processing time per sample (µs)
    pub micros_per_sample: f64,
    /// Processing time as a percentage of the real-time budget
    pub percent_load: f64,
    /// Number of samples the averages cover
    pub samples_averaged: u64,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4} us/sample, {:.2}% load ({} samples)",
            self.micros_per_sample, self.percent_load, self.samples_averaged
        )
    }
}

/// Running totals between two reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator {
    pub elapsed_nanos: u64,
    pub num_samples: u64,
}

impl Accumulator {
    #[inline]
    pub fn add(&mut self, elapsed: Duration, num_samples: u64) {
        self.elapsed_nanos = self
            .elapsed_nanos
            .saturating_add(elapsed.as_nanos().min(u64::MAX as u128) as u64);
        self.num_samples = self.num_samples.saturating_add(num_samples);
    }

    /// Return the totals and reset to zero
    #[inline]
    pub fn take(&mut self) -> Accumulator {
        std::mem::take(self)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos)
    }

    /// Build a report against a per-sample budget in µs.
    ///
    /// Returns `None` if nothing was accumulated.
    pub fn report(&self, budget_micros_per_sample: f64) -> Option<LoadReport> {
        if self.num_samples == 0 {
            return None;
        }
        let micros_per_sample = self.elapsed_nanos as f64 / 1000.0 / self.num_samples as f64;
        let percent_load = if budget_micros_per_sample > 0.0 {
            micros_per_sample / budget_micros_per_sample * 100.0
        } else {
            0.0
        };
        Some(LoadReport {
            micros_per_sample,
            percent_load,
            samples_averaged: self.num_samples,
        })
    }
}

/// Real-time budget per sample (µs) at `sample_rate`
#[inline]
pub fn budget_micros_per_sample(sample_rate: f64) -> f64 {
    1_000_000.0 / sample_rate
}
