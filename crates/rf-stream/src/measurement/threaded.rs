use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{Accumulator, LoadReport, ReportCallback, SpinLock, budget_micros_per_sample};
use crate::error::check_sample_rate;
use crate::thread_priority::set_background_priority;
use crate::{MeasurementConfig, StreamError, StreamResult, SyncPoint};

/// Thread-safe processing-time measurement.
///
/// Any number of threads may time regions with [`scope`](Self::scope). A
/// low-priority polling thread wakes once per reporting period and, once the
/// configured number of samples has been accumulated, delivers a
/// [`LoadReport`] to the result callback. The callback only ever runs on the
/// polling thread.
pub struct ProcessingTimeMeasurement {
    config: MeasurementConfig,
    accumulator: Arc<SpinLock<Accumulator>>,
    callback: Arc<Mutex<ReportCallback>>,
    poller: Mutex<Option<Poller>>,
}

struct Poller {
    handle: JoinHandle<()>,
    stop: Arc<SyncPoint>,
    exited: Arc<SyncPoint>,
    shutdown_timeout: Duration,
}

impl ProcessingTimeMeasurement {
    /// Create a measurement reporting every `samples_to_average` samples
    pub fn new<F>(samples_to_average: u64, callback: F) -> StreamResult<Self>
    where
        F: FnMut(LoadReport) + Send + 'static,
    {
        Self::with_config(MeasurementConfig::with_samples_to_average(samples_to_average), callback)
    }

    pub fn with_config<F>(config: MeasurementConfig, callback: F) -> StreamResult<Self>
    where
        F: FnMut(LoadReport) + Send + 'static,
    {
        config.validate()?;
        Ok(Self {
            config,
            accumulator: Arc::new(SpinLock::new(Accumulator::default())),
            callback: Arc::new(Mutex::new(Box::new(callback))),
            poller: Mutex::new(None),
        })
    }

    pub fn samples_to_average(&self) -> u64 {
        self.config.samples_to_average
    }

    /// Whether the polling thread is running
    pub fn is_running(&self) -> bool {
        self.poller.lock().is_some()
    }

    /// Start a session at `sample_rate` and launch the polling thread
    pub fn processing_starts(&self, sample_rate: f64) -> StreamResult<()> {
        let sample_rate = check_sample_rate(sample_rate)?;

        let mut poller = self.poller.lock();
        if poller.is_some() {
            return Err(StreamError::AlreadyStreaming);
        }

        let budget = budget_micros_per_sample(sample_rate);
        let period = Duration::try_from_secs_f64(self.config.samples_to_average as f64 / sample_rate)
            .map_err(|_| {
                StreamError::InvalidConfig(format!(
                    "reporting period of {} samples at {} Hz is out of range",
                    self.config.samples_to_average, sample_rate
                ))
            })?;
        let shutdown_timeout = period
            .saturating_mul(2)
            .max(Duration::from_millis(self.config.min_shutdown_timeout_ms));

        // Scopes timed outside a session are not part of it
        self.accumulator.lock().take();

        let stop = Arc::new(SyncPoint::new());
        let exited = Arc::new(SyncPoint::new());

        let job = PollingJob {
            accumulator: Arc::clone(&self.accumulator),
            callback: Arc::clone(&self.callback),
            stop: Arc::clone(&stop),
            exited: Arc::clone(&exited),
            threshold: self.config.samples_to_average,
            budget,
            period,
        };

        let handle = thread::Builder::new()
            .name("rf-load-poller".into())
            .spawn(move || job.run())
            .map_err(|e| StreamError::ThreadSpawn(e.to_string()))?;

        log::info!(
            "Processing time measurement started: {:.3} us/sample budget, reporting every {:?}",
            budget,
            period
        );

        *poller = Some(Poller {
            handle,
            stop,
            exited,
            shutdown_timeout,
        });
        Ok(())
    }

    /// Stop the polling thread. The remainder accumulated since the last
    /// report is delivered in one final report before the thread exits.
    pub fn processing_ends(&self) -> StreamResult<()> {
        let Some(poller) = self.poller.lock().take() else {
            return Err(StreamError::NotStreaming);
        };

        poller.stop.signal();
        if !poller.exited.wait_for_signal(Some(poller.shutdown_timeout)) {
            log::error!(
                "Load polling thread did not exit within {:?}, detaching",
                poller.shutdown_timeout
            );
            return Err(StreamError::ShutdownTimeout {
                thread: "load polling",
                timeout: poller.shutdown_timeout,
            });
        }

        if poller.handle.join().is_err() {
            log::error!("Load polling thread panicked");
        }
        log::info!("Processing time measurement stopped");
        Ok(())
    }

    /// Time a region covering `num_samples` samples. Accumulation happens
    /// when the returned guard is dropped.
    #[inline]
    pub fn scope(&self, num_samples: usize) -> MeasurementScope<'_> {
        MeasurementScope {
            accumulator: &self.accumulator,
            num_samples: num_samples as u64,
            start: Instant::now(),
        }
    }

    /// Totals accumulated since the last report
    pub fn accumulated(&self) -> Accumulator {
        *self.accumulator.lock()
    }
}

impl Drop for ProcessingTimeMeasurement {
    fn drop(&mut self) {
        if self.poller.get_mut().is_some() {
            let _ = self.processing_ends();
        }
    }
}

/// RAII timer returned by [`ProcessingTimeMeasurement::scope`]
#[must_use = "the region is timed until the scope is dropped"]
pub struct MeasurementScope<'a> {
    accumulator: &'a SpinLock<Accumulator>,
    num_samples: u64,
    start: Instant,
}

impl Drop for MeasurementScope<'_> {
    #[inline]
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.accumulator.lock().add(elapsed, self.num_samples);
    }
}

struct PollingJob {
    accumulator: Arc<SpinLock<Accumulator>>,
    callback: Arc<Mutex<ReportCallback>>,
    stop: Arc<SyncPoint>,
    exited: Arc<SyncPoint>,
    threshold: u64,
    budget: f64,
    period: Duration,
}

impl PollingJob {
    fn run(self) {
        let _ = set_background_priority();

        while !self.stop.wait_for_signal(Some(self.period)) {
            let window = {
                let mut acc = self.accumulator.lock();
                if acc.num_samples >= self.threshold {
                    Some(acc.take())
                } else {
                    None
                }
            };
            if let Some(window) = window {
                self.deliver(window);
            }
        }

        let remainder = self.accumulator.lock().take();
        self.deliver(remainder);
        self.exited.signal();
    }

    fn deliver(&self, window: Accumulator) {
        if let Some(report) = window.report(self.budget) {
            log::debug!("Processing load: {}", report);
            let mut callback = self.callback.lock();
            (*callback)(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn collecting(samples_to_average: u64) -> (ProcessingTimeMeasurement, mpsc::Receiver<LoadReport>) {
        let (tx, rx) = mpsc::channel();
        let m = ProcessingTimeMeasurement::new(samples_to_average, move |r| {
            let _ = tx.send(r);
        })
        .unwrap();
        (m, rx)
    }

    #[test]
    fn test_scope_accumulates_elapsed_and_samples() {
        let (m, _rx) = collecting(1_000_000);
        let delay = Duration::from_millis(5);

        let before = m.accumulated();
        {
            let _scope = m.scope(480);
            thread::sleep(delay);
        }
        let after = m.accumulated();

        assert!(after.elapsed() >= before.elapsed() + delay);
        assert_eq!(after.num_samples, before.num_samples + 480);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(ProcessingTimeMeasurement::new(0, |_| {}).is_err());
    }

    #[test]
    fn test_start_twice_fails() {
        let (m, _rx) = collecting(1000);
        m.processing_starts(48_000.0).unwrap();
        assert!(matches!(
            m.processing_starts(48_000.0),
            Err(StreamError::AlreadyStreaming)
        ));
        m.processing_ends().unwrap();
        assert!(matches!(m.processing_ends(), Err(StreamError::NotStreaming)));
    }

    #[test]
    fn test_invalid_sample_rate() {
        let (m, _rx) = collecting(1000);
        assert!(matches!(
            m.processing_starts(0.0),
            Err(StreamError::InvalidSampleRate(_))
        ));
        assert!(!m.is_running());
    }

    #[test]
    fn test_no_final_report_when_idle() {
        let (m, rx) = collecting(1000);
        m.processing_starts(48_000.0).unwrap();
        m.processing_ends().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_session_ignores_samples_timed_before_start() {
        let (m, rx) = collecting(1000);
        drop(m.scope(700));

        m.processing_starts(48_000.0).unwrap();
        drop(m.scope(400));
        m.processing_ends().unwrap();

        let reports: Vec<u64> = rx.try_iter().map(|r| r.samples_averaged).collect();
        assert_eq!(reports, vec![400]);
    }

    #[test]
    fn test_huge_reporting_period_still_stops() {
        let (m, rx) = collecting(1_000_000_000_000_000_000);
        m.processing_starts(1.0).unwrap();
        drop(m.scope(10));
        m.processing_ends().unwrap();
        assert_eq!(rx.try_recv().unwrap().samples_averaged, 10);
    }
}
