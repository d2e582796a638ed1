use std::time::Instant;

use super::{Accumulator, LoadReport, ReportCallback, budget_micros_per_sample};
use crate::error::check_sample_rate;
use crate::{StreamError, StreamResult};

/// Single-thread processing-time measurement.
///
/// Same scoped contract as [`ProcessingTimeMeasurement`](super::ProcessingTimeMeasurement)
/// with no lock and no polling thread. Reports are produced inline on the
/// measuring thread: when a scope drop brings the accumulated count to the
/// threshold, and once more for the remainder in
/// [`processing_ends`](Self::processing_ends).
pub struct LightweightProcessingTimeMeasurement {
    samples_to_average: u64,
    budget: Option<f64>,
    accumulator: Accumulator,
    callback: ReportCallback,
}

impl LightweightProcessingTimeMeasurement {
    pub fn new<F>(samples_to_average: u64, callback: F) -> StreamResult<Self>
    where
        F: FnMut(LoadReport) + Send + 'static,
    {
        if samples_to_average == 0 {
            return Err(StreamError::InvalidConfig(
                "samples_to_average must be at least 1".into(),
            ));
        }
        Ok(Self {
            samples_to_average,
            budget: None,
            accumulator: Accumulator::default(),
            callback: Box::new(callback),
        })
    }

    pub fn samples_to_average(&self) -> u64 {
        self.samples_to_average
    }

    pub fn is_running(&self) -> bool {
        self.budget.is_some()
    }

    pub fn processing_starts(&mut self, sample_rate: f64) -> StreamResult<()> {
        let sample_rate = check_sample_rate(sample_rate)?;
        if self.budget.is_some() {
            return Err(StreamError::AlreadyStreaming);
        }
        self.budget = Some(budget_micros_per_sample(sample_rate));
        self.accumulator = Accumulator::default();
        Ok(())
    }

    /// End the session, reporting whatever has accumulated since the last
    /// report. Nothing is reported if no samples were timed.
    pub fn processing_ends(&mut self) -> StreamResult<()> {
        let Some(budget) = self.budget.take() else {
            return Err(StreamError::NotStreaming);
        };
        let remainder = self.accumulator.take();
        if let Some(report) = remainder.report(budget) {
            (self.callback)(report);
        }
        Ok(())
    }

    #[inline]
    pub fn scope(&mut self, num_samples: usize) -> LightweightScope<'_> {
        LightweightScope {
            owner: self,
            num_samples: num_samples as u64,
            start: Instant::now(),
        }
    }

    pub fn accumulated(&self) -> Accumulator {
        self.accumulator
    }

    fn record(&mut self, scope_start: Instant, num_samples: u64) {
        self.accumulator.add(scope_start.elapsed(), num_samples);

        let Some(budget) = self.budget else {
            return;
        };
        if self.accumulator.num_samples >= self.samples_to_average {
            let window = self.accumulator.take();
            if let Some(report) = window.report(budget) {
                (self.callback)(report);
            }
        }
    }
}

/// RAII timer returned by [`LightweightProcessingTimeMeasurement::scope`]
#[must_use = "the region is timed until the scope is dropped"]
pub struct LightweightScope<'a> {
    owner: &'a mut LightweightProcessingTimeMeasurement,
    num_samples: u64,
    start: Instant,
}

impl Drop for LightweightScope<'_> {
    #[inline]
    fn drop(&mut self) {
        self.owner.record(self.start, self.num_samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn collecting(samples_to_average: u64) -> (LightweightProcessingTimeMeasurement, Arc<Mutex<Vec<LoadReport>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let m = LightweightProcessingTimeMeasurement::new(samples_to_average, move |r| {
            sink.lock().push(r);
        })
        .unwrap();
        (m, reports)
    }

    #[test]
    fn test_scope_accumulates() {
        let (mut m, reports) = collecting(10_000);
        {
            let _scope = m.scope(100);
            thread::sleep(Duration::from_millis(2));
        }
        let acc = m.accumulated();
        assert_eq!(acc.num_samples, 100);
        assert!(acc.elapsed() >= Duration::from_millis(2));
        assert!(reports.lock().is_empty());
    }

    #[test]
    fn test_threshold_reports_inline() {
        let (mut m, reports) = collecting(1000);
        m.processing_starts(48_000.0).unwrap();

        drop(m.scope(600));
        assert!(reports.lock().is_empty());

        drop(m.scope(400));
        {
            let reports = reports.lock();
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].samples_averaged, 1000);
        }
        assert_eq!(m.accumulated(), Accumulator::default());

        m.processing_ends().unwrap();
        assert_eq!(reports.lock().len(), 1);
    }

    #[test]
    fn test_end_reports_remainder() {
        let (mut m, reports) = collecting(1000);
        m.processing_starts(48_000.0).unwrap();
        drop(m.scope(400));
        m.processing_ends().unwrap();

        let reports = reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].samples_averaged, 400);
    }

    #[test]
    fn test_lifecycle_errors() {
        let (mut m, _reports) = collecting(1000);
        assert!(matches!(m.processing_ends(), Err(StreamError::NotStreaming)));
        m.processing_starts(48_000.0).unwrap();
        assert!(matches!(
            m.processing_starts(48_000.0),
            Err(StreamError::AlreadyStreaming)
        ));
        assert!(LightweightProcessingTimeMeasurement::new(0, |_| {}).is_err());
    }
}
