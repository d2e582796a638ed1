//! rf-core: Shared sample types for the RF streaming crates
//!
//! Provides the IQ sample type, the fixed-shape multi-channel
//! [`SampleBuffer`] exchanged between hardware and processing threads, and the
//! core error type.

mod error;
mod sample;

pub use error::*;
pub use sample::*;

/// Validate a sample rate in Hz.
///
/// Must be finite and strictly positive.
pub fn check_sample_rate(sample_rate: f64) -> RfResult<f64> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(sample_rate)
    } else {
        Err(RfError::InvalidSampleRate(sample_rate))
    }
}

/// Duration of `num_samples` at `sample_rate`, in seconds
#[inline]
pub fn samples_to_seconds(num_samples: usize, sample_rate: f64) -> f64 {
    num_samples as f64 / sample_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_sample_rate() {
        assert!(check_sample_rate(48_000.0).is_ok());
        assert!(check_sample_rate(0.0).is_err());
        assert!(check_sample_rate(-1.0).is_err());
        assert!(check_sample_rate(f64::NAN).is_err());
        assert!(check_sample_rate(f64::INFINITY).is_err());
    }

    #[test]
    fn test_samples_to_seconds() {
        let secs = samples_to_seconds(256, 48_000.0);
        assert!((secs - 0.005_333).abs() < 1e-5);
    }
}
