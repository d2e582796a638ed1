//! Test data generators for benchmarks

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rf_core::{IqSample, SampleBuffer};

/// Generate reproducible complex noise in [-1, 1) on both components
pub fn generate_iq_noise(size: usize, seed: u64) -> Vec<IqSample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..size)
        .map(|_| {
            IqSample::new(
                rng.random::<f32>() * 2.0 - 1.0,
                rng.random::<f32>() * 2.0 - 1.0,
            )
        })
        .collect()
}

/// Generate a complex tone at `freq` Hz (negative for the lower sideband)
pub fn generate_tone(size: usize, freq: f64, sample_rate: f64) -> Vec<IqSample> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate;
            IqSample::new(phase.cos() as f32, phase.sin() as f32)
        })
        .collect()
}

/// Full buffer of reproducible noise, one seed per channel
pub fn generate_iq_buffer(num_channels: usize, capacity: usize, seed: u64) -> SampleBuffer {
    let mut buffer = SampleBuffer::new(num_channels, capacity);
    buffer.set_num_samples(capacity);
    for ch in 0..num_channels {
        let noise = generate_iq_noise(capacity, seed.wrapping_add(ch as u64));
        buffer.channel_mut(ch).copy_from_slice(&noise);
    }
    buffer
}

/// Common block sizes for benchmarks
pub const BLOCK_SIZES: &[usize] = &[64, 256, 1024, 4096, 16384];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reproducibility() {
        let a = generate_iq_noise(100, 42);
        let b = generate_iq_noise(100, 42);
        assert_eq!(a, b);
        assert_ne!(a, generate_iq_noise(100, 43));
    }

    #[test]
    fn test_tone_unit_magnitude() {
        let tone = generate_tone(1024, 1000.0, 48_000.0);
        assert!(tone.iter().all(|s| (s.norm() - 1.0).abs() < 1e-4));
    }

    #[test]
    fn test_buffer_is_full() {
        let buf = generate_iq_buffer(2, 256, 7);
        assert!(buf.is_full());
        assert_ne!(buf.channel(0), buf.channel(1));
    }
}
