//! Sample types and multi-channel IQ buffer definitions

use num_complex::Complex32;

use crate::{RfError, RfResult};

/// One complex baseband sample (in-phase + quadrature)
pub type IqSample = Complex32;

/// Zero-valued IQ sample
pub const IQ_ZERO: IqSample = Complex32::new(0.0, 0.0);

/// Fixed shape of a [`SampleBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferShape {
    pub num_channels: usize,
    pub capacity: usize,
}

impl BufferShape {
    #[inline]
    pub const fn new(num_channels: usize, capacity: usize) -> Self {
        Self {
            num_channels,
            capacity,
        }
    }
}

/// Multi-channel IQ sample buffer.
///
/// Storage is one contiguous channel-major allocation of
/// `num_channels * capacity` samples. Channel count and capacity are fixed at
/// construction; the only mutable sizing field is the valid sample count,
/// which is always `<= capacity`.
///
/// The valid count doubles as a cursor. A receive path appends into the buffer
/// until it is full, a transmit path uses it to track how many samples the
/// consumer has drained.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    data: Vec<IqSample>,
    num_channels: usize,
    capacity: usize,
    num_samples: usize,
}

impl SampleBuffer {
    /// Allocate a zero-filled buffer. Valid count starts at 0.
    ///
    /// A buffer with zero channels is legal and stands in for a disabled
    /// signal path.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(num_channels: usize, capacity: usize) -> Self {
        match Self::try_new(num_channels, capacity) {
            Ok(buffer) => buffer,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible constructor
    pub fn try_new(num_channels: usize, capacity: usize) -> RfResult<Self> {
        if capacity == 0 {
            return Err(RfError::InvalidShape {
                num_channels,
                capacity,
            });
        }
        let len = num_channels
            .checked_mul(capacity)
            .ok_or(RfError::InvalidShape {
                num_channels,
                capacity,
            })?;

        Ok(Self {
            data: vec![IQ_ZERO; len],
            num_channels,
            capacity,
            num_samples: 0,
        })
    }

    #[inline]
    pub fn shape(&self) -> BufferShape {
        BufferShape::new(self.num_channels, self.capacity)
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid samples per channel
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Samples that can still be appended before the buffer is full
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.num_samples
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_samples == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.num_samples == self.capacity
    }

    /// Set the valid sample count.
    ///
    /// # Panics
    ///
    /// Panics if `num_samples > capacity`, in every build profile.
    #[inline]
    pub fn set_num_samples(&mut self, num_samples: usize) {
        assert!(
            num_samples <= self.capacity,
            "valid sample count {num_samples} exceeds buffer capacity {}",
            self.capacity
        );
        self.num_samples = num_samples;
    }

    /// Mark the buffer empty without touching the sample data
    #[inline]
    pub fn clear(&mut self) {
        self.num_samples = 0;
    }

    /// Valid samples of one channel
    #[inline]
    pub fn channel(&self, channel: usize) -> &[IqSample] {
        let start = self.channel_start(channel);
        &self.data[start..start + self.num_samples]
    }

    /// Valid samples of one channel, mutable
    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> &mut [IqSample] {
        let start = self.channel_start(channel);
        let end = start + self.num_samples;
        &mut self.data[start..end]
    }

    /// Iterate the valid region of every channel in order
    pub fn channels(&self) -> impl Iterator<Item = &[IqSample]> + '_ {
        (0..self.num_channels).map(move |ch| self.channel(ch))
    }

    /// Overwrite the valid region of every channel with `value`
    pub fn fill(&mut self, value: IqSample) {
        for ch in 0..self.num_channels {
            self.channel_mut(ch).fill(value);
        }
    }

    /// Append per-channel samples behind the current valid region.
    ///
    /// `sources` must hold one slice per channel, all the same length. Copies
    /// as many samples as fit and returns how many were taken from each
    /// source; the valid count advances by that amount.
    pub fn append(&mut self, sources: &[&[IqSample]]) -> usize {
        assert_eq!(
            sources.len(),
            self.num_channels,
            "append needs one source slice per channel"
        );
        let Some(first) = sources.first() else {
            return 0;
        };
        let available = first.len();
        debug_assert!(sources.iter().all(|s| s.len() == available));

        let count = available.min(self.remaining());
        if count == 0 {
            return 0;
        }

        let offset = self.num_samples;
        for (ch, source) in sources.iter().enumerate() {
            let start = ch * self.capacity + offset;
            self.data[start..start + count].copy_from_slice(&source[..count]);
        }
        self.num_samples += count;
        count
    }

    /// Copy the valid region of `other` into this buffer.
    ///
    /// This is the O(channels * samples) path that [`swap_with`] avoids.
    ///
    /// [`swap_with`]: SampleBuffer::swap_with
    pub fn copy_from(&mut self, other: &SampleBuffer) {
        assert_eq!(self.shape(), other.shape(), "copy between mismatched buffers");
        for ch in 0..self.num_channels {
            let start = ch * self.capacity;
            let n = other.num_samples;
            self.data[start..start + n].copy_from_slice(&other.data[start..start + n]);
        }
        self.num_samples = other.num_samples;
    }

    /// Exchange storage and valid count with another buffer of the same shape.
    ///
    /// O(1): only the allocation handles move, no sample is copied.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    #[inline]
    pub fn swap_with(&mut self, other: &mut SampleBuffer) {
        assert_eq!(
            self.shape(),
            other.shape(),
            "swap between mismatched buffers"
        );
        std::mem::swap(&mut self.data, &mut other.data);
        std::mem::swap(&mut self.num_samples, &mut other.num_samples);
    }

    /// Address of the backing allocation (identity check after swaps)
    #[inline]
    pub fn as_ptr(&self) -> *const IqSample {
        self.data.as_ptr()
    }

    #[inline]
    fn channel_start(&self, channel: usize) -> usize {
        assert!(
            channel < self.num_channels,
            "channel {channel} out of range for {} channel buffer",
            self.num_channels
        );
        channel * self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(ch: usize, i: usize) -> IqSample {
        IqSample::new(i as f32, ch as f32)
    }

    fn filled(num_channels: usize, capacity: usize) -> SampleBuffer {
        let mut buf = SampleBuffer::new(num_channels, capacity);
        buf.set_num_samples(capacity);
        for ch in 0..num_channels {
            for (i, s) in buf.channel_mut(ch).iter_mut().enumerate() {
                *s = pattern(ch, i);
            }
        }
        buf
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = SampleBuffer::new(2, 256);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.capacity(), 256);
        assert_eq!(buf.num_samples(), 0);
        assert!(buf.is_empty());
        assert!(buf.channel(1).is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            SampleBuffer::try_new(2, 0),
            Err(RfError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_zero_channels_allowed() {
        let mut buf = SampleBuffer::new(0, 64);
        buf.set_num_samples(64);
        assert!(buf.is_full());
        assert_eq!(buf.channels().count(), 0);
        assert_eq!(buf.append(&[]), 0);
    }

    #[test]
    #[should_panic(expected = "exceeds buffer capacity")]
    fn test_set_num_samples_beyond_capacity_panics() {
        let mut buf = SampleBuffer::new(1, 16);
        buf.set_num_samples(17);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_channel_out_of_range_panics() {
        let buf = SampleBuffer::new(2, 16);
        let _ = buf.channel(2);
    }

    #[test]
    fn test_accessors_bounded_by_valid_count() {
        let mut buf = SampleBuffer::new(1, 16);
        buf.set_num_samples(5);
        assert_eq!(buf.channel(0).len(), 5);
        assert_eq!(buf.channel_mut(0).len(), 5);
    }

    #[test]
    fn test_append_partial_fill() {
        let mut buf = SampleBuffer::new(2, 8);
        let a: Vec<IqSample> = (0..5).map(|i| pattern(0, i)).collect();
        let b: Vec<IqSample> = (0..5).map(|i| pattern(1, i)).collect();

        assert_eq!(buf.append(&[&a, &b]), 5);
        assert_eq!(buf.num_samples(), 5);

        // Only 3 fit the second time
        assert_eq!(buf.append(&[&a, &b]), 3);
        assert!(buf.is_full());
        assert_eq!(buf.channel(0)[5], pattern(0, 0));
        assert_eq!(buf.channel(1)[7], pattern(1, 2));

        assert_eq!(buf.append(&[&a, &b]), 0);
    }

    #[test]
    fn test_swap_exchanges_storage() {
        let mut a = filled(2, 32);
        let mut b = SampleBuffer::new(2, 32);
        let ptr_a = a.as_ptr();
        let ptr_b = b.as_ptr();

        a.swap_with(&mut b);

        assert_eq!(b.as_ptr(), ptr_a);
        assert_eq!(a.as_ptr(), ptr_b);
        assert_eq!(b.num_samples(), 32);
        assert_eq!(a.num_samples(), 0);
        for ch in 0..2 {
            for (i, s) in b.channel(ch).iter().enumerate() {
                assert_eq!(*s, pattern(ch, i));
            }
        }
    }

    #[test]
    #[should_panic(expected = "mismatched")]
    fn test_swap_shape_mismatch_panics() {
        let mut a = SampleBuffer::new(2, 32);
        let mut b = SampleBuffer::new(1, 32);
        a.swap_with(&mut b);
    }

    #[test]
    fn test_copy_from_matches_swap_contents() {
        let src = filled(1, 16);
        let mut dst = SampleBuffer::new(1, 16);
        dst.copy_from(&src);
        assert_eq!(dst.channel(0), src.channel(0));
        assert_ne!(dst.as_ptr(), src.as_ptr());
    }

    #[test]
    fn test_clear_keeps_data() {
        let mut buf = filled(1, 4);
        buf.clear();
        assert!(buf.is_empty());
        buf.set_num_samples(4);
        assert_eq!(buf.channel(0)[3], pattern(0, 3));
    }
}
