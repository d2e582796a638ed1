//! Hardware callback contract.
//!
//! A hardware engine owns the real-time thread and drives one
//! [`RfSampleCallback`]. Every engine variant talks to user code through this
//! single trait; the [`ThreadedCallbackBridge`](crate::ThreadedCallbackBridge)
//! implements it as well, so it can be inserted between any engine and any
//! user callback.

use rf_core::SampleBuffer;

use crate::StreamResult;

/// Receiver of hardware sample blocks.
///
/// Call order for a streaming session is
/// `prepare_for_streaming` → `process_rf_sample_block`* → `streaming_has_stopped`.
/// `handle_error` may arrive at any time in between.
pub trait RfSampleCallback: Send {
    /// Configure for a session. `max_block_size` is the largest number of
    /// samples per channel a single `process_rf_sample_block` call will carry.
    fn prepare_for_streaming(
        &mut self,
        sample_rate: f64,
        num_rx_channels: usize,
        num_tx_channels: usize,
        max_block_size: usize,
    ) -> StreamResult<()>;

    /// Process one block. `rx` holds received samples, `tx` is to be filled
    /// with samples to transmit. Either may have zero channels.
    fn process_rf_sample_block(&mut self, rx: &mut SampleBuffer, tx: &mut SampleBuffer);

    /// The session ended; no further blocks will arrive.
    fn streaming_has_stopped(&mut self);

    /// Runtime error reported by the engine or an intermediate layer
    fn handle_error(&mut self, message: &str);
}

impl<C: RfSampleCallback + ?Sized> RfSampleCallback for Box<C> {
    fn prepare_for_streaming(
        &mut self,
        sample_rate: f64,
        num_rx_channels: usize,
        num_tx_channels: usize,
        max_block_size: usize,
    ) -> StreamResult<()> {
        (**self).prepare_for_streaming(sample_rate, num_rx_channels, num_tx_channels, max_block_size)
    }

    fn process_rf_sample_block(&mut self, rx: &mut SampleBuffer, tx: &mut SampleBuffer) {
        (**self).process_rf_sample_block(rx, tx)
    }

    fn streaming_has_stopped(&mut self) {
        (**self).streaming_has_stopped()
    }

    fn handle_error(&mut self, message: &str) {
        (**self).handle_error(message)
    }
}

/// Closure adaptor for quick processing callbacks.
///
/// Preparation always succeeds and is remembered in [`StreamParams`]; errors
/// are logged at warn level.
pub struct FnSampleCallback<F>
where
    F: FnMut(&mut SampleBuffer, &mut SampleBuffer) + Send,
{
    process_fn: F,
    params: Option<StreamParams>,
}

/// Parameters a callback was prepared with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamParams {
    pub sample_rate: f64,
    pub num_rx_channels: usize,
    pub num_tx_channels: usize,
    pub max_block_size: usize,
}

impl<F> FnSampleCallback<F>
where
    F: FnMut(&mut SampleBuffer, &mut SampleBuffer) + Send,
{
    pub fn new(process_fn: F) -> Self {
        Self {
            process_fn,
            params: None,
        }
    }

    /// Parameters of the current session, if prepared
    pub fn params(&self) -> Option<StreamParams> {
        self.params
    }
}

impl<F> RfSampleCallback for FnSampleCallback<F>
where
    F: FnMut(&mut SampleBuffer, &mut SampleBuffer) + Send,
{
    fn prepare_for_streaming(
        &mut self,
        sample_rate: f64,
        num_rx_channels: usize,
        num_tx_channels: usize,
        max_block_size: usize,
    ) -> StreamResult<()> {
        self.params = Some(StreamParams {
            sample_rate,
            num_rx_channels,
            num_tx_channels,
            max_block_size,
        });
        Ok(())
    }

    #[inline]
    fn process_rf_sample_block(&mut self, rx: &mut SampleBuffer, tx: &mut SampleBuffer) {
        (self.process_fn)(rx, tx)
    }

    fn streaming_has_stopped(&mut self) {
        self.params = None;
    }

    fn handle_error(&mut self, message: &str) {
        log::warn!("Sample callback error: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_callback_forwards_blocks() {
        let mut calls = 0usize;
        {
            let mut cb = FnSampleCallback::new(|rx: &mut SampleBuffer, _tx: &mut SampleBuffer| {
                calls += rx.num_samples();
            });
            cb.prepare_for_streaming(1e6, 1, 0, 64).unwrap();
            assert_eq!(cb.params().map(|p| p.max_block_size), Some(64));

            let mut rx = SampleBuffer::new(1, 64);
            let mut tx = SampleBuffer::new(0, 64);
            rx.set_num_samples(64);
            cb.process_rf_sample_block(&mut rx, &mut tx);
            cb.process_rf_sample_block(&mut rx, &mut tx);

            cb.streaming_has_stopped();
            assert!(cb.params().is_none());
        }
        assert_eq!(calls, 128);
    }

    #[test]
    fn test_boxed_callback_is_callback() {
        let mut boxed: Box<dyn RfSampleCallback> =
            Box::new(FnSampleCallback::new(|_: &mut SampleBuffer, _: &mut SampleBuffer| {}));
        assert!(boxed.prepare_for_streaming(48_000.0, 1, 1, 256).is_ok());
        boxed.handle_error("ignored");
    }
}
