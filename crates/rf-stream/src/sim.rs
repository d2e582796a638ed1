//! Simulated Hardware Engine
//!
//! Owns a hardware thread that drives an [`RfSampleCallback`] the way a radio
//! driver does: one call per hardware period, rx delivered in fixed chunks
//! into a buffer of the engine's block size, tx drained at the same rate.
//! Received samples follow a counting pattern (see [`SimulatedEngine::sample_at`])
//! so consumers can check for lost or repeated samples.
//!
//! Between calls the engine recycles buffers the callback left full, so both
//! plain callbacks and a [`ThreadedCallbackBridge`](crate::ThreadedCallbackBridge)
//! can be driven directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rf_core::{IqSample, SampleBuffer, samples_to_seconds};

use crate::error::check_sample_rate;
use crate::thread_priority::set_realtime_priority;
use crate::{RfSampleCallback, StreamError, StreamResult};

/// Counting pattern wraps here to stay exact in `f32`
const PATTERN_PERIOD: u64 = 1 << 24;

/// Simulated engine configuration
#[derive(Debug, Clone)]
pub struct SimulatedEngineConfig {
    pub sample_rate: f64,
    /// Buffer capacity handed to the callback (the forced block size)
    pub block_size: usize,
    /// Samples delivered per hardware period
    pub chunk_size: usize,
    pub num_rx_channels: usize,
    pub num_tx_channels: usize,
    /// Sleep out each hardware period; otherwise run as fast as possible
    pub paced: bool,
    /// Stop on its own after delivering this many samples per channel
    pub max_samples: Option<u64>,
    pub realtime_priority: bool,
}

impl Default for SimulatedEngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1_000_000.0,
            block_size: 256,
            chunk_size: 256,
            num_rx_channels: 1,
            num_tx_channels: 1,
            paced: true,
            max_samples: None,
            realtime_priority: false,
        }
    }
}

impl SimulatedEngineConfig {
    /// Duration of one hardware period
    pub fn period(&self) -> StreamResult<Duration> {
        Duration::try_from_secs_f64(samples_to_seconds(self.chunk_size, self.sample_rate))
            .map_err(|_| StreamError::InvalidSampleRate(self.sample_rate))
    }

    pub fn validate(&self) -> StreamResult<()> {
        check_sample_rate(self.sample_rate)?;
        if self.block_size == 0 {
            return Err(StreamError::InvalidBlockSize(self.block_size));
        }
        if self.chunk_size == 0 {
            return Err(StreamError::InvalidConfig("chunk_size must be at least 1".into()));
        }
        self.period()?;
        if self.num_rx_channels == 0 && self.num_tx_channels == 0 {
            return Err(StreamError::NoActiveChannels);
        }
        Ok(())
    }
}

/// Hardware thread counters
#[derive(Debug, Default)]
pub struct EngineCounters {
    /// Hardware periods elapsed
    pub periods: AtomicU64,
    /// Samples delivered per rx channel
    pub rx_samples: AtomicU64,
    /// Samples drained per tx channel
    pub tx_samples: AtomicU64,
    /// Drained tx samples on channel 0 that were not zero
    pub tx_nonzero_samples: AtomicU64,
    /// Full buffers the callback left in place (recycled by the engine)
    pub unconsumed_blocks: AtomicU64,
    /// Periods whose callback work exceeded the period
    pub overruns: AtomicU64,
}

/// Point-in-time copy of [`EngineCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCountersSnapshot {
    pub periods: u64,
    pub rx_samples: u64,
    pub tx_samples: u64,
    pub tx_nonzero_samples: u64,
    pub unconsumed_blocks: u64,
    pub overruns: u64,
}

impl EngineCounters {
    pub fn snapshot(&self) -> EngineCountersSnapshot {
        EngineCountersSnapshot {
            periods: self.periods.load(Ordering::Relaxed),
            rx_samples: self.rx_samples.load(Ordering::Relaxed),
            tx_samples: self.tx_samples.load(Ordering::Relaxed),
            tx_nonzero_samples: self.tx_nonzero_samples.load(Ordering::Relaxed),
            unconsumed_blocks: self.unconsumed_blocks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}

/// Fixed-period hardware stand-in
pub struct SimulatedEngine {
    config: SimulatedEngineConfig,
    running: Arc<AtomicBool>,
    counters: Arc<EngineCounters>,
    handle: Option<JoinHandle<Box<dyn RfSampleCallback>>>,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedEngineConfig) -> StreamResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(EngineCounters::default()),
            handle: None,
        })
    }

    pub fn config(&self) -> &SimulatedEngineConfig {
        &self.config
    }

    pub fn counters(&self) -> EngineCountersSnapshot {
        self.counters.snapshot()
    }

    /// Sample the engine delivers at `index` on `channel`
    pub fn sample_at(channel: usize, index: u64) -> IqSample {
        IqSample::new((index % PATTERN_PERIOD) as f32, channel as f32)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Prepare `callback` on the calling thread, then start the hardware
    /// thread driving it.
    pub fn start<C>(&mut self, callback: C) -> StreamResult<()>
    where
        C: RfSampleCallback + 'static,
    {
        if self.handle.is_some() {
            return Err(StreamError::AlreadyStreaming);
        }

        let cfg = self.config.clone();
        let mut callback: Box<dyn RfSampleCallback> = Box::new(callback);
        callback.prepare_for_streaming(
            cfg.sample_rate,
            cfg.num_rx_channels,
            cfg.num_tx_channels,
            cfg.block_size,
        )?;

        let hardware = HardwareLoop {
            rx: SampleBuffer::try_new(cfg.num_rx_channels, cfg.block_size)?,
            tx: SampleBuffer::try_new(cfg.num_tx_channels, cfg.block_size)?,
            scratch: vec![vec![IqSample::default(); cfg.chunk_size]; cfg.num_rx_channels],
            produced: 0,
            running: Arc::clone(&self.running),
            counters: Arc::clone(&self.counters),
            config: cfg,
        };

        self.running.store(true, Ordering::Release);
        let handle = thread::Builder::new()
            .name("rf-sim-hardware".into())
            .spawn(move || hardware.run(callback))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                StreamError::ThreadSpawn(e.to_string())
            })?;

        log::info!(
            "Simulated engine started: {} Hz, block {}, chunk {}",
            self.config.sample_rate,
            self.config.block_size,
            self.config.chunk_size
        );
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the hardware thread and return the callback, after it has been
    /// told streaming stopped.
    pub fn stop(&mut self) -> StreamResult<Box<dyn RfSampleCallback>> {
        self.running.store(false, Ordering::Release);
        self.join()
    }

    /// Wait for the hardware thread to finish on its own. Only valid with
    /// [`SimulatedEngineConfig::max_samples`] set.
    pub fn wait(&mut self) -> StreamResult<Box<dyn RfSampleCallback>> {
        if self.config.max_samples.is_none() && self.running.load(Ordering::Acquire) {
            return Err(StreamError::InvalidConfig(
                "wait() needs max_samples, use stop()".into(),
            ));
        }
        self.join()
    }

    fn join(&mut self) -> StreamResult<Box<dyn RfSampleCallback>> {
        let handle = self.handle.take().ok_or(StreamError::NotStreaming)?;
        match handle.join() {
            Ok(callback) => {
                log::info!("Simulated engine stopped: {:?}", self.counters.snapshot());
                Ok(callback)
            }
            // Surface callback assertion failures to the joining thread
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.running.store(false, Ordering::Release);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

struct HardwareLoop {
    config: SimulatedEngineConfig,
    rx: SampleBuffer,
    tx: SampleBuffer,
    scratch: Vec<Vec<IqSample>>,
    produced: u64,
    running: Arc<AtomicBool>,
    counters: Arc<EngineCounters>,
}

impl HardwareLoop {
    fn run(mut self, mut callback: Box<dyn RfSampleCallback>) -> Box<dyn RfSampleCallback> {
        if self.config.realtime_priority {
            let _ = set_realtime_priority();
        }

        // Validated in SimulatedEngine::new
        let period = self.config.period().unwrap_or(Duration::MAX);
        let mut next_period = Instant::now();

        while self.running.load(Ordering::Acquire) {
            let chunk = match self.config.max_samples {
                Some(max) if self.produced >= max => break,
                Some(max) => (self.config.chunk_size as u64).min(max - self.produced) as usize,
                None => self.config.chunk_size,
            };

            let start = Instant::now();
            self.run_period(callback.as_mut(), chunk);
            if start.elapsed() > period {
                self.counters.overruns.fetch_add(1, Ordering::Relaxed);
            }
            self.counters.periods.fetch_add(1, Ordering::Relaxed);

            if self.config.paced {
                let now = Instant::now();
                match next_period.checked_add(period) {
                    Some(next) if next > now => {
                        thread::sleep(next - now);
                        next_period = next;
                    }
                    _ => next_period = now,
                }
            }
        }

        self.running.store(false, Ordering::Release);
        callback.streaming_has_stopped();
        callback
    }

    fn run_period(&mut self, callback: &mut dyn RfSampleCallback, chunk: usize) {
        let rx_enabled = self.rx.num_channels() > 0;
        let tx_enabled = self.tx.num_channels() > 0;

        for (ch, samples) in self.scratch.iter_mut().enumerate() {
            for (i, s) in samples[..chunk].iter_mut().enumerate() {
                *s = SimulatedEngine::sample_at(ch, self.produced + i as u64);
            }
        }

        let mut offset = 0;
        while offset < chunk {
            let room = if rx_enabled {
                self.rx.remaining()
            } else {
                self.tx.remaining()
            };
            let step = (chunk - offset).min(room);

            if rx_enabled {
                let sources: Vec<&[IqSample]> = self
                    .scratch
                    .iter()
                    .map(|s| &s[offset..offset + step])
                    .collect();
                self.rx.append(&sources);
                self.counters
                    .rx_samples
                    .fetch_add(step as u64, Ordering::Relaxed);
            }
            if tx_enabled {
                self.drain_tx(step);
            }
            offset += step;

            callback.process_rf_sample_block(&mut self.rx, &mut self.tx);

            let rx_left_full = rx_enabled && self.rx.is_full();
            let tx_left_full = !rx_enabled && self.tx.is_full();
            if rx_left_full || tx_left_full {
                self.counters
                    .unconsumed_blocks
                    .fetch_add(1, Ordering::Relaxed);
                self.rx.clear();
                self.tx.clear();
            }
        }

        self.produced += chunk as u64;
    }

    fn drain_tx(&mut self, count: usize) {
        let cursor = self.tx.num_samples();
        let count = count.min(self.tx.remaining());
        self.tx.set_num_samples(cursor + count);

        let nonzero = self.tx.channel(0)[cursor..cursor + count]
            .iter()
            .filter(|s| s.re != 0.0 || s.im != 0.0)
            .count();
        self.counters
            .tx_samples
            .fetch_add(count as u64, Ordering::Relaxed);
        self.counters
            .tx_nonzero_samples
            .fetch_add(nonzero as u64, Ordering::Relaxed);
    }
}
