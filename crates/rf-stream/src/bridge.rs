//! Threaded Callback Bridge
//!
//! Decouples a fixed-blocksize hardware thread from user processing code.
//!
//! ```text
//!   HARDWARE THREAD                         WORKER THREAD
//!   ───────────────                         ─────────────
//!   accumulate rx / drain tx
//!   block complete?  ──no──▶ return
//!        │ yes
//!   wait block_done ◀──────────────────────┐
//!   swap hw buffers ⇄ slot buffers         │
//!   signal block_ready ──────────────────▶ take buffers from slot
//!   reset rx count / tx cursor             user callback (rx, tx)
//!   return                                 put buffers back
//!                                          signal block_done ─┘
//! ```
//!
//! Buffers change hands by swapping storage handles, never by copying
//! samples. The slot is the only place both threads touch, and each side
//! only accesses it between the matching wait and signal, so at most one
//! user callback runs at any time and the hardware thread never sees a
//! buffer the worker owns.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use rf_core::{IQ_ZERO, SampleBuffer, samples_to_seconds};

use crate::error::check_sample_rate;
use crate::thread_priority::set_realtime_priority;
use crate::{
    BridgeConfig, ProcessingTimeMeasurement, RfSampleCallback, StreamError, StreamResult,
    SyncPoint,
};

// ============ State ============

/// Worker thread lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    NotStarted = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::NotStarted,
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// Bridge statistics
#[derive(Debug, Default)]
pub struct BridgeStats {
    /// Blocks handed to the worker
    pub blocks_forwarded: AtomicU64,
    /// Hardware calls that returned early because a block was incomplete
    pub skipped_accumulating: AtomicU64,
    /// Blocks the worker did not return within one block period
    pub deadline_misses: AtomicU64,
    /// Blocks dropped because the worker stayed busy past the shutdown timeout
    pub blocks_dropped: AtomicU64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            blocks_forwarded: self.blocks_forwarded.load(Ordering::Relaxed),
            skipped_accumulating: self.skipped_accumulating.load(Ordering::Relaxed),
            deadline_misses: self.deadline_misses.load(Ordering::Relaxed),
            blocks_dropped: self.blocks_dropped.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.blocks_forwarded.store(0, Ordering::Relaxed);
        self.skipped_accumulating.store(0, Ordering::Relaxed);
        self.deadline_misses.store(0, Ordering::Relaxed);
        self.blocks_dropped.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`BridgeStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStatsSnapshot {
    pub blocks_forwarded: u64,
    pub skipped_accumulating: u64,
    pub deadline_misses: u64,
    pub blocks_dropped: u64,
}

/// Immutable description of one handed-off block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockInfo {
    /// Position of the block in the session, starting at 0
    pub sequence: u64,
    pub sample_rate: f64,
    pub rx_enabled: bool,
    pub tx_enabled: bool,
    /// Samples per channel (the forced block size)
    pub block_size: usize,
}

// ============ Handshake ============

struct BlockPair {
    rx: SampleBuffer,
    tx: SampleBuffer,
    info: BlockInfo,
}

struct Slot {
    /// `None` while the worker owns the buffers
    pair: Option<BlockPair>,
    terminate: bool,
}

struct Handshake {
    slot: Mutex<Slot>,
    block_ready: SyncPoint,
    block_done: SyncPoint,
    started: SyncPoint,
    exited: SyncPoint,
}

impl Handshake {
    fn new(pair: BlockPair) -> Self {
        Self {
            slot: Mutex::new(Slot {
                pair: Some(pair),
                terminate: false,
            }),
            block_ready: SyncPoint::new(),
            // The first hardware block finds the slot free
            block_done: SyncPoint::signaled(),
            started: SyncPoint::new(),
            exited: SyncPoint::new(),
        }
    }

    /// Startup barrier: wait for the worker's "started" signal
    fn wait_started(&self, timeout: Duration) -> StreamResult<()> {
        if self.started.wait_for_signal(Some(timeout)) {
            Ok(())
        } else {
            log::error!("Bridge worker did not start within {:?}", timeout);
            Err(StreamError::StartupTimeout(timeout))
        }
    }
}

type SharedCallback = Arc<Mutex<Box<dyn RfSampleCallback>>>;

struct Session {
    handshake: Arc<Handshake>,
    worker: JoinHandle<()>,
    next_block: BlockInfo,
    block_period: Duration,
    shutdown_timeout: Duration,
}

impl Session {
    /// Wait until the worker has returned the previous block.
    ///
    /// A block not returned within one block period counts as one deadline
    /// miss. Gives up after a further shutdown timeout, in which case the
    /// caller drops the block.
    fn wait_for_worker(&self, stats: &BridgeStats) -> bool {
        let done = &self.handshake.block_done;
        if done.wait_for_signal(Some(self.block_period)) {
            return true;
        }

        let misses = stats.deadline_misses.fetch_add(1, Ordering::Relaxed) + 1;
        if misses == 1 || misses % 64 == 0 {
            log::warn!("Bridge worker missed the block deadline ({} misses)", misses);
        }
        if done.wait_for_signal(Some(self.shutdown_timeout)) {
            return true;
        }

        stats.blocks_dropped.fetch_add(1, Ordering::Relaxed);
        log::error!(
            "Bridge worker busy for more than {:?}, dropping block {}",
            self.shutdown_timeout,
            self.next_block.sequence
        );
        false
    }
}

// ============ Bridge ============

/// Runs a user [`RfSampleCallback`] on a dedicated worker thread.
///
/// The bridge is itself an [`RfSampleCallback`] to be driven by a hardware
/// engine. The engine must hand in rx and tx buffers shaped
/// `(num_rx_channels, forced_block_size)` and
/// `(num_tx_channels, forced_block_size)`: rx valid count is the number of
/// samples received so far, tx valid count is the number of samples the
/// hardware has drained. Once a block is complete both are swapped with the
/// worker's pair and reset to 0.
///
/// The user callback always sees full blocks of the forced size, and a tx
/// buffer that has been zeroed and sized to the full block.
pub struct ThreadedCallbackBridge {
    callback: SharedCallback,
    forced_block_size: usize,
    config: BridgeConfig,
    measurement: Option<Arc<ProcessingTimeMeasurement>>,
    state: Arc<AtomicU8>,
    stats: Arc<BridgeStats>,
    session: Option<Session>,
}

impl ThreadedCallbackBridge {
    pub fn new<C>(callback: C, forced_block_size: usize) -> StreamResult<Self>
    where
        C: RfSampleCallback + 'static,
    {
        Self::with_config(callback, forced_block_size, BridgeConfig::default())
    }

    pub fn with_config<C>(
        callback: C,
        forced_block_size: usize,
        config: BridgeConfig,
    ) -> StreamResult<Self>
    where
        C: RfSampleCallback + 'static,
    {
        if forced_block_size == 0 {
            return Err(StreamError::InvalidBlockSize(forced_block_size));
        }
        config.validate()?;

        Ok(Self {
            callback: Arc::new(Mutex::new(Box::new(callback))),
            forced_block_size,
            config,
            measurement: None,
            state: Arc::new(AtomicU8::new(WorkerState::NotStarted as u8)),
            stats: Arc::new(BridgeStats::default()),
            session: None,
        })
    }

    /// Time every user callback invocation with `measurement`. The
    /// measurement is started and stopped together with streaming.
    pub fn with_measurement(mut self, measurement: Arc<ProcessingTimeMeasurement>) -> Self {
        self.measurement = Some(measurement);
        self
    }

    pub fn forced_block_size(&self) -> usize {
        self.forced_block_size
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_some()
    }

    pub fn stats(&self) -> BridgeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared statistics, readable after the bridge has been handed to an engine
    pub fn stats_handle(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    /// Shutdown timeout of the current session
    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.session.as_ref().map(|s| s.shutdown_timeout)
    }

    /// Stop the worker and notify the user callback.
    ///
    /// If the worker does not exit within the shutdown timeout it is
    /// detached, the user callback is not notified and
    /// [`StreamError::ShutdownTimeout`] is returned. The detached worker keeps
    /// its buffers alive until it finishes.
    pub fn stop_streaming(&mut self) -> StreamResult<()> {
        let stopped = self.stop_worker();
        let measured = self.end_measurement();
        stopped?;

        let stats = self.stats.snapshot();
        log::info!(
            "Bridge stopped: {} blocks forwarded, {} deadline misses, {} dropped",
            stats.blocks_forwarded,
            stats.deadline_misses,
            stats.blocks_dropped
        );

        self.callback.lock().streaming_has_stopped();
        measured
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn stop_worker(&mut self) -> StreamResult<()> {
        let Some(session) = self.session.take() else {
            return Err(StreamError::NotStreaming);
        };

        self.set_state(WorkerState::Stopping);
        session.handshake.slot.lock().terminate = true;
        session.handshake.block_ready.signal();

        if !session
            .handshake
            .exited
            .wait_for_signal(Some(session.shutdown_timeout))
        {
            log::error!(
                "Bridge worker did not exit within {:?}, detaching",
                session.shutdown_timeout
            );
            return Err(StreamError::ShutdownTimeout {
                thread: "bridge worker",
                timeout: session.shutdown_timeout,
            });
        }

        if session.worker.join().is_err() {
            log::error!("Bridge worker panicked");
        }
        self.set_state(WorkerState::Stopped);
        Ok(())
    }

    fn end_measurement(&self) -> StreamResult<()> {
        match &self.measurement {
            Some(m) if m.is_running() => m.processing_ends(),
            _ => Ok(()),
        }
    }
}

impl RfSampleCallback for ThreadedCallbackBridge {
    fn prepare_for_streaming(
        &mut self,
        sample_rate: f64,
        num_rx_channels: usize,
        num_tx_channels: usize,
        max_block_size: usize,
    ) -> StreamResult<()> {
        if self.session.is_some() {
            return Err(StreamError::AlreadyStreaming);
        }
        let sample_rate = check_sample_rate(sample_rate)?;
        if num_rx_channels == 0 && num_tx_channels == 0 {
            return Err(StreamError::NoActiveChannels);
        }

        let block_size = self.forced_block_size;
        if max_block_size != block_size {
            log::debug!(
                "Requested block size {} normalized to forced size {}",
                max_block_size,
                block_size
            );
        }

        let block_period = Duration::try_from_secs_f64(samples_to_seconds(block_size, sample_rate))
            .map_err(|_| StreamError::InvalidSampleRate(sample_rate))?;
        let shutdown_timeout = self.config.shutdown_timeout(block_period);

        let first_block = BlockInfo {
            sequence: 0,
            sample_rate,
            rx_enabled: num_rx_channels > 0,
            tx_enabled: num_tx_channels > 0,
            block_size,
        };
        let pair = BlockPair {
            rx: SampleBuffer::try_new(num_rx_channels, block_size)?,
            tx: SampleBuffer::try_new(num_tx_channels, block_size)?,
            info: first_block,
        };
        let handshake = Arc::new(Handshake::new(pair));

        self.stats.reset();
        self.set_state(WorkerState::NotStarted);
        if let Some(m) = &self.measurement {
            m.processing_starts(sample_rate)?;
        }

        let worker = Worker {
            handshake: Arc::clone(&handshake),
            callback: Arc::clone(&self.callback),
            measurement: self.measurement.clone(),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            realtime_priority: self.config.realtime_priority,
            overrun_report_interval: self.config.overrun_report_interval,
        };
        let spawned = thread::Builder::new()
            .name(self.config.worker_thread_name.clone())
            .spawn(move || worker.run());
        let worker = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.end_measurement();
                return Err(StreamError::ThreadSpawn(e.to_string()));
            }
        };

        self.session = Some(Session {
            handshake: Arc::clone(&handshake),
            worker,
            next_block: first_block,
            block_period,
            shutdown_timeout,
        });

        if let Err(e) = handshake.wait_started(shutdown_timeout) {
            let _ = self.stop_worker();
            let _ = self.end_measurement();
            return Err(e);
        }

        log::info!(
            "Bridge streaming: {} Hz, {} rx / {} tx channels, block {} ({:?}), shutdown timeout {:?}",
            sample_rate,
            num_rx_channels,
            num_tx_channels,
            block_size,
            block_period,
            shutdown_timeout
        );

        let prepared = self.callback.lock().prepare_for_streaming(
            sample_rate,
            num_rx_channels,
            num_tx_channels,
            block_size,
        );
        if let Err(e) = prepared {
            log::warn!("User callback rejected streaming parameters: {}", e);
            let _ = self.stop_worker();
            let _ = self.end_measurement();
            return Err(e);
        }

        Ok(())
    }

    fn process_rf_sample_block(&mut self, rx: &mut SampleBuffer, tx: &mut SampleBuffer) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let block_size = self.forced_block_size;

        // Skip, don't block, until the hardware side has a complete block
        let incomplete = if session.next_block.rx_enabled {
            rx.num_samples() < block_size
        } else {
            tx.num_samples() < block_size
        };
        if incomplete {
            self.stats.skipped_accumulating.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if !session.wait_for_worker(&self.stats) {
            return;
        }

        {
            let mut slot = session.handshake.slot.lock();
            let Some(pair) = slot.pair.as_mut() else {
                log::error!("Bridge slot empty after worker completion");
                return;
            };
            pair.rx.swap_with(rx);
            pair.tx.swap_with(tx);
            pair.info = session.next_block;
        }
        session.handshake.block_ready.signal();
        session.next_block.sequence += 1;

        rx.set_num_samples(0);
        tx.set_num_samples(0);
        self.stats.blocks_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    fn streaming_has_stopped(&mut self) {
        match self.stop_streaming() {
            Ok(()) => {}
            Err(StreamError::NotStreaming) => log::debug!("Bridge stop requested while idle"),
            Err(e) => log::error!("Bridge stop failed: {}", e),
        }
    }

    fn handle_error(&mut self, message: &str) {
        self.callback.lock().handle_error(message);
    }
}

impl Drop for ThreadedCallbackBridge {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.streaming_has_stopped();
        }
    }
}

// ============ Worker ============

struct Worker {
    handshake: Arc<Handshake>,
    callback: SharedCallback,
    measurement: Option<Arc<ProcessingTimeMeasurement>>,
    state: Arc<AtomicU8>,
    stats: Arc<BridgeStats>,
    realtime_priority: bool,
    overrun_report_interval: u64,
}

/// Signals `exited` when the worker leaves, including by unwinding
struct ExitSignal(Arc<Handshake>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        self.0.exited.signal();
    }
}

impl Worker {
    fn run(self) {
        let _exit = ExitSignal(Arc::clone(&self.handshake));

        if self.realtime_priority {
            let _ = set_realtime_priority();
        }
        self.state
            .store(WorkerState::Running as u8, Ordering::Release);
        self.handshake.started.signal();
        log::info!("Bridge worker started");

        let mut reported_misses = 0u64;

        loop {
            self.handshake.block_ready.wait_for_signal(None);

            let taken = {
                let mut slot = self.handshake.slot.lock();
                if slot.terminate {
                    break;
                }
                slot.pair.take()
            };
            let Some(mut pair) = taken else {
                continue;
            };

            let mut callback = self.callback.lock();

            let misses = self.stats.deadline_misses.load(Ordering::Relaxed);
            if misses >= reported_misses + self.overrun_report_interval {
                callback.handle_error(&format!(
                    "Processing overran the hardware block period: {} deadline misses ({} new)",
                    misses,
                    misses - reported_misses
                ));
                reported_misses = misses;
            }

            pair.tx.set_num_samples(pair.info.block_size);
            pair.tx.fill(IQ_ZERO);
            {
                let _scope = self
                    .measurement
                    .as_ref()
                    .map(|m| m.scope(pair.info.block_size));
                callback.process_rf_sample_block(&mut pair.rx, &mut pair.tx);
            }
            drop(callback);

            self.handshake.slot.lock().pair = Some(pair);
            self.handshake.block_done.signal();
        }

        log::info!("Bridge worker exiting");
    }
}
