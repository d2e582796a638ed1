//! Two-party handshake primitive.
//!
//! A [`SyncPoint`] is an auto-reset event: [`signal`](SyncPoint::signal)
//! latches a flag and wakes one waiter, [`wait_for_signal`](SyncPoint::wait_for_signal)
//! blocks until the flag is set and then consumes it. A signal raised while
//! nobody waits stays latched until the next wait, so a startup barrier can
//! never miss the worker's "started" notification. Repeated signals before a
//! wait coalesce into one.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct SyncPoint {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl SyncPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sync point that is already signaled
    pub fn signaled() -> Self {
        Self {
            signaled: Mutex::new(true),
            condvar: Condvar::new(),
        }
    }

    /// Latch the signal and wake one waiter
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_one();
    }

    /// Block until signaled or until `timeout` elapses (`None` waits forever).
    ///
    /// Returns `true` if the signal was received (and consumed), `false` on
    /// timeout. A timeout too large to express as a deadline waits forever.
    pub fn wait_for_signal(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut signaled = self.signaled.lock();

        match deadline {
            None => {
                while !*signaled {
                    self.condvar.wait(&mut signaled);
                }
            }
            Some(deadline) => {
                while !*signaled {
                    if self.condvar.wait_until(&mut signaled, deadline).timed_out() {
                        break;
                    }
                }
                if !*signaled {
                    return false;
                }
            }
        }

        *signaled = false;
        true
    }

    /// Whether a signal is latched and not yet consumed
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// Drop a latched signal
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_times_out() {
        let sync = SyncPoint::new();
        let start = Instant::now();
        assert!(!sync.wait_for_signal(Some(Duration::from_millis(20))));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_signal_before_wait_is_latched() {
        let sync = SyncPoint::new();
        sync.signal();
        assert!(sync.is_signaled());
        assert!(sync.wait_for_signal(Some(Duration::ZERO)));
        // Consumed
        assert!(!sync.wait_for_signal(Some(Duration::from_millis(1))));
    }

    #[test]
    fn test_signals_coalesce() {
        let sync = SyncPoint::new();
        sync.signal();
        sync.signal();
        assert!(sync.wait_for_signal(Some(Duration::ZERO)));
        assert!(!sync.is_signaled());
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let sync = Arc::new(SyncPoint::new());
        let waiter = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.wait_for_signal(None))
        };

        thread::sleep(Duration::from_millis(10));
        sync.signal();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_reset_drops_signal() {
        let sync = SyncPoint::signaled();
        sync.reset();
        assert!(!sync.wait_for_signal(Some(Duration::from_millis(1))));
    }

    #[test]
    fn test_unrepresentable_timeout_waits_for_signal() {
        let sync = Arc::new(SyncPoint::new());
        let waiter = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.wait_for_signal(Some(Duration::MAX)))
        };

        thread::sleep(Duration::from_millis(10));
        sync.signal();
        assert!(waiter.join().unwrap());
    }
}
