//! Cooperative cancellation for the simulation threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

/// Broadcast stop. Every subscriber's blocking receive returns as soon as
/// the signal fires, because the only sender is dropped.
#[derive(Clone, Debug)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug)]
struct StopInner {
    stopped: AtomicBool,
    keeper: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(StopInner {
                stopped: AtomicBool::new(false),
                keeper: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    pub fn subscribe(&self) -> Receiver<()> {
        self.inner.rx.clone()
    }

    /// True only for the call that actually fired the signal.
    pub fn trigger(&self) -> bool {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let sender = self
            .inner
            .keeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let fired = sender.is_some();
        if fired {
            debug!("stop signal fired");
        }
        fired
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

/// Counts threads that have finished; waiters block on a condvar until the
/// count reaches their target.
#[derive(Debug, Default)]
pub struct ExitLatch {
    count: Mutex<usize>,
    cond: Condvar,
}

impl ExitLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arrive(&self) -> usize {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        self.cond.notify_all();
        *count
    }

    pub fn count(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until at least `target` threads have arrived. False on timeout.
    pub fn wait_for(&self, target: usize, timeout: Duration) -> bool {
        let guard = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |count| *count < target)
            .unwrap_or_else(PoisonError::into_inner);
        *guard >= target
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use crossbeam_channel::RecvTimeoutError;

    use super::*;

    #[test]
    fn stop_signal_fires_once_and_wakes_subscribers() {
        let stop = StopSignal::new();
        let rx = stop.subscribe();
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(5)),
            Err(RecvTimeoutError::Timeout)
        );

        let waiter = thread::spawn(move || {
            let started = Instant::now();
            let woke = rx.recv_timeout(Duration::from_secs(30));
            (woke, started.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        assert!(stop.trigger());
        assert!(!stop.trigger());
        assert!(stop.is_triggered());

        let (woke, waited) = waiter.join().expect("waiter thread");
        assert_eq!(woke, Err(RecvTimeoutError::Disconnected));
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn latch_releases_when_everyone_arrived() {
        let latch = Arc::new(ExitLatch::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let latch = latch.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    latch.arrive();
                })
            })
            .collect();
        assert!(latch.wait_for(4, Duration::from_secs(5)));
        assert_eq!(latch.count(), 4);
        for worker in workers {
            worker.join().expect("worker thread");
        }
    }

    #[test]
    fn latch_times_out_and_is_reusable_afterwards() {
        let latch = ExitLatch::new();
        assert!(!latch.wait_for(1, Duration::from_millis(10)));
        latch.arrive();
        assert!(latch.wait_for(1, Duration::from_millis(10)));
        assert!(latch.wait_for(1, Duration::ZERO));
    }
}
