//! Timer threads: periodic wake signals for the engine loop and each agent.
//!
//! A metronome never touches game state. It sleeps until `now + interval`,
//! then offers one tick on a small bounded channel. Ticks a slow consumer
//! has not picked up are skipped rather than queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::trace;

use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub frame: u64,
    pub elapsed: Duration,
}

/// Interval shared between a metronome and its consumer, in milliseconds.
#[derive(Clone, Debug)]
pub struct Pace(Arc<AtomicU64>);

impl Pace {
    pub fn new(interval: Duration) -> Self {
        Self(Arc::new(AtomicU64::new(Self::to_ms(interval))))
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, interval: Duration) {
        self.0.store(Self::to_ms(interval), Ordering::Relaxed);
    }

    fn to_ms(interval: Duration) -> u64 {
        (interval.as_millis() as u64).max(1)
    }
}

pub struct Metronome {
    name: String,
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    tick_rx: Receiver<Tick>,
}

impl Metronome {
    /// Spawns a timer thread. `halt` wakes it early: any message, or the
    /// sending side going away, ends the thread.
    pub fn spawn(name: impl Into<String>, pace: Pace, halt: Receiver<()>) -> Result<Self> {
        let name = name.into();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let (tick_tx, tick_rx) = bounded(2);

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_loop(&tick_tx, &shutdown_clone, &pace, &halt))
            .map_err(|source| SimError::Spawn {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            handle: Some(handle),
            shutdown,
            tick_rx,
        })
    }

    pub fn receiver(&self) -> &Receiver<Tick> {
        &self.tick_rx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cooperative stop, seen after the thread's next wake.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(tick_tx: &Sender<Tick>, shutdown: &AtomicBool, pace: &Pace, halt: &Receiver<()>) {
    let start = Instant::now();
    let mut frame = 0u64;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let deadline = Instant::now() + pace.get();
        match halt.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let tick = Tick {
            frame,
            elapsed: start.elapsed(),
        };
        match tick_tx.try_send(tick) {
            Ok(()) => frame += 1,
            Err(TrySendError::Full(_)) => trace!(frame, "tick skipped, consumer busy"),
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}
