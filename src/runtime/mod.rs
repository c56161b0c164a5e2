//! Thread wiring: one engine loop, one thread per agent, one metronome for
//! each of them, and the handle that starts and stops the lot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::board::Layout;
use crate::config::SimConfig;
use crate::engine::SimulationState;
use crate::error::{Result, SimError};
use crate::ghost_house::GhostHouse;
use crate::input_queue::InputQueue;
use crate::metronome::{Metronome, Pace};
use crate::score_store::ScoreBoard;
use crate::shutdown::{ExitLatch, StopSignal};
use crate::types::{InputEvent, PoolView, Snapshot};

mod agent_loop;
mod engine_loop;

use self::agent_loop::AgentContext;
use self::engine_loop::EngineContext;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The one lock over board and game state.
#[derive(Clone, Debug)]
pub struct SharedState(Arc<Mutex<SimulationState>>);

impl SharedState {
    pub fn new(state: SimulationState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Every critical section leaves the state consistent, so a poisoned
    /// lock is still usable.
    pub fn lock(&self) -> MutexGuard<'_, SimulationState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bounded wait for the lock; `None` when it stays busy past `timeout`.
    pub fn lock_within(&self, timeout: Duration) -> Option<MutexGuard<'_, SimulationState>> {
        let deadline = Instant::now() + timeout;
        let mut spins = 0u32;
        loop {
            match self.0.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {}
            }
            if Instant::now() >= deadline {
                return None;
            }
            if spins < 16 {
                spins += 1;
                thread::yield_now();
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

pub struct Simulation {
    state: SharedState,
    queue: InputQueue,
    house: GhostHouse,
    stop: StopSignal,
    engine_exited: Arc<ExitLatch>,
    agents_exited: Arc<ExitLatch>,
    engine_spawned: bool,
    agent_total: usize,
    threads: Vec<JoinHandle<()>>,
    metronomes: Vec<Metronome>,
    shut_down: bool,
}

impl Simulation {
    /// Loads the level and starts every thread. The simulation sits on the
    /// menu screen until a `ScreenChange(Play)` arrives.
    pub fn start(config: SimConfig, layout: Layout, scores: Option<ScoreBoard>) -> Result<Self> {
        let state = SimulationState::new(layout, config.clone())?;
        let agent_total = state.agent_count();

        let mut sim = Self {
            state: SharedState::new(state),
            queue: InputQueue::new(config.queue_capacity),
            house: GhostHouse::from_config(&config),
            stop: StopSignal::new(),
            engine_exited: Arc::new(ExitLatch::new()),
            agents_exited: Arc::new(ExitLatch::new()),
            engine_spawned: false,
            agent_total: 0,
            threads: Vec::new(),
            metronomes: Vec::new(),
            shut_down: false,
        };

        let engine_tick = Metronome::spawn(
            "engine-metronome",
            Pace::new(config.tick()),
            sim.stop.subscribe(),
        )?;
        let engine = EngineContext {
            state: sim.state.clone(),
            queue: sim.queue.clone(),
            stop: sim.stop.clone(),
            exited: sim.engine_exited.clone(),
            ticks: engine_tick.receiver().clone(),
            tick_ms: config.tick_ms,
            wake_timeout: config.agent_wake_timeout(),
            scores,
        };
        sim.metronomes.push(engine_tick);
        sim.spawn_thread("engine-loop".to_string(), move || engine_loop::run(engine))?;
        sim.engine_spawned = true;

        for id in 0..agent_total {
            let pace = Pace::new(config.agent_interval(id));
            let metronome =
                Metronome::spawn(format!("agent-{id}-metronome"), pace.clone(), sim.stop.subscribe())?;
            let agent = AgentContext {
                id,
                state: sim.state.clone(),
                house: sim.house.clone(),
                stop: sim.stop.clone(),
                exited: sim.agents_exited.clone(),
                ticks: metronome.receiver().clone(),
                pace,
                rng: agent_rng(config.seed, id),
                config: config.clone(),
            };
            sim.metronomes.push(metronome);
            sim.spawn_thread(format!("agent-{id}"), move || agent_loop::run(agent))?;
            sim.agent_total += 1;
        }

        info!(agents = agent_total, tick_ms = config.tick_ms, "simulation started");
        Ok(sim)
    }

    fn spawn_thread<F>(&mut self, name: String, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(|source| SimError::Spawn { name, source })?;
        self.threads.push(handle);
        Ok(())
    }

    /// Never blocks; a full queue drops the event.
    pub fn publish(&self, event: InputEvent) -> bool {
        self.queue.publish(event)
    }

    pub fn input(&self) -> InputQueue {
        self.queue.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let pools = PoolView {
            keys_available: self.house.keys().available(),
            permits_available: self.house.permits().available(),
            boosts_available: self.house.boosts().available(),
        };
        self.state.lock().build_snapshot(Some(pools))
    }

    /// Runs `f` under the state lock.
    pub fn with_state<T>(&self, f: impl FnOnce(&SimulationState) -> T) -> T {
        let state = self.state.lock();
        f(&*state)
    }

    pub fn toggle_pause(&self) -> bool {
        self.state.lock().toggle_pause()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running()
    }

    /// Clears the running flag; the engine loop notices on its next tick
    /// and takes the other threads down with it.
    pub fn request_stop(&self) {
        self.state.lock().stop();
    }

    pub fn set_username(&self, name: &str) {
        self.state.lock().menu_mut().set_username(name);
    }

    pub fn menu_up(&self) {
        self.state.lock().menu_mut().move_up();
    }

    pub fn menu_down(&self) {
        self.state.lock().menu_mut().move_down();
    }

    pub fn menu_select(&self) -> bool {
        let event = self.state.lock().menu().select();
        self.publish(event)
    }

    pub fn ghost_house(&self) -> &GhostHouse {
        &self.house
    }

    pub fn agent_count(&self) -> usize {
        self.agent_total
    }

    /// Blocks until the engine loop has exited on its own.
    pub fn wait_for_engine_exit(&self, timeout: Duration) -> bool {
        self.engine_exited.wait_for(1, timeout)
    }

    /// Clears the running flag, wakes every thread and waits for all of them
    /// to report back. Calling it again is a quick no-op.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        if !self.shut_down {
            info!("shutting down simulation");
        }
        self.state.lock().stop();
        self.stop.trigger();

        let deadline = Instant::now() + timeout;
        // Only threads that actually started will report back.
        let engine_done = !self.engine_spawned || self.engine_exited.wait_for(1, timeout);
        let agents_done = self.agents_exited.wait_for(
            self.agent_total,
            deadline.saturating_duration_since(Instant::now()),
        );
        if !(engine_done && agents_done) {
            return Err(SimError::ShutdownTimeout {
                engine_exited: engine_done,
                agents_exited: self.agents_exited.count(),
                agents_total: self.agent_total,
            });
        }

        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                warn!(thread = %name, "thread panicked before shutdown");
            }
        }
        for metronome in self.metronomes.drain(..) {
            metronome.join();
        }
        if !self.shut_down {
            info!("simulation stopped");
        }
        self.shut_down = true;
        Ok(())
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
            warn!(%error, "simulation dropped without a clean shutdown");
        }
    }
}

/// Seeded runs give every agent its own reproducible stream.
fn agent_rng(seed: Option<u64>, id: usize) -> StdRng {
    match seed {
        Some(seed) => {
            StdRng::seed_from_u64(seed ^ (id as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        }
        None => StdRng::from_rng(&mut rand::rng()),
    }
}
