use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, trace};

use super::SharedState;
use crate::config::SimConfig;
use crate::constants::boosted_interval_ms;
use crate::ghost_house::GhostHouse;
use crate::metronome::{Pace, Tick};
use crate::shutdown::{ExitLatch, StopSignal};

pub(super) struct AgentContext {
    pub(super) id: usize,
    pub(super) state: SharedState,
    pub(super) house: GhostHouse,
    pub(super) stop: StopSignal,
    pub(super) exited: Arc<ExitLatch>,
    pub(super) ticks: Receiver<Tick>,
    pub(super) pace: Pace,
    pub(super) rng: StdRng,
    pub(super) config: SimConfig,
}

enum Flow {
    Continue,
    Exit,
}

/// Gives back whatever the agent holds and reports the exit, even when the
/// thread unwinds.
struct AgentExit {
    id: usize,
    state: SharedState,
    exited: Arc<ExitLatch>,
}

impl Drop for AgentExit {
    fn drop(&mut self) {
        self.state.lock().release_agent(self.id);
        let exited = self.exited.arrive();
        debug!(agent = self.id, exited, "agent thread exited");
    }
}

pub(super) fn run(mut ctx: AgentContext) {
    let _exit = AgentExit {
        id: ctx.id,
        state: ctx.state.clone(),
        exited: ctx.exited.clone(),
    };
    debug!(agent = ctx.id, interval = ?ctx.pace.get(), "agent thread started");

    loop {
        match ctx.ticks.recv_timeout(ctx.config.agent_wake_timeout()) {
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                if ctx.stop.is_triggered() {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if ctx.stop.is_triggered() {
            break;
        }
        if let Flow::Exit = tick(&mut ctx) {
            break;
        }
    }
}

fn tick(ctx: &mut AgentContext) -> Flow {
    let id = ctx.id;
    let base = ctx.config.agent_interval(id);

    let plan = {
        let Some(mut state) = ctx.state.lock_within(ctx.config.state_lock_timeout()) else {
            debug!(agent = id, "state lock busy, tick skipped");
            return Flow::Continue;
        };
        if !state.running() {
            return Flow::Exit;
        }
        if !state.is_live() {
            return Flow::Continue;
        }
        let Some(plan) = state.agent_plan(id) else {
            state.respawn_agent(id);
            drop(state);
            ctx.pace.set(base);
            return Flow::Continue;
        };
        if state.expire_boost(id, Instant::now()) {
            ctx.pace.set(base);
        }
        plan
    };

    // Pool waits happen without the state lock held.
    let pass = if plan.needs_pass {
        match ctx.house.acquire_pass(id, ctx.config.resource_timeout()) {
            Some(pass) => Some(pass),
            None => {
                trace!(agent = id, "pen pass unavailable, retrying next tick");
                return Flow::Continue;
            }
        }
    } else {
        None
    };
    let boost = if plan.boost_eligible && ctx.rng.random::<f32>() < ctx.config.boost_chance {
        ctx.house.acquire_boost(
            id,
            ctx.config.boost_timeout(),
            ctx.config.boost_duration(),
            Instant::now(),
        )
    } else {
        None
    };

    let Some(mut state) = ctx.state.lock_within(ctx.config.state_lock_timeout()) else {
        debug!(agent = id, "state lock busy, tick skipped");
        return Flow::Continue;
    };
    if !state.running() {
        return Flow::Exit;
    }
    if !state.is_live() {
        return Flow::Continue;
    }
    if let Some(pass) = pass {
        state.grant_pass(id, pass);
    }
    if let Some(boost) = boost {
        state.grant_boost(id, boost);
    }
    let outcome = state.advance_agent(id, &mut ctx.rng);
    let boosted = state.is_boosted(id);
    drop(state);

    trace!(agent = id, ?outcome, "agent ticked");
    ctx.pace.set(if boosted {
        Duration::from_millis(boosted_interval_ms(base.as_millis() as u64))
    } else {
        base
    });
    Flow::Continue
}
