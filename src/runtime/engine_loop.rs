use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info};

use super::SharedState;
use crate::input_queue::InputQueue;
use crate::metronome::Tick;
use crate::score_store::ScoreBoard;
use crate::shutdown::{ExitLatch, StopSignal};

pub(super) struct EngineContext {
    pub(super) state: SharedState,
    pub(super) queue: InputQueue,
    pub(super) stop: StopSignal,
    pub(super) exited: Arc<ExitLatch>,
    pub(super) ticks: Receiver<Tick>,
    pub(super) tick_ms: u64,
    pub(super) wake_timeout: Duration,
    pub(super) scores: Option<ScoreBoard>,
}

/// Fires the stop signal and reports the exit however the loop ends.
struct EngineExit {
    stop: StopSignal,
    exited: Arc<ExitLatch>,
}

impl Drop for EngineExit {
    fn drop(&mut self) {
        self.stop.trigger();
        self.exited.arrive();
        info!("engine loop exited");
    }
}

pub(super) fn run(mut ctx: EngineContext) {
    let _exit = EngineExit {
        stop: ctx.stop.clone(),
        exited: ctx.exited.clone(),
    };
    debug!(tick_ms = ctx.tick_ms, "engine loop started");

    loop {
        match ctx.ticks.recv_timeout(ctx.wake_timeout) {
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                if ctx.stop.is_triggered() {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let final_score = {
            let mut state = ctx.state.lock();
            if !state.running() {
                break;
            }
            for event in ctx.queue.drain() {
                state.apply_input(event);
            }
            if !state.running() {
                break;
            }
            state.step(ctx.tick_ms);
            state.take_final_score()
        };

        record_score(&mut ctx.scores, final_score);
    }

    // A game that ended on the last tick still gets recorded.
    let final_score = ctx.state.lock().take_final_score();
    record_score(&mut ctx.scores, final_score);
}

/// Called without the state lock held; this does file I/O.
fn record_score(scores: &mut Option<ScoreBoard>, final_score: Option<(String, u32)>) {
    if let (Some(scores), Some((name, score))) = (scores.as_mut(), final_score) {
        scores.insert(&name, score);
    }
}
