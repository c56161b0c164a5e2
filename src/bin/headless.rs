use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clap::Parser;
use maze_chase::board::Layout;
use maze_chase::config::SimConfig;
use maze_chase::input_queue::InputQueue;
use maze_chase::runtime::{Simulation, DEFAULT_SHUTDOWN_TIMEOUT};
use maze_chase::score_store::ScoreBoard;
use maze_chase::types::{Direction, InputEvent, Screen, Snapshot};
use maze_chase::{Result, SimError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info, warn};

/// Runs the threaded simulation without a window, steering the player with
/// a random-walk autopilot and printing frames to stdout.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Maze file; the built-in classic maze when omitted.
    #[arg(long)]
    layout: Option<PathBuf>,
    /// JSON file overriding simulation settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Score file to record the final score in.
    #[arg(long)]
    scores: Option<PathBuf>,
    #[arg(long, default_value = "Unknown")]
    name: String,
    #[arg(long, default_value_t = 30)]
    seconds: u64,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 200)]
    frame_ms: u64,
    /// One JSON snapshot per line instead of ASCII frames.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Debug, Serialize)]
struct RunReport {
    frames: u64,
    #[serde(rename = "finalScore")]
    final_score: u32,
    #[serde(rename = "livesLeft")]
    lives_left: u32,
    screen: Screen,
    #[serde(rename = "droppedInputs")]
    dropped_inputs: u64,
    anomalies: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("maze_chase=info,headless=info")
            }),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(report) => {
            info!(
                frames = report.frames,
                score = report.final_score,
                lives = report.lives_left,
                dropped_inputs = report.dropped_inputs,
                anomalies = report.anomalies.len(),
                "run finished"
            );
            if report.anomalies.is_empty() {
                ExitCode::SUCCESS
            } else {
                for anomaly in &report.anomalies {
                    warn!(%anomaly, "anomaly detected");
                }
                ExitCode::from(1)
            }
        }
        Err(error) => {
            error!(%error, "headless run failed");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<RunReport> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    let layout = match &cli.layout {
        Some(path) => Layout::from_file(path)?,
        None => Layout::classic(),
    };
    let scores = cli.scores.clone().map(ScoreBoard::new);
    let frame = Duration::from_millis(cli.frame_ms.max(1));
    let steer_every = config.tick();
    let seed = config.seed;

    let mut sim = Simulation::start(config, layout, scores)?;
    sim.set_username(&cli.name);
    sim.menu_select();

    let autopilot = Autopilot::spawn(sim.input(), steer_every, seed)?;
    let deadline = Instant::now() + Duration::from_secs(cli.seconds);
    let mut out = io::stdout().lock();
    let mut anomalies = Vec::new();
    let mut frames = 0u64;
    let mut last = sim.snapshot();

    while Instant::now() < deadline {
        thread::sleep(frame);
        last = sim.snapshot();
        frames += 1;
        for anomaly in collect_snapshot_anomalies(&last) {
            if !anomalies.contains(&anomaly) {
                anomalies.push(anomaly);
            }
        }
        render(&mut out, &last, cli.json)?;
        if !last.running || last.screen == Screen::GameOver {
            break;
        }
    }

    let dropped_inputs = autopilot.queue.dropped();
    autopilot.join();
    sim.shutdown(DEFAULT_SHUTDOWN_TIMEOUT)?;

    let report = RunReport {
        frames,
        final_score: last.score,
        lives_left: last.lives,
        screen: last.screen,
        dropped_inputs,
        anomalies,
    };
    if cli.json {
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
    }
    Ok(report)
}

/// Input producer standing in for a keyboard: turns at random every tick.
struct Autopilot {
    queue: InputQueue,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Autopilot {
    fn spawn(queue: InputQueue, every: Duration, seed: Option<u64>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(0xA11CE)),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let handle = {
            let queue = queue.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("autopilot".to_string())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        if rng.random::<f32>() < 0.35 {
                            let dir = Direction::MOVES[rng.random_range(0..Direction::MOVES.len())];
                            queue.publish(InputEvent::DirectionChange(dir));
                        }
                        thread::sleep(every);
                    }
                })
                .map_err(|source| SimError::Spawn {
                    name: "autopilot".to_string(),
                    source,
                })?
        };
        Ok(Self {
            queue,
            stop,
            handle,
        })
    }

    fn join(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot) -> Vec<String> {
    let mut anomalies = Vec::new();
    let count = |symbol: char| -> usize {
        snapshot
            .board
            .iter()
            .map(|row| row.chars().filter(|ch| *ch == symbol).count())
            .sum()
    };

    let players = count('@');
    if players != 1 {
        anomalies.push(format!("expected one player cell, found {players}"));
    }
    let active = snapshot
        .ghosts
        .iter()
        .filter(|ghost| !ghost.pending_respawn)
        .count();
    let agents = count('#');
    if agents != active {
        anomalies.push(format!("{agents} agent cells for {active} active agents"));
    }
    anomalies
}

fn render(out: &mut impl Write, snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(snapshot)?)?;
        return Ok(());
    }
    writeln!(
        out,
        "tick {:>5}  score {:>6}  lives {}  {:?}{}",
        snapshot.tick,
        snapshot.score,
        snapshot.lives,
        snapshot.screen,
        if snapshot.ghost_vulnerable {
            "  (agents vulnerable)"
        } else {
            ""
        }
    )?;
    for row in &snapshot.board {
        writeln!(out, "{row}")?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
