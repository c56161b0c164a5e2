pub const ROWS: i32 = 20;
pub const COLS: i32 = 20;

pub const TICK_MS: u64 = 200;
pub const AGENT_BASE_INTERVAL_MS: u64 = 200;
pub const AGENT_INTERVAL_STEP_MS: u64 = 50;

pub const DOT_POINTS: u32 = 10;
pub const POWER_PELLET_POINTS: u32 = 50;
pub const GHOST_POINTS: u32 = 200;
pub const STARTING_LIVES: u32 = 3;

pub const POWER_PELLET_DURATION_MS: u64 = 10_000;
pub const VULNERABILITY_DURATION_MS: u64 = 6_000;

pub const MAX_KEYS: usize = 3;
pub const MAX_EXIT_PERMITS: usize = 3;
pub const MAX_SPEED_BOOSTS: usize = 2;
pub const RESOURCE_TIMEOUT_MS: u64 = 1_000;
pub const BOOST_TIMEOUT_MS: u64 = 50;
pub const BOOST_DURATION_MS: u64 = 5_000;
pub const BOOST_CHANCE: f32 = 0.3;

pub const STATE_LOCK_TIMEOUT_MS: u64 = 1_000;
pub const AGENT_WAKE_TIMEOUT_MS: u64 = 2_000;

pub const INPUT_QUEUE_CAPACITY: usize = 10;

pub const AMBUSH_LOOKAHEAD: i32 = 4;
pub const SHY_CHASE_RADIUS: f32 = 8.0;
pub const REVERSE_PENALTY: f32 = 0.2;

pub const MAX_SCORES: usize = 10;
pub const MAX_NAME_LEN: usize = 31;
pub const DEFAULT_USERNAME: &str = "Unknown";

pub fn agent_interval_ms(base_ms: u64, step_ms: u64, agent_id: usize) -> u64 {
    base_ms.saturating_add(step_ms.saturating_mul(agent_id as u64))
}

pub fn boosted_interval_ms(interval_ms: u64) -> u64 {
    (interval_ms / 2).max(1)
}

pub fn rotation_for(direction: crate::types::Direction) -> Option<f32> {
    use crate::types::Direction;
    match direction {
        Direction::Up => Some(270.0),
        Direction::Down => Some(90.0),
        Direction::Left => Some(180.0),
        Direction::Right => Some(0.0),
        Direction::None => None,
    }
}
