use rand::Rng;

use super::utils::{euclidean, offset_by};
use crate::constants::{AMBUSH_LOOKAHEAD, REVERSE_PENALTY, SHY_CHASE_RADIUS};
use crate::types::{Behavior, Direction, Vec2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionWeights {
    pub up: f32,
    pub down: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for DirectionWeights {
    fn default() -> Self {
        Self {
            up: 1.0,
            down: 1.0,
            left: 1.0,
            right: 1.0,
        }
    }
}

impl DirectionWeights {
    pub fn get(&self, dir: Direction) -> f32 {
        match dir {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
            Direction::None => 0.0,
        }
    }

    fn slot(&mut self, dir: Direction) -> Option<&mut f32> {
        match dir {
            Direction::Up => Some(&mut self.up),
            Direction::Down => Some(&mut self.down),
            Direction::Left => Some(&mut self.left),
            Direction::Right => Some(&mut self.right),
            Direction::None => None,
        }
    }

    pub fn scale(&mut self, dir: Direction, factor: f32) {
        if let Some(weight) = self.slot(dir) {
            *weight *= factor;
        }
    }

    /// Multiplies every direction that reduces the distance to `target`.
    pub fn pull_toward(&mut self, from: Vec2, target: Vec2, factor: f32) {
        let dy = target.y - from.y;
        let dx = target.x - from.x;
        if dy < 0 {
            self.up *= factor;
        }
        if dy > 0 {
            self.down *= factor;
        }
        if dx < 0 {
            self.left *= factor;
        }
        if dx > 0 {
            self.right *= factor;
        }
    }

    pub fn flee(&mut self) {
        std::mem::swap(&mut self.up, &mut self.down);
        std::mem::swap(&mut self.left, &mut self.right);
    }

    pub fn total(&self) -> f32 {
        self.up + self.down + self.left + self.right
    }
}

/// What an agent can see when it picks a direction.
#[derive(Clone, Copy, Debug)]
pub struct TargetContext {
    pub agent: Vec2,
    pub heading: Direction,
    pub vulnerable: bool,
    pub player: Vec2,
    pub player_heading: Direction,
    pub corner: Vec2,
}

impl Behavior {
    pub fn target_weights<R: Rng>(self, ctx: &TargetContext, rng: &mut R) -> DirectionWeights {
        let mut weights = DirectionWeights::default();
        match self {
            Behavior::Chaser => weights.pull_toward(ctx.agent, ctx.player, 3.0),
            Behavior::Ambusher => {
                let ahead = offset_by(ctx.player, ctx.player_heading, AMBUSH_LOOKAHEAD);
                weights.pull_toward(ctx.agent, ahead, 2.5);
            }
            Behavior::Erratic => {
                weights.pull_toward(ctx.agent, ctx.player, 2.0);
                for dir in Direction::MOVES {
                    weights.scale(dir, 1.0 + rng.random::<f32>());
                }
            }
            Behavior::Shy => {
                if euclidean(ctx.agent, ctx.player) > SHY_CHASE_RADIUS {
                    weights.pull_toward(ctx.agent, ctx.player, 3.0);
                } else {
                    weights.pull_toward(ctx.agent, ctx.corner, 2.0);
                }
            }
        }
        weights
    }

    /// Full weighting: targeting rule, flight when vulnerable, reversal discount.
    pub fn steer<R: Rng>(self, ctx: &TargetContext, rng: &mut R) -> DirectionWeights {
        let mut weights = self.target_weights(ctx, rng);
        if ctx.vulnerable {
            weights.flee();
        }
        weights.scale(ctx.heading.opposite(), REVERSE_PENALTY);
        weights
    }
}

/// Picks a direction by cumulative-sum sampling over the open directions.
/// `open` is indexed like `Direction::MOVES`.
pub fn choose_direction<R: Rng>(
    weights: DirectionWeights,
    open: [bool; 4],
    rng: &mut R,
) -> Direction {
    let mut masked = weights;
    for (idx, dir) in Direction::MOVES.iter().enumerate() {
        if !open[idx] {
            masked.scale(*dir, 0.0);
        }
    }

    let total = masked.total();
    if total <= 0.0 {
        let candidates: Vec<Direction> = Direction::MOVES
            .iter()
            .zip(open)
            .filter(|(_, is_open)| *is_open)
            .map(|(dir, _)| *dir)
            .collect();
        if candidates.is_empty() {
            return Direction::None;
        }
        return candidates[rng.random_range(0..candidates.len())];
    }

    let mut roll = rng.random::<f32>() * total;
    let mut last_open = Direction::None;
    for dir in Direction::MOVES {
        let weight = masked.get(dir);
        if weight <= 0.0 {
            continue;
        }
        if roll < weight {
            return dir;
        }
        roll -= weight;
        last_open = dir;
    }
    last_open
}
