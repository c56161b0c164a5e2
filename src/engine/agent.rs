use super::*;

#[derive(Debug)]
pub struct Ghost {
    pub id: usize,
    pub behavior: Behavior,
    pub pos: Vec2,
    pub heading: Direction,
    pub vulnerable: bool,
    pub in_pen: bool,
    pub pending_respawn: bool,
    pub home: Vec2,
    pub respawn: Vec2,
    /// Terrain hidden under the agent, put back when it moves away.
    pub cell_content: Cell,
    pub(crate) pass: Option<PenPass>,
    pub(crate) boost: Option<BoostGrant>,
}

impl Ghost {
    pub(super) fn new(id: usize, behavior: Behavior, home: Vec2, respawn: Vec2) -> Self {
        Self {
            id,
            behavior,
            pos: home,
            heading: Direction::None,
            vulnerable: false,
            in_pen: true,
            pending_respawn: false,
            home,
            respawn,
            cell_content: Cell::Empty,
            pass: None,
            boost: None,
        }
    }

    pub fn has_key(&self) -> bool {
        self.pass.is_some()
    }

    pub fn has_exit_permit(&self) -> bool {
        self.pass.is_some()
    }

    pub fn has_pass(&self) -> bool {
        self.pass.is_some()
    }

    pub fn is_boosted(&self) -> bool {
        self.boost.is_some()
    }

    /// Dropping the pass and boost hands their tokens back to the pools.
    pub(super) fn release_resources(&mut self) {
        if self.pass.take().is_some() {
            debug!(agent = self.id, "pen pass released");
        }
        if self.boost.take().is_some() {
            debug!(agent = self.id, "speed boost released");
        }
    }

    pub fn view(&self) -> GhostView {
        GhostView {
            id: self.id,
            x: self.pos.x,
            y: self.pos.y,
            dir: self.heading,
            behavior: self.behavior,
            vulnerable: self.vulnerable,
            in_pen: self.in_pen,
            has_pass: self.has_pass(),
            boosted: self.is_boosted(),
            pending_respawn: self.pending_respawn,
        }
    }
}

/// Resources an agent thread should try for before moving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentPlan {
    pub needs_pass: bool,
    pub boost_eligible: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentOutcome {
    Idle,
    Stayed,
    Moved(Direction),
    Collided(Collision),
}

impl SimulationState {
    pub fn agent_count(&self) -> usize {
        self.ghosts.len()
    }

    pub fn agent_plan(&self, idx: usize) -> Option<AgentPlan> {
        let ghost = self.ghosts.get(idx)?;
        if ghost.pending_respawn {
            return None;
        }
        Some(AgentPlan {
            needs_pass: ghost.in_pen && ghost.pass.is_none(),
            boost_eligible: ghost.behavior.can_boost() && !ghost.in_pen && ghost.boost.is_none(),
        })
    }

    /// Stores a freshly acquired pass on the agent. Returns false (and the
    /// pass goes straight back) when the agent no longer needs one.
    pub fn grant_pass(&mut self, idx: usize, pass: PenPass) -> bool {
        let Some(ghost) = self.ghosts.get_mut(idx) else {
            return false;
        };
        if ghost.pending_respawn || !ghost.in_pen || ghost.pass.is_some() {
            return false;
        }
        ghost.pass = Some(pass);
        true
    }

    pub fn grant_boost(&mut self, idx: usize, boost: BoostGrant) -> bool {
        let Some(ghost) = self.ghosts.get_mut(idx) else {
            return false;
        };
        if ghost.pending_respawn || ghost.in_pen || ghost.boost.is_some() {
            return false;
        }
        ghost.boost = Some(boost);
        true
    }

    /// Drops an expired boost. True when one was dropped.
    pub fn expire_boost(&mut self, idx: usize, now: Instant) -> bool {
        let Some(ghost) = self.ghosts.get_mut(idx) else {
            return false;
        };
        if ghost.boost.as_ref().is_some_and(|boost| boost.is_expired(now)) {
            ghost.boost = None;
            debug!(agent = idx, "speed boost expired");
            return true;
        }
        false
    }

    pub fn is_boosted(&self, idx: usize) -> bool {
        self.ghosts.get(idx).is_some_and(Ghost::is_boosted)
    }

    /// Exit path of an agent thread.
    pub fn release_agent(&mut self, idx: usize) {
        if let Some(ghost) = self.ghosts.get_mut(idx) {
            ghost.release_resources();
        }
    }

    /// Brings a caught agent back into the pen with nothing held.
    pub fn respawn_agent(&mut self, idx: usize) -> bool {
        if !self.ghosts.get(idx).is_some_and(|g| g.pending_respawn) {
            return false;
        }
        self.ghosts[idx].release_resources();
        let respawn = self.ghosts[idx].respawn;
        let placed = self.place_agent_in_pen(idx, respawn);
        if placed {
            info!(agent = idx, pos = ?self.ghosts[idx].pos, "agent respawned");
        }
        placed
    }

    pub(super) fn eat_agent(&mut self, idx: usize) {
        self.score = self.score.saturating_add(GHOST_POINTS);
        let ghost = &mut self.ghosts[idx];
        self.board.set(ghost.pos, ghost.cell_content);
        ghost.pending_respawn = true;
        ghost.vulnerable = false;
        ghost.heading = Direction::None;
        ghost.release_resources();
        info!(agent = idx, score = self.score, "agent eaten");
    }

    /// In bounds, not a wall, not another agent; leaving the pen takes a
    /// pass and nobody walks back in.
    pub fn can_agent_enter(&self, idx: usize, next: Vec2) -> bool {
        let Some(ghost) = self.ghosts.get(idx) else {
            return false;
        };
        if !matches!(self.board.get(next), Some(cell) if cell != Cell::Wall && cell != Cell::Agent)
        {
            return false;
        }
        let pen = self.pen();
        match (pen.contains(ghost.pos), pen.contains(next)) {
            (true, false) => ghost.pass.is_some(),
            (false, true) => false,
            _ => true,
        }
    }

    /// One behaviour step: weigh, draw, move.
    pub fn advance_agent<R: Rng>(&mut self, idx: usize, rng: &mut R) -> AgentOutcome {
        if !self.ghosts.get(idx).is_some_and(|g| !g.pending_respawn) {
            return AgentOutcome::Idle;
        }
        self.ghosts[idx].vulnerable = self.ghost_vulnerable;

        let ghost = &self.ghosts[idx];
        let ctx = TargetContext {
            agent: ghost.pos,
            heading: ghost.heading,
            vulnerable: ghost.vulnerable,
            player: self.player,
            player_heading: self.direction,
            corner: Vec2::at(self.board.height - 1, 0),
        };
        let weights = ghost.behavior.steer(&ctx, rng);
        let open = Direction::MOVES.map(|dir| self.can_agent_enter(idx, offset(ctx.agent, dir)));
        let dir = choose_direction(weights, open, rng);
        self.apply_agent_move(idx, dir)
    }

    pub(crate) fn apply_agent_move(&mut self, idx: usize, dir: Direction) -> AgentOutcome {
        if dir == Direction::None {
            return AgentOutcome::Stayed;
        }
        let next = offset(self.ghosts[idx].pos, dir);
        if !self.can_agent_enter(idx, next) {
            return AgentOutcome::Stayed;
        }
        self.ghosts[idx].heading = dir;
        if next == self.player {
            return AgentOutcome::Collided(self.resolve_collision(idx));
        }

        let pen = self.pen();
        let ghost = &mut self.ghosts[idx];
        self.board.set(ghost.pos, ghost.cell_content);
        ghost.cell_content = self.board.get(next).unwrap_or(Cell::Empty);
        ghost.pos = next;
        self.board.set(next, Cell::Agent);

        let left_pen = ghost.in_pen && !pen.contains(next);
        ghost.in_pen = pen.contains(next);
        if left_pen {
            info!(agent = idx, "agent left the pen");
        }
        AgentOutcome::Moved(dir)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::board::Layout;
    use crate::config::SimConfig;
    use crate::engine::{AgentOutcome, Collision, SimulationState};
    use crate::ghost_house::GhostHouse;
    use crate::types::{Cell, Direction, InputEvent, Screen, Vec2};

    const QUICK: Duration = Duration::from_millis(5);
    const PEN_EXIT: Vec2 = Vec2::at(8, 10);
    const BELOW_EXIT: Vec2 = Vec2::at(9, 10);

    fn fresh() -> SimulationState {
        let mut state =
            SimulationState::new(Layout::classic(), SimConfig::default()).expect("classic level");
        state.apply_input(InputEvent::ScreenChange(Screen::Play));
        state
    }

    fn put_agent(state: &mut SimulationState, idx: usize, pos: Vec2) {
        let old = state.ghosts[idx].pos;
        let under = state.ghosts[idx].cell_content;
        state.board.set(old, under);
        state.ghosts[idx].cell_content = state.board.get(pos).expect("cell in bounds");
        state.ghosts[idx].pos = pos;
        state.ghosts[idx].in_pen = state.pen().contains(pos);
        state.board.set(pos, Cell::Agent);
    }

    #[test]
    fn agent_without_pass_never_leaves_the_pen() {
        let mut state = fresh();
        put_agent(&mut state, 0, PEN_EXIT);
        assert!(!state.can_agent_enter(0, BELOW_EXIT));

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..300 {
            state.advance_agent(0, &mut rng);
            assert!(state.ghosts()[0].in_pen);
            assert!(state.pen().contains(state.ghosts()[0].pos));
        }
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn agent_with_pass_walks_out_and_keeps_it() {
        let mut state = fresh();
        let house = GhostHouse::new(3, 3, 2);
        put_agent(&mut state, 0, PEN_EXIT);
        let pass = house.acquire_pass(0, QUICK).expect("pass");
        assert!(state.grant_pass(0, pass));
        assert!(state.can_agent_enter(0, BELOW_EXIT));

        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            state.advance_agent(0, &mut rng);
            if !state.ghosts()[0].in_pen {
                break;
            }
        }
        let ghost = &state.ghosts()[0];
        assert!(!ghost.in_pen);
        assert!(ghost.has_key() && ghost.has_exit_permit());
        assert_eq!(house.keys().available(), 2);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn active_agents_cannot_reenter_the_pen() {
        let mut state = fresh();
        put_agent(&mut state, 0, BELOW_EXIT);
        assert!(!state.ghosts()[0].in_pen);
        assert!(!state.can_agent_enter(0, PEN_EXIT));
        assert_eq!(state.apply_agent_move(0, Direction::Up), AgentOutcome::Stayed);
    }

    #[test]
    fn agents_do_not_stack() {
        let mut state = fresh();
        put_agent(&mut state, 0, Vec2::at(9, 9));
        put_agent(&mut state, 1, Vec2::at(9, 10));
        assert!(!state.can_agent_enter(0, Vec2::at(9, 10)));
        assert_eq!(state.apply_agent_move(0, Direction::Right), AgentOutcome::Stayed);
    }

    #[test]
    fn moving_restores_the_terrain_left_behind() {
        let mut state = fresh();
        put_agent(&mut state, 2, Vec2::at(9, 9));
        assert_eq!(state.ghosts()[2].cell_content, Cell::Dot);

        assert_eq!(
            state.apply_agent_move(2, Direction::Left),
            AgentOutcome::Moved(Direction::Left)
        );
        assert_eq!(state.board().get(Vec2::at(9, 9)), Some(Cell::Dot));
        assert_eq!(state.board().get(Vec2::at(9, 8)), Some(Cell::Agent));
        assert_eq!(state.ghosts()[2].heading, Direction::Left);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn agent_catching_the_player_costs_a_life() {
        let mut state = fresh();
        put_agent(&mut state, 0, Vec2::at(17, 12));
        let outcome = state.apply_agent_move(0, Direction::Down);
        assert_eq!(
            outcome,
            AgentOutcome::Collided(Collision::LifeLost { lives_left: 2 })
        );
        assert_eq!(state.score(), 0);
        assert_eq!(state.ghosts()[0].pos, state.ghosts()[0].respawn);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn vulnerable_agent_running_into_the_player_is_eaten() {
        let mut state = fresh();
        put_agent(&mut state, 0, Vec2::at(17, 12));
        state.ghost_vulnerable = true;
        state.ghosts[0].vulnerable = true;
        let outcome = state.apply_agent_move(0, Direction::Down);
        assert_eq!(outcome, AgentOutcome::Collided(Collision::AgentEaten { agent: 0 }));
        assert_eq!(state.score(), 200);
        assert_eq!(state.lives(), 3);
        assert!(state.ghosts()[0].pending_respawn);
        assert_eq!(state.board().get(Vec2::at(17, 12)), Some(Cell::Dot));
        assert_eq!(state.advance_agent(0, &mut StdRng::seed_from_u64(1)), AgentOutcome::Idle);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn collision_outcome_is_bonus_or_life_never_both() {
        for vulnerable in [false, true] {
            let mut state = fresh();
            put_agent(&mut state, 3, Vec2::at(17, 12));
            state.ghosts[3].vulnerable = vulnerable;
            state.ghost_vulnerable = vulnerable;
            let (score, lives) = (state.score(), state.lives());
            state.apply_agent_move(3, Direction::Down);
            let scored = state.score() - score;
            let lost = lives - state.lives();
            if vulnerable {
                assert_eq!((scored, lost), (200, 0));
            } else {
                assert_eq!((scored, lost), (0, 1));
            }
        }
    }

    #[test]
    fn eaten_agent_returns_its_pass() {
        let mut state = fresh();
        let house = GhostHouse::new(1, 1, 1);
        put_agent(&mut state, 0, PEN_EXIT);
        assert!(state.grant_pass(0, house.acquire_pass(0, QUICK).expect("pass")));
        state.apply_agent_move(0, Direction::Down);
        let boost = house
            .acquire_boost(0, QUICK, Duration::from_secs(5), Instant::now())
            .expect("boost");
        assert!(state.grant_boost(0, boost));
        assert_eq!(house.keys().available(), 0);
        assert_eq!(house.boosts().available(), 0);

        state.ghosts[0].vulnerable = true;
        state.eat_agent(0);
        assert_eq!(house.keys().available(), 1);
        assert_eq!(house.permits().available(), 1);
        assert_eq!(house.boosts().available(), 1);

        assert!(state.respawn_agent(0));
        assert!(!state.respawn_agent(0));
        assert!(state.agent_plan(0).expect("plan").needs_pass);
    }

    #[test]
    fn respawn_falls_back_when_the_respawn_cell_is_taken() {
        let mut state = fresh();
        state.ghosts[0].vulnerable = true;
        state.eat_agent(0);
        let respawn = state.ghosts()[0].respawn;
        put_agent(&mut state, 1, respawn);

        assert!(state.respawn_agent(0));
        assert_eq!(state.ghosts()[0].pos, state.ghosts()[0].home);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn passes_are_refused_outside_the_pen() {
        let mut state = fresh();
        let house = GhostHouse::new(1, 1, 0);
        put_agent(&mut state, 0, BELOW_EXIT);
        assert!(!state.grant_pass(0, house.acquire_pass(0, QUICK).expect("pass")));
        assert_eq!(house.keys().available(), 1);
        assert_eq!(house.permits().available(), 1);
    }

    #[test]
    fn boosts_expire_and_return_their_token() {
        let mut state = fresh();
        let house = GhostHouse::new(1, 1, 1);
        put_agent(&mut state, 1, BELOW_EXIT);
        let plan = state.agent_plan(1).expect("plan");
        assert!(plan.boost_eligible);
        assert!(!plan.needs_pass);

        let now = Instant::now();
        let boost = house
            .acquire_boost(1, QUICK, Duration::from_millis(10), now)
            .expect("boost");
        assert!(state.grant_boost(1, boost));
        assert!(state.is_boosted(1));
        assert!(!state.agent_plan(1).expect("plan").boost_eligible);

        assert!(!state.expire_boost(1, now));
        assert!(state.expire_boost(1, now + Duration::from_millis(10)));
        assert!(!state.is_boosted(1));
        assert_eq!(house.boosts().available(), 1);
    }

    #[test]
    fn shy_and_erratic_agents_never_boost() {
        let mut state = fresh();
        put_agent(&mut state, 2, BELOW_EXIT);
        assert!(!state.agent_plan(2).expect("plan").boost_eligible);
    }

    #[test]
    fn level_reset_returns_everything() {
        let mut state = fresh();
        let house = GhostHouse::new(2, 2, 0);
        for idx in 0..2 {
            assert!(state.grant_pass(idx, house.acquire_pass(idx, QUICK).expect("pass")));
        }
        assert_eq!(house.keys().available(), 0);
        state.reset_level();
        assert_eq!(house.keys().available(), 2);
        assert_eq!(house.permits().available(), 2);

        assert!(state.grant_pass(0, house.acquire_pass(0, QUICK).expect("pass")));
        state.release_agent(0);
        assert_eq!(house.keys().available(), 2);
    }
}
