use std::time::Instant;

use rand::Rng;
use tracing::{debug, info};

use crate::board::{is_walkable, parse_layout, Grid, Layout, ParsedLevel, PenArea};
use crate::config::SimConfig;
use crate::constants::{rotation_for, DOT_POINTS, GHOST_POINTS, POWER_PELLET_POINTS};
use crate::error::Result;
use crate::ghost_house::{BoostGrant, PenPass};
use crate::types::{
    Behavior, Cell, Direction, GhostView, InputEvent, PlayerView, PoolView, Screen, Snapshot,
    Vec2,
};
use crate::ui::Menu;

mod agent;
mod behavior;
mod utils;

pub use self::agent::{AgentOutcome, AgentPlan, Ghost};
pub use self::behavior::{choose_direction, DirectionWeights, TargetContext};

use self::utils::{manhattan, offset};

/// What happened when the player and an agent met.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collision {
    AgentEaten { agent: usize },
    LifeLost { lives_left: u32 },
}

/// Board and game state. Every thread reaches it through one lock, so each
/// method leaves the board and the entity positions in agreement.
#[derive(Debug)]
pub struct SimulationState {
    config: SimConfig,
    layout: Layout,
    level: ParsedLevel,

    board: Grid<Cell>,
    power_pellets: Grid<bool>,
    player: Vec2,
    direction: Direction,
    rotation: f32,
    ghosts: Vec<Ghost>,

    score: u32,
    lives: u32,
    running: bool,
    paused: bool,
    screen: Screen,
    power_pellet_active: bool,
    power_pellet_elapsed_ms: u64,
    ghost_vulnerable: bool,
    vulnerable_elapsed_ms: u64,

    tick: u64,
    menu: Menu,
    score_recorded: bool,
}

impl SimulationState {
    pub fn new(layout: Layout, config: SimConfig) -> Result<Self> {
        config.validate()?;
        let level = parse_layout(&layout)?;
        let ghosts = (0..layout.agent_count())
            .map(|id| {
                Ghost::new(
                    id,
                    Behavior::from_index(id),
                    layout.homes[id],
                    layout.respawns[id],
                )
            })
            .collect();

        let mut state = Self {
            board: level.board.clone(),
            power_pellets: level.power_pellets.clone(),
            player: level.player_start,
            direction: Direction::None,
            rotation: 0.0,
            ghosts,
            score: 0,
            lives: config.starting_lives,
            running: true,
            paused: false,
            screen: Screen::Menu,
            power_pellet_active: false,
            power_pellet_elapsed_ms: 0,
            ghost_vulnerable: false,
            vulnerable_elapsed_ms: 0,
            tick: 0,
            menu: Menu::default(),
            score_recorded: false,
            config,
            layout,
            level,
        };
        state.reset_level();
        state.screen = Screen::Menu;
        Ok(state)
    }

    /// Fresh board, score, lives and timers; every agent back home with
    /// nothing held.
    pub fn reset_level(&mut self) {
        for ghost in &mut self.ghosts {
            ghost.release_resources();
        }
        self.board = self.level.board.clone();
        self.power_pellets = self.level.power_pellets.clone();
        self.player = self.level.player_start;
        self.direction = Direction::None;
        self.rotation = 0.0;
        self.score = 0;
        self.lives = self.config.starting_lives;
        self.paused = false;
        self.power_pellet_active = false;
        self.power_pellet_elapsed_ms = 0;
        self.ghost_vulnerable = false;
        self.vulnerable_elapsed_ms = 0;
        self.score_recorded = false;

        for idx in 0..self.ghosts.len() {
            let home = self.ghosts[idx].home;
            self.place_agent_in_pen(idx, home);
        }
        self.screen = Screen::Play;
        info!(agents = self.ghosts.len(), "level started");
    }

    pub fn apply_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::DirectionChange(dir) => self.set_direction(dir),
            InputEvent::ScreenChange(Screen::Play) => self.reset_level(),
            InputEvent::ScreenChange(Screen::Quit) => {
                self.screen = Screen::Quit;
                self.running = false;
                info!("quit requested");
            }
            InputEvent::ScreenChange(screen) => {
                debug!(?screen, "screen changed");
                self.screen = screen;
            }
        }
    }

    pub fn set_direction(&mut self, dir: Direction) {
        self.direction = dir;
        if let Some(rotation) = rotation_for(dir) {
            self.rotation = rotation;
        }
    }

    /// One engine tick of gameplay: the player moves, then the timers run.
    pub fn step(&mut self, dt_ms: u64) -> Option<Collision> {
        if !self.is_live() {
            return None;
        }
        self.tick = self.tick.saturating_add(1);
        let collision = self.advance_player();
        self.advance_timers(dt_ms);
        collision
    }

    pub fn advance_player(&mut self) -> Option<Collision> {
        if self.direction == Direction::None {
            return None;
        }
        let next = offset(self.player, self.direction);
        if !self.can_player_enter(next) {
            return None;
        }

        match self.board.get(next) {
            Some(Cell::Agent) => {
                let agent = self.active_agent_at(next)?;
                return Some(self.resolve_collision(agent));
            }
            Some(Cell::Dot) => {
                self.score = self.score.saturating_add(DOT_POINTS);
            }
            Some(Cell::PowerPellet) if !self.ghost_vulnerable => {
                self.score = self.score.saturating_add(POWER_PELLET_POINTS);
                self.power_pellets.set(next, false);
                self.start_vulnerability();
            }
            _ => {}
        }

        let vacated = self.terrain_under_player(self.player);
        self.board.set(self.player, vacated);
        self.player = next;
        self.board.set(next, Cell::Player);
        None
    }

    pub fn advance_timers(&mut self, dt_ms: u64) {
        if self.power_pellet_active {
            self.power_pellet_elapsed_ms = self.power_pellet_elapsed_ms.saturating_add(dt_ms);
            if self.power_pellet_elapsed_ms >= self.config.power_pellet_duration_ms {
                self.power_pellet_active = false;
                self.power_pellet_elapsed_ms = 0;
                debug!("power pellet expired");
            }
        }
        if self.ghost_vulnerable {
            self.vulnerable_elapsed_ms = self.vulnerable_elapsed_ms.saturating_add(dt_ms);
            if self.vulnerable_elapsed_ms >= self.config.vulnerability_duration_ms {
                self.ghost_vulnerable = false;
                self.vulnerable_elapsed_ms = 0;
                for ghost in &mut self.ghosts {
                    ghost.vulnerable = false;
                }
                debug!("vulnerability window closed");
            }
        }
    }

    fn start_vulnerability(&mut self) {
        self.power_pellet_active = true;
        self.power_pellet_elapsed_ms = 0;
        self.ghost_vulnerable = true;
        self.vulnerable_elapsed_ms = 0;
        for ghost in self.ghosts.iter_mut().filter(|g| !g.pending_respawn) {
            ghost.vulnerable = true;
        }
        info!(score = self.score, "power pellet eaten, agents vulnerable");
    }

    /// Bonus for a vulnerable agent, a life otherwise. Neither entity moves
    /// into the contested cell.
    pub(crate) fn resolve_collision(&mut self, agent: usize) -> Collision {
        if self.ghosts[agent].vulnerable {
            self.eat_agent(agent);
            Collision::AgentEaten { agent }
        } else {
            self.lose_life();
            Collision::LifeLost {
                lives_left: self.lives,
            }
        }
    }

    pub fn lose_life(&mut self) {
        self.lives = self.lives.saturating_sub(1);
        self.direction = Direction::None;
        info!(lives = self.lives, score = self.score, "life lost");

        for ghost in self.ghosts.iter().filter(|g| !g.pending_respawn) {
            self.board.set(ghost.pos, ghost.cell_content);
        }
        let vacated = self.terrain_under_player(self.player);
        self.board.set(self.player, vacated);
        self.player = self.level.player_start;
        self.board.set(self.player, Cell::Player);

        for idx in 0..self.ghosts.len() {
            self.ghosts[idx].release_resources();
            let respawn = self.ghosts[idx].respawn;
            self.place_agent_in_pen(idx, respawn);
        }

        if self.lives == 0 {
            self.screen = Screen::GameOver;
            info!(score = self.score, "game over");
        }
    }

    fn can_player_enter(&self, pos: Vec2) -> bool {
        is_walkable(&self.board, pos) && !self.pen().contains(pos)
    }

    fn terrain_under_player(&self, pos: Vec2) -> Cell {
        if self.power_pellets.get(pos).unwrap_or(false) {
            Cell::PowerPellet
        } else {
            Cell::Empty
        }
    }

    fn active_agent_at(&self, pos: Vec2) -> Option<usize> {
        self.ghosts
            .iter()
            .position(|ghost| !ghost.pending_respawn && ghost.pos == pos)
    }

    /// Free pen cell nearest to `preferred`, trying `preferred` itself and
    /// the agent's home first.
    fn free_pen_cell(&self, preferred: Vec2, home: Vec2) -> Option<Vec2> {
        if self.is_free(preferred) {
            return Some(preferred);
        }
        if self.is_free(home) {
            return Some(home);
        }
        let mut cells: Vec<Vec2> = self
            .pen()
            .cells()
            .filter(|pos| self.is_free(*pos))
            .collect();
        cells.sort_by_key(|pos| manhattan(*pos, preferred));
        cells.first().copied()
    }

    fn is_free(&self, pos: Vec2) -> bool {
        matches!(self.board.get(pos), Some(cell) if cell.is_terrain() && cell != Cell::Wall)
    }

    /// Marks the agent as present in the pen. Leaves it pending when every
    /// pen cell is taken.
    fn place_agent_in_pen(&mut self, idx: usize, preferred: Vec2) -> bool {
        let home = self.ghosts[idx].home;
        let Some(pos) = self.free_pen_cell(preferred, home) else {
            self.ghosts[idx].pending_respawn = true;
            debug!(agent = idx, "no free pen cell");
            return false;
        };
        let content = self.board.get(pos).unwrap_or(Cell::Empty);
        let ghost = &mut self.ghosts[idx];
        ghost.pos = pos;
        ghost.cell_content = content;
        ghost.heading = Direction::None;
        ghost.vulnerable = false;
        ghost.pending_respawn = false;
        ghost.in_pen = true;
        self.board.set(pos, Cell::Agent);
        true
    }

    /// Hands out the final score once per game, the first time game over is seen.
    pub fn take_final_score(&mut self) -> Option<(String, u32)> {
        if self.screen != Screen::GameOver || self.score_recorded {
            return None;
        }
        self.score_recorded = true;
        Some((self.menu.username().to_string(), self.score))
    }

    pub fn build_snapshot(&self, pools: Option<PoolView>) -> Snapshot {
        Snapshot {
            tick: self.tick,
            screen: self.screen,
            running: self.running,
            paused: self.paused,
            score: self.score,
            lives: self.lives,
            board: self.board.rows(),
            player: PlayerView {
                x: self.player.x,
                y: self.player.y,
                dir: self.direction,
                rotation: self.rotation,
            },
            ghosts: self.ghosts.iter().map(Ghost::view).collect(),
            power_pellet_active: self.power_pellet_active,
            power_pellet_elapsed_ms: self.power_pellet_elapsed_ms,
            ghost_vulnerable: self.ghost_vulnerable,
            vulnerable_elapsed_ms: self.vulnerable_elapsed_ms,
            menu_selection: self.menu.selection(),
            username: self.menu.username().to_string(),
            pools,
        }
    }

    /// Exactly one player cell, and one agent cell per active agent under it.
    pub fn occupancy_is_consistent(&self) -> bool {
        let players = self.board.count(|cell| cell == Cell::Player);
        let agents = self.board.count(|cell| cell == Cell::Agent);
        let active: Vec<&Ghost> = self.ghosts.iter().filter(|g| !g.pending_respawn).collect();
        players == 1
            && self.board.get(self.player) == Some(Cell::Player)
            && agents == active.len()
            && active
                .iter()
                .all(|ghost| self.board.get(ghost.pos) == Some(Cell::Agent))
    }

    pub fn is_live(&self) -> bool {
        self.running && !self.paused && self.screen == Screen::Play
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn player(&self) -> Vec2 {
        self.player
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn ghost_vulnerable(&self) -> bool {
        self.ghost_vulnerable
    }

    pub fn ghosts(&self) -> &[Ghost] {
        &self.ghosts
    }

    pub fn board(&self) -> &Grid<Cell> {
        &self.board
    }

    pub fn pen(&self) -> PenArea {
        self.layout.pen
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn menu_mut(&mut self) -> &mut Menu {
        &mut self.menu
    }
}

#[cfg(test)]
mod tests {
    use crate::board::Layout;
    use crate::config::SimConfig;
    use crate::ghost_house::GhostHouse;
    use crate::types::{Cell, Direction, InputEvent, Screen, Vec2};

    use super::{Collision, SimulationState};

    const START: Vec2 = Vec2::at(18, 12);

    fn fresh() -> SimulationState {
        let mut state =
            SimulationState::new(Layout::classic(), SimConfig::default()).expect("classic level");
        state.apply_input(InputEvent::ScreenChange(Screen::Play));
        state
    }

    /// Moves an agent onto `pos` the way a real move would, keeping the
    /// board in step.
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
    fn simulation_starts_on_the_menu_with_a_loaded_level() {
        let state =
            SimulationState::new(Layout::classic(), SimConfig::default()).expect("classic level");
        assert_eq!(state.screen(), Screen::Menu);
        assert!(state.running());
        assert_eq!(state.lives(), 3);
        assert_eq!(state.ghosts().len(), 4);
        assert!(state.occupancy_is_consistent());
        assert!(state.ghosts().iter().all(|g| g.in_pen));
    }

    #[test]
    fn eating_a_dot_scores_ten_and_clears_the_cell() {
        let mut state = fresh();
        let dot = Vec2::at(18, 13);
        assert_eq!(state.board().get(dot), Some(Cell::Dot));

        state.set_direction(Direction::Right);
        assert_eq!(state.advance_player(), None);
        assert_eq!(state.score(), 10);
        assert_eq!(state.player(), dot);

        state.set_direction(Direction::Left);
        state.advance_player();
        assert_eq!(state.board().get(dot), Some(Cell::Empty));
        assert_eq!(state.score(), 10);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn power_pellet_starts_a_vulnerability_window() {
        let mut state = fresh();
        let pellet = Vec2::at(18, 13);
        state.board.set(pellet, Cell::PowerPellet);
        state.power_pellets.set(pellet, true);

        state.set_direction(Direction::Right);
        state.advance_player();
        assert_eq!(state.score(), 50);
        assert!(state.ghost_vulnerable());
        assert_eq!(state.vulnerable_elapsed_ms, 0);
        assert!(state.power_pellet_active);
        assert!(state.ghosts().iter().all(|g| g.vulnerable));

        state.set_direction(Direction::Left);
        state.advance_player();
        assert_eq!(state.board().get(pellet), Some(Cell::Empty));
    }

    #[test]
    fn power_pellet_is_preserved_while_already_vulnerable() {
        let mut state = fresh();
        let pellet = Vec2::at(18, 13);
        state.board.set(pellet, Cell::PowerPellet);
        state.power_pellets.set(pellet, true);
        state.ghost_vulnerable = true;
        state.vulnerable_elapsed_ms = 4_000;

        state.set_direction(Direction::Right);
        state.advance_player();
        assert_eq!(state.score(), 0);
        assert_eq!(state.vulnerable_elapsed_ms, 4_000);

        state.set_direction(Direction::Left);
        state.advance_player();
        assert_eq!(state.board().get(pellet), Some(Cell::PowerPellet));
    }

    #[test]
    fn timers_expire_at_their_thresholds() {
        let mut state = fresh();
        state.start_vulnerability();
        state.advance_timers(5_800);
        assert!(state.ghost_vulnerable());
        state.advance_timers(200);
        assert!(!state.ghost_vulnerable());
        assert!(state.ghosts().iter().all(|g| !g.vulnerable));
        assert!(state.power_pellet_active);
        state.advance_timers(4_000);
        assert!(!state.power_pellet_active);
    }

    #[test]
    fn touching_a_hunting_agent_costs_a_life_and_resets_positions() {
        let mut state = fresh();
        let house = GhostHouse::new(3, 3, 2);
        state.set_direction(Direction::Right);
        state.advance_player();
        let score_before = state.score();

        put_agent(&mut state, 2, Vec2::at(18, 14));
        let pass = house
            .acquire_pass(2, std::time::Duration::from_millis(5))
            .expect("pass");
        state.ghosts[2].pass = Some(pass);
        assert_eq!(house.keys().available(), 2);

        state.set_direction(Direction::Right);
        let collision = state.advance_player();
        assert_eq!(collision, Some(Collision::LifeLost { lives_left: 2 }));
        assert_eq!(state.score(), score_before);
        assert_eq!(state.player(), START);
        assert_eq!(state.direction(), Direction::None);
        for ghost in state.ghosts() {
            assert_eq!(ghost.pos, ghost.respawn);
            assert!(ghost.in_pen);
            assert!(!ghost.has_pass());
        }
        assert_eq!(house.keys().available(), 3);
        assert_eq!(house.permits().available(), 3);
        assert!(state.occupancy_is_consistent());
        assert_eq!(state.board().get(Vec2::at(18, 14)), Some(Cell::Dot));
    }

    #[test]
    fn touching_a_vulnerable_agent_scores_and_sends_it_home() {
        let mut state = fresh();
        let spot = Vec2::at(18, 13);
        put_agent(&mut state, 1, spot);
        state.start_vulnerability();
        let score_before = state.score();

        state.set_direction(Direction::Right);
        let collision = state.advance_player();
        assert_eq!(collision, Some(Collision::AgentEaten { agent: 1 }));
        assert_eq!(state.score(), score_before + 200);
        assert_eq!(state.lives(), 3);
        assert!(state.ghosts()[1].pending_respawn);
        assert_eq!(state.board().get(spot), Some(Cell::Dot));
        assert_eq!(state.player(), START);
        assert!(state.occupancy_is_consistent());

        assert!(state.respawn_agent(1));
        let ghost = &state.ghosts()[1];
        assert_eq!(ghost.pos, ghost.respawn);
        assert!(ghost.in_pen);
        assert!(!ghost.vulnerable);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn last_life_moves_to_game_over_and_records_once() {
        let mut state = fresh();
        state.menu_mut().set_username("ada");
        state.lives = 1;
        state.score = 420;
        state.lose_life();
        assert_eq!(state.screen(), Screen::GameOver);
        assert!(!state.is_live());
        assert_eq!(state.take_final_score(), Some(("ada".to_string(), 420)));
        assert_eq!(state.take_final_score(), None);
    }

    #[test]
    fn player_cannot_walk_into_walls_or_the_pen() {
        let mut state = fresh();
        state.set_direction(Direction::Down);
        state.advance_player();
        assert_eq!(state.player(), START);

        let below_exit = Vec2::at(9, 10);
        let vacated = state.terrain_under_player(state.player);
        state.board.set(state.player, vacated);
        state.player = below_exit;
        state.board.set(below_exit, Cell::Player);
        state.set_direction(Direction::Up);
        state.advance_player();
        assert_eq!(state.player(), below_exit);
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn input_events_drive_direction_and_screens() {
        let mut state = fresh();
        state.apply_input(InputEvent::DirectionChange(Direction::Up));
        assert_eq!(state.direction(), Direction::Up);
        assert_eq!(state.rotation, 270.0);

        state.apply_input(InputEvent::ScreenChange(Screen::Scoreboard));
        assert_eq!(state.screen(), Screen::Scoreboard);
        assert_eq!(state.step(200), None);
        assert_eq!(state.tick, 0);

        state.apply_input(InputEvent::ScreenChange(Screen::Quit));
        assert!(!state.running());
    }

    #[test]
    fn replaying_resets_score_and_board() {
        let mut state = fresh();
        state.set_direction(Direction::Right);
        state.step(200);
        state.step(200);
        assert_eq!(state.score(), 20);

        state.apply_input(InputEvent::ScreenChange(Screen::Play));
        assert_eq!(state.score(), 0);
        assert_eq!(state.player(), START);
        assert_eq!(state.board().get(Vec2::at(18, 13)), Some(Cell::Dot));
        assert!(state.occupancy_is_consistent());
    }

    #[test]
    fn paused_simulation_does_not_advance() {
        let mut state = fresh();
        state.set_direction(Direction::Right);
        assert!(state.toggle_pause());
        state.step(200);
        assert_eq!(state.player(), START);
        assert!(!state.toggle_pause());
        state.step(200);
        assert_eq!(state.player(), Vec2::at(18, 13));
    }

    #[test]
    fn snapshot_reflects_state() {
        let state = fresh();
        let snapshot = state.build_snapshot(None);
        assert_eq!(snapshot.board.len(), 20);
        assert_eq!(snapshot.board[18].chars().nth(12), Some('@'));
        assert_eq!(snapshot.ghosts.len(), 4);
        assert_eq!(snapshot.lives, 3);
        assert_eq!(snapshot.username, "Unknown");
        let json = serde_json::to_string(&snapshot).expect("snapshot should serialize");
        assert!(json.contains("\"screen\":\"play\""));
    }
}
