use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub const MOVES: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::None => Self::None,
        }
    }

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" | "w" => Some(Self::Up),
            "down" | "s" => Some(Self::Down),
            "left" | "a" => Some(Self::Left),
            "right" | "d" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Builds a position from grid coordinates (row first).
    pub const fn at(row: i32, col: i32) -> Self {
        Self { x: col, y: row }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Menu,
    Play,
    Scoreboard,
    Instructions,
    Quit,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Wall,
    Empty,
    Dot,
    PowerPellet,
    Agent,
    Player,
}

impl Cell {
    pub fn symbol(self) -> char {
        match self {
            Self::Wall => '=',
            Self::Empty => ' ',
            Self::Dot => '.',
            Self::PowerPellet => '0',
            Self::Agent => '#',
            Self::Player => '@',
        }
    }

    pub fn is_terrain(self) -> bool {
        !matches!(self, Self::Agent | Self::Player)
    }
}

/// Targeting strategy of an agent. Numbered 1..=4 in level files and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Chaser,
    Ambusher,
    Erratic,
    Shy,
}

impl Behavior {
    pub fn from_index(index: usize) -> Self {
        match index % 4 {
            0 => Self::Chaser,
            1 => Self::Ambusher,
            2 => Self::Erratic,
            _ => Self::Shy,
        }
    }

    pub fn type_number(self) -> u8 {
        match self {
            Self::Chaser => 1,
            Self::Ambusher => 2,
            Self::Erratic => 3,
            Self::Shy => 4,
        }
    }

    pub fn can_boost(self) -> bool {
        matches!(self, Self::Chaser | Self::Ambusher)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InputEvent {
    DirectionChange(Direction),
    ScreenChange(Screen),
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub rotation: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub id: usize,
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub behavior: Behavior,
    pub vulnerable: bool,
    #[serde(rename = "inPen")]
    pub in_pen: bool,
    #[serde(rename = "hasPass")]
    pub has_pass: bool,
    pub boosted: bool,
    #[serde(rename = "pendingRespawn")]
    pub pending_respawn: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct PoolView {
    #[serde(rename = "keysAvailable")]
    pub keys_available: usize,
    #[serde(rename = "permitsAvailable")]
    pub permits_available: usize,
    #[serde(rename = "boostsAvailable")]
    pub boosts_available: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub screen: Screen,
    pub running: bool,
    pub paused: bool,
    pub score: u32,
    pub lives: u32,
    pub board: Vec<String>,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    #[serde(rename = "powerPelletActive")]
    pub power_pellet_active: bool,
    #[serde(rename = "powerPelletElapsedMs")]
    pub power_pellet_elapsed_ms: u64,
    #[serde(rename = "ghostVulnerable")]
    pub ghost_vulnerable: bool,
    #[serde(rename = "vulnerableElapsedMs")]
    pub vulnerable_elapsed_ms: u64,
    #[serde(rename = "menuSelection")]
    pub menu_selection: usize,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pools: Option<PoolView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub score: u32,
}
