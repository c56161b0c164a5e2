use std::fs;
use std::path::Path;

use crate::error::{Result, SimError};
use crate::types::{Cell, Vec2};

pub const CLASSIC_ROWS: [&str; 20] = [
    "====================",
    "=0...............0.=",
    "=.====.======.====.=",
    "=.=............=.=.=",
    "=.=.==..####...=...=",
    "=...==.=======.==..=",
    "====== =     =.=====",
    "=..... =     =.....=",
    "=.==== === ===.=====",
    "=......=.....=.....=",
    "=.==== ==....====. =",
    "=.==== ==..... === =",
    "=..... ==.===. ....=",
    "=.==== ==.===. =====",
    "=.==== ....... =====",
    "=......======......=",
    "=.====.======.====.=",
    "=0.==............0.=",
    "=...........@......=",
    "====================",
];

const CLASSIC_HOMES: [Vec2; 4] = [Vec2::at(6, 8), Vec2::at(6, 9), Vec2::at(7, 11), Vec2::at(7, 12)];
const CLASSIC_RESPAWNS: [Vec2; 4] = [
    Vec2::at(7, 8),
    Vec2::at(7, 9),
    Vec2::at(7, 10),
    Vec2::at(7, 11),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid<T> {
    pub width: i32,
    pub height: i32,
    cells: Vec<T>,
}

impl<T: Copy> Grid<T> {
    pub fn new(width: i32, height: i32, fill: T) -> Self {
        let len = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            cells: vec![fill; len],
        }
    }

    pub fn in_bounds(&self, pos: Vec2) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn get(&self, pos: Vec2) -> Option<T> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells.get(self.index(pos)).copied()
    }

    pub fn set(&mut self, pos: Vec2, value: T) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        let idx = self.index(pos);
        self.cells[idx] = value;
        true
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Vec2::new(x, y)))
    }

    pub fn count(&self, mut predicate: impl FnMut(T) -> bool) -> usize {
        self.cells.iter().filter(|cell| predicate(**cell)).count()
    }

    fn index(&self, pos: Vec2) -> usize {
        (pos.y * self.width + pos.x) as usize
    }
}

impl Grid<Cell> {
    pub fn rows(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| self.get(Vec2::new(x, y)).map_or(' ', Cell::symbol))
                    .collect()
            })
            .collect()
    }
}

/// Rectangular holding area, inclusive bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PenArea {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

impl PenArea {
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.y >= self.top && pos.y <= self.bottom && pos.x >= self.left && pos.x <= self.right
    }

    pub fn cells(&self) -> impl Iterator<Item = Vec2> + '_ {
        (self.top..=self.bottom)
            .flat_map(move |y| (self.left..=self.right).map(move |x| Vec2::new(x, y)))
    }
}

#[derive(Clone, Debug)]
pub struct Layout {
    pub rows: Vec<String>,
    pub pen: PenArea,
    pub homes: Vec<Vec2>,
    pub respawns: Vec<Vec2>,
}

impl Layout {
    pub fn classic() -> Self {
        Self::with_rows(CLASSIC_ROWS.iter().map(|row| row.to_string()).collect())
    }

    /// Custom maze rows with the classic pen and agent placement.
    pub fn with_rows(rows: Vec<String>) -> Self {
        Self {
            rows,
            pen: PenArea {
                top: 6,
                left: 7,
                bottom: 8,
                right: 12,
            },
            homes: CLASSIC_HOMES.to_vec(),
            respawns: CLASSIC_RESPAWNS.to_vec(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let rows = text
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Ok(Self::with_rows(rows))
    }

    pub fn agent_count(&self) -> usize {
        self.homes.len().min(self.respawns.len())
    }
}

/// Terrain derived from a layout once per level load.
#[derive(Clone, Debug)]
pub struct ParsedLevel {
    pub board: Grid<Cell>,
    pub original: Grid<Cell>,
    pub power_pellets: Grid<bool>,
    pub player_start: Vec2,
}

pub fn parse_layout(layout: &Layout) -> Result<ParsedLevel> {
    let height = layout.rows.len();
    if height == 0 {
        return Err(SimError::EmptyLayout);
    }
    let width = layout.rows[0].chars().count();
    if width == 0 {
        return Err(SimError::EmptyLayout);
    }

    let mut board = Grid::new(width as i32, height as i32, Cell::Empty);
    let mut power_pellets = Grid::new(width as i32, height as i32, false);
    let mut player_start = None;

    for (row, line) in layout.rows.iter().enumerate() {
        let row_width = line.chars().count();
        if row_width != width {
            return Err(SimError::RaggedLayout {
                row,
                width: row_width,
                expected: width,
            });
        }
        for (col, symbol) in line.chars().enumerate() {
            let pos = Vec2::at(row as i32, col as i32);
            let cell = match symbol {
                '=' => Cell::Wall,
                '.' => Cell::Dot,
                '0' => Cell::PowerPellet,
                ' ' | '#' => Cell::Empty,
                '@' => {
                    if player_start.is_some() {
                        return Err(SimError::DuplicatePlayerStart { row, col });
                    }
                    player_start = Some(pos);
                    Cell::Player
                }
                _ => return Err(SimError::UnknownSymbol { symbol, row, col }),
            };
            if cell == Cell::PowerPellet {
                power_pellets.set(pos, true);
            }
            board.set(pos, cell);
        }
    }

    let player_start = player_start.ok_or(SimError::MissingPlayerStart)?;
    for pos in layout.homes.iter().chain(layout.respawns.iter()) {
        let open = matches!(board.get(*pos), Some(Cell::Empty | Cell::Dot | Cell::PowerPellet));
        if !open || !layout.pen.contains(*pos) {
            return Err(SimError::BadAgentCell {
                row: pos.y,
                col: pos.x,
            });
        }
    }

    let mut original = board.clone();
    original.set(player_start, Cell::Empty);

    Ok(ParsedLevel {
        board,
        original,
        power_pellets,
        player_start,
    })
}

pub fn is_walkable(board: &Grid<Cell>, pos: Vec2) -> bool {
    matches!(board.get(pos), Some(cell) if cell != Cell::Wall)
}
