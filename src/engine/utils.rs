use crate::types::{Direction, Vec2};

pub(crate) fn manhattan(a: Vec2, b: Vec2) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

pub(crate) fn euclidean(a: Vec2, b: Vec2) -> f32 {
    let dx = (a.x - b.x) as f32;
    let dy = (a.y - b.y) as f32;
    (dx * dx + dy * dy).sqrt()
}

pub(crate) fn offset(pos: Vec2, dir: Direction) -> Vec2 {
    offset_by(pos, dir, 1)
}

pub(crate) fn offset_by(pos: Vec2, dir: Direction, cells: i32) -> Vec2 {
    match dir {
        Direction::Up => Vec2::new(pos.x, pos.y - cells),
        Direction::Down => Vec2::new(pos.x, pos.y + cells),
        Direction::Left => Vec2::new(pos.x - cells, pos.y),
        Direction::Right => Vec2::new(pos.x + cells, pos.y),
        Direction::None => pos,
    }
}
