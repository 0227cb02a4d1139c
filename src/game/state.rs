use std::collections::VecDeque;

use super::action::Direction;

/// A position on the game grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Move position by delta
    pub fn moved_by(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Move position in a direction
    pub fn moved_in_direction(&self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.moved_by(dx, dy)
    }

    pub fn manhattan_distance(&self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// The snake body, ordered tail first with the head as the last segment
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    pub body: VecDeque<Position>,
}

impl Snake {
    /// Create a horizontal snake of `length` segments whose head is at `head`
    /// and whose tail extends to the left
    pub fn horizontal(head: Position, length: usize) -> Self {
        let length = length.max(1);
        let body = (0..length)
            .rev()
            .map(|i| head.moved_by(-(i as i32), 0))
            .collect();
        Self { body }
    }

    /// Build a snake from explicit segments, tail first
    pub fn from_segments(segments: impl IntoIterator<Item = Position>) -> Self {
        Self {
            body: segments.into_iter().collect(),
        }
    }

    /// Get the head position
    pub fn head(&self) -> Position {
        self.body.back().copied().unwrap_or(Position::new(0, 0))
    }

    /// Get the tail position (first segment)
    pub fn tail(&self) -> Position {
        self.body.front().copied().unwrap_or(Position::new(0, 0))
    }

    /// Check if any segment, head included, occupies `pos`
    pub fn contains(&self, pos: Position) -> bool {
        self.body.contains(&pos)
    }

    /// Check if position collides with snake body (excluding head)
    pub fn collides_with_body(&self, pos: Position) -> bool {
        let len = self.body.len();
        self.body.iter().take(len.saturating_sub(1)).any(|&p| p == pos)
    }

    /// Append a new head, dropping the tail unless the snake grows
    pub fn advance(&mut self, new_head: Position, grow: bool) {
        self.body.push_back(new_head);
        if !grow {
            self.body.pop_front();
        }
    }

    /// Get the length of the snake
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Check if the snake is empty (should never happen in practice)
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Type of collision that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionType {
    /// Snake hit a wall
    Wall,
    /// Snake hit itself
    SelfCollision,
}

/// Complete game state
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub snake: Snake,
    /// Direction applied on the last step
    pub direction: Direction,
    /// Direction that the next step will apply
    pub next_direction: Direction,
    pub food: Option<Position>,
    pub score: u32,
    pub steps: u32,
    pub running: bool,
    pub over: bool,
}

impl GameState {
    /// Create a new running game state
    pub fn new(snake: Snake, direction: Direction, food: Option<Position>) -> Self {
        Self {
            snake,
            direction,
            next_direction: direction,
            food,
            score: 0,
            steps: 0,
            running: true,
            over: false,
        }
    }

    /// Check if a position is occupied by the snake
    pub fn is_occupied_by_snake(&self, pos: Position) -> bool {
        self.snake.contains(pos)
    }
}

/// Check if a position is within a `width` x `height` grid
pub fn is_in_bounds(pos: Position, width: usize, height: usize) -> bool {
    pos.x >= 0 && pos.x < width as i32 && pos.y >= 0 && pos.y < height as i32
}
