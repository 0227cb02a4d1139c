//! Heuristic autopilot: head for the food without boxing the snake in
//!
//! Each step the autopilot ranks the moves that close the distance to the
//! food first, drops reversals and moves into a wall or the body, then keeps
//! only the moves after which the head can still reach the tail. Following
//! the tail is what keeps a snake alive, so a move that seals the head off
//! from it is taken only when nothing else is left.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::action::{Action, Direction};
use super::state::{GameState, Position, Snake, is_in_bounds};

/// Moves tried after the food-seeking ones, in action index order
const FALLBACK_ORDER: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

/// Tuning for the [`Autopilot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Reject moves that cut the head off from the tail
    pub tail_reachability: bool,
    /// Cells the flood fill may visit before giving up on a move
    pub max_flood_cells: usize,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            tail_reachability: true,
            max_flood_cells: 220,
        }
    }
}

/// Greedy food seeker with a tail-reachability check
#[derive(Debug, Clone, Default)]
pub struct Autopilot {
    config: AutopilotConfig,
}

impl Autopilot {
    pub fn new(config: AutopilotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    /// Pick the next action for a `width` x `height` board
    ///
    /// Keeps the current heading when there is no food or no safe move.
    pub fn next_action(&self, state: &GameState, width: usize, height: usize) -> Action {
        let heading = state.direction;
        let Some(food) = state.food else {
            return Action::from(heading);
        };
        let head = state.snake.head();

        let mut safe: Vec<Direction> = candidate_directions(head, food)
            .into_iter()
            .filter(|d| !heading.is_opposite(*d))
            .filter(|d| is_cell_safe(head.moved_in_direction(*d), &state.snake, width, height))
            .collect();

        if self.config.tail_reachability {
            let open: Vec<Direction> = safe
                .iter()
                .copied()
                .filter(|d| {
                    let new_head = head.moved_in_direction(*d);
                    let would_eat = new_head == food;
                    self.tail_reachable(new_head, &state.snake, would_eat, width, height)
                })
                .collect();
            if !open.is_empty() {
                safe = open;
            }
        }

        Action::from(safe.first().copied().unwrap_or(heading))
    }

    /// Whether the tail can be reached from `new_head` once the snake has
    /// moved there
    ///
    /// The tail cell counts as free unless the move eats, since the tail only
    /// stays put on a growing step. The search gives up after
    /// `max_flood_cells` cells and reports the tail as unreachable.
    pub fn tail_reachable(
        &self,
        new_head: Position,
        snake: &Snake,
        would_eat: bool,
        width: usize,
        height: usize,
    ) -> bool {
        let tail = snake.tail();
        if new_head == tail {
            return true;
        }

        let mut occupied: HashSet<Position> = snake.body.iter().copied().collect();
        occupied.insert(new_head);
        if !would_eat {
            occupied.remove(&tail);
        }

        let mut queue = VecDeque::from([new_head]);
        let mut seen = HashSet::from([new_head]);
        let mut explored = 0;

        while let Some(current) = queue.pop_front() {
            if explored >= self.config.max_flood_cells {
                break;
            }
            explored += 1;

            for direction in FALLBACK_ORDER {
                let next = current.moved_in_direction(direction);
                if next == tail {
                    return true;
                }
                if !is_in_bounds(next, width, height)
                    || occupied.contains(&next)
                    || !seen.insert(next)
                {
                    continue;
                }
                queue.push_back(next);
            }
        }

        false
    }
}

/// Moves along the food's axes first, then the rest in fixed order
fn candidate_directions(head: Position, food: Position) -> Vec<Direction> {
    let mut candidates = Vec::with_capacity(4);
    let dx = food.x - head.x;
    let dy = food.y - head.y;
    if dx != 0 {
        candidates.push(if dx > 0 { Direction::Right } else { Direction::Left });
    }
    if dy != 0 {
        candidates.push(if dy > 0 { Direction::Down } else { Direction::Up });
    }
    for direction in FALLBACK_ORDER {
        if !candidates.contains(&direction) {
            candidates.push(direction);
        }
    }
    candidates
}

/// In bounds and clear of every segment, tail included
fn is_cell_safe(pos: Position, snake: &Snake, width: usize, height: usize) -> bool {
    is_in_bounds(pos, width, height) && !snake.contains(pos)
}
