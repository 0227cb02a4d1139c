use super::{
    action::{Action, Direction},
    config::GameConfig,
    state::{CollisionType, GameState, Position, Snake, is_in_bounds},
};
use crate::error::InvalidStateError;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Total food placement draws before falling back to the grid centre
const FOOD_PLACEMENT_ATTEMPTS: usize = 200;

/// Draws restricted to the central food region
const FOOD_REGION_ATTEMPTS: usize = 100;

/// Information about a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    /// Whether the snake ate food this step
    pub ate_food: bool,
    /// Type of collision if one occurred
    pub collision_type: Option<CollisionType>,
}

/// Result of a game step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Reward for this step (for RL training)
    pub reward: f32,
    /// Whether the game has ended
    pub done: bool,
    /// Additional information about the step
    pub info: StepInfo,
}

/// The game engine that handles all game logic
pub struct GameEngine {
    config: GameConfig,
    rng: StdRng,
    state: Option<GameState>,
}

impl GameEngine {
    /// Create a new game engine with the given configuration
    ///
    /// No game exists until [`GameEngine::reset`] is called.
    pub fn new(config: GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            state: None,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current game, if one has been started
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Reset the game to initial state
    pub fn reset(&mut self) -> &GameState {
        let center_x = (self.config.grid_width / 2) as i32;
        let center_y = (self.config.grid_height / 2) as i32;

        let snake = Snake::horizontal(
            Position::new(center_x, center_y),
            self.config.initial_snake_length,
        );
        let food = place_food(&mut self.rng, &self.config, &snake);

        self.state.insert(GameState::new(snake, Direction::Right, Some(food)))
    }

    /// Execute one step of the game
    pub fn step(&mut self, action: Action) -> Result<StepResult, InvalidStateError> {
        let Self { config, rng, state } = self;
        let state = state.as_mut().ok_or(InvalidStateError::NotStarted)?;
        if state.over {
            return Err(InvalidStateError::GameOver);
        }

        // Update direction based on action (prevent 180° turns)
        let candidate = action.direction();
        if !state.direction.is_opposite(candidate) {
            state.next_direction = candidate;
        }
        state.direction = state.next_direction;

        let prev_head = state.snake.head();
        let prev_food = state.food;
        let new_head = prev_head.moved_in_direction(state.direction);
        let ate_food = state.food == Some(new_head);

        state.snake.advance(new_head, ate_food);
        state.steps += 1;

        let mut reward = if ate_food {
            state.score += 1;
            state.food = Some(place_food(rng, config, &state.snake));
            config.food_reward
        } else {
            config.survival_reward
        };

        // Distance shaping only applies while the same food stays on the board
        if let Some(food) = prev_food.filter(|_| !ate_food) {
            let before = prev_head.manhattan_distance(food);
            let after = new_head.manhattan_distance(food);
            if after < before {
                reward += config.approach_reward;
            } else if after > before {
                reward -= config.approach_reward;
            }
        }

        if let Some(collision_type) = check_collision(config, &state.snake) {
            state.over = true;
            state.running = false;

            return Ok(StepResult {
                reward: config.death_penalty,
                done: true,
                info: StepInfo {
                    ate_food,
                    collision_type: Some(collision_type),
                },
            });
        }

        Ok(StepResult {
            reward,
            done: false,
            info: StepInfo {
                ate_food,
                collision_type: None,
            },
        })
    }
}

/// Check if the snake's head has left the grid or run into its own body
fn check_collision(config: &GameConfig, snake: &Snake) -> Option<CollisionType> {
    let head = snake.head();

    if !is_in_bounds(head, config.grid_width, config.grid_height) {
        return Some(CollisionType::Wall);
    }

    if snake.collides_with_body(head) {
        return Some(CollisionType::SelfCollision);
    }

    None
}

/// Pick a food cell that is not on the snake
///
/// The first draws are biased towards the central food region, later ones
/// cover the whole grid. When every draw lands on the snake the grid centre
/// is used.
fn place_food(rng: &mut StdRng, config: &GameConfig, snake: &Snake) -> Position {
    let cols = config.grid_width as i32;
    let rows = config.grid_height as i32;
    let (x_min, x_max, y_min, y_max) = config
        .food_region
        .cell_bounds(config.grid_width, config.grid_height);

    for attempt in 0..FOOD_PLACEMENT_ATTEMPTS {
        let (x, y) = if attempt < FOOD_REGION_ATTEMPTS {
            let x = if x_max > x_min {
                rng.gen_range(x_min..x_max)
            } else {
                rng.gen_range(0..cols)
            };
            let y = if y_max > y_min {
                rng.gen_range(y_min..y_max)
            } else {
                rng.gen_range(0..rows)
            };
            (x, y)
        } else {
            (rng.gen_range(0..cols), rng.gen_range(0..rows))
        };

        let pos = Position::new(x, y);
        if !snake.contains(pos) {
            return pos;
        }
    }

    Position::new(cols / 2, rows / 2)
}
