use crate::error::ValidationError;
use crate::game::{Direction, GameState, Position, is_in_bounds};

/// Number of features in an observation
pub const OBSERVATION_SIZE: usize = 11;

/// Fixed-width feature vector fed to the Q-function
pub type Observation = [f32; OBSERVATION_SIZE];

/// Create an 11-feature observation from game state
///
/// Layout:
/// - 0, 1: head position normalised by grid width and height
/// - 2, 3: food offset from the head, normalised (0.0 when there is no food)
/// - 4: danger straight ahead
/// - 5: danger one turn clockwise
/// - 6: danger one turn counter-clockwise
/// - 7..=10: one-hot current direction (up, down, left, right)
///
/// Danger means the neighbouring cell is outside the grid or on any current
/// snake segment, the head included.
pub fn create_observation(state: &GameState, width: usize, height: usize) -> Observation {
    let w = width as f32;
    let h = height as f32;
    let head = state.snake.head();
    let direction = state.direction;

    let (food_dx, food_dy) = match state.food {
        Some(food) => ((food.x - head.x) as f32 / w, (food.y - head.y) as f32 / h),
        None => (0.0, 0.0),
    };

    let danger = |dir: Direction| -> f32 {
        let next = head.moved_in_direction(dir);
        if is_dangerous(state, next, width, height) {
            1.0
        } else {
            0.0
        }
    };

    let one_hot = |dir: Direction| -> f32 { if direction == dir { 1.0 } else { 0.0 } };

    [
        head.x as f32 / w,
        head.y as f32 / h,
        food_dx,
        food_dy,
        danger(direction),
        danger(direction.clockwise()),
        danger(direction.counter_clockwise()),
        one_hot(Direction::Up),
        one_hot(Direction::Down),
        one_hot(Direction::Left),
        one_hot(Direction::Right),
    ]
}

fn is_dangerous(state: &GameState, pos: Position, width: usize, height: usize) -> bool {
    !is_in_bounds(pos, width, height) || state.snake.contains(pos)
}

/// Validate an externally supplied feature slice
pub fn observation_from_slice(values: &[f32]) -> Result<Observation, ValidationError> {
    let observation: Observation = values.try_into().map_err(|_| ValidationError::ObservationWidth {
        expected: OBSERVATION_SIZE,
        actual: values.len(),
    })?;

    if let Some(index) = observation.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite { index });
    }

    Ok(observation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Action, GameConfig, GameEngine, Snake};

    fn state_with(snake: Snake, direction: Direction, food: Option<Position>) -> GameState {
        GameState::new(snake, direction, food)
    }

    #[test]
    fn test_observation_layout() {
        let state = state_with(
            Snake::horizontal(Position::new(5, 5), 3),
            Direction::Right,
            Some(Position::new(7, 2)),
        );

        let obs = create_observation(&state, 10, 20);

        assert_eq!(obs.len(), OBSERVATION_SIZE);
        assert_eq!(obs[0], 0.5);
        assert_eq!(obs[1], 0.25);
        assert_eq!(obs[2], 0.2);
        assert_eq!(obs[3], -3.0 / 20.0);
        assert_eq!(&obs[4..7], &[0.0, 0.0, 0.0]);
        assert_eq!(&obs[7..], &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_no_food_gives_zero_offset() {
        let state = state_with(
            Snake::horizontal(Position::new(5, 5), 3),
            Direction::Right,
            None,
        );
        let obs = create_observation(&state, 10, 10);
        assert_eq!(obs[2], 0.0);
        assert_eq!(obs[3], 0.0);
    }

    #[test]
    fn test_wall_danger() {
        // Heading right against the right wall, top wall counter-clockwise
        let state = state_with(
            Snake::horizontal(Position::new(9, 0), 3),
            Direction::Right,
            None,
        );
        let obs = create_observation(&state, 10, 10);
        assert_eq!(obs[4], 1.0); // straight: (10, 0)
        assert_eq!(obs[5], 0.0); // clockwise (down): (9, 1)
        assert_eq!(obs[6], 1.0); // counter-clockwise (up): (9, -1)
    }

    #[test]
    fn test_body_danger() {
        // Head at (5,5) heading down with the body curling around to its right
        let snake = Snake::from_segments([
            Position::new(6, 6),
            Position::new(6, 5),
            Position::new(6, 4),
            Position::new(5, 4),
            Position::new(5, 5),
        ]);
        let state = state_with(snake, Direction::Down, None);

        let obs = create_observation(&state, 10, 10);
        assert_eq!(obs[4], 0.0); // straight (down): (5, 6)
        assert_eq!(obs[5], 0.0); // clockwise (left): (4, 5)
        assert_eq!(obs[6], 1.0); // counter-clockwise (right): (6, 5)
        assert_eq!(&obs[7..], &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_invariants_over_random_play() {
        let mut engine = GameEngine::new(GameConfig::small().with_seed(5));
        let mut step = 0usize;
        for _ in 0..20 {
            engine.reset();
            loop {
                let state = engine.state().unwrap();
                let obs = create_observation(state, 10, 10);

                assert_eq!(obs.len(), 11);
                for &flag in &obs[4..7] {
                    assert!(flag == 0.0 || flag == 1.0);
                }
                let one_hot_sum: f32 = obs[7..].iter().sum();
                assert_eq!(one_hot_sum, 1.0);
                assert!(obs.iter().all(|v| v.abs() <= 1.0));

                let action = Action::ALL[step % 3];
                step += 1;
                if engine.step(action).unwrap().done {
                    break;
                }
            }
        }
    }

    #[test]
    fn test_observation_from_slice() {
        let values = [0.5f32; 11];
        assert_eq!(observation_from_slice(&values).unwrap(), values);

        assert_eq!(
            observation_from_slice(&[0.0; 10]),
            Err(ValidationError::ObservationWidth {
                expected: 11,
                actual: 10
            })
        );

        let mut bad = [0.0f32; 11];
        bad[3] = f32::NAN;
        assert_eq!(
            observation_from_slice(&bad),
            Err(ValidationError::NonFinite { index: 3 })
        );
    }
}
