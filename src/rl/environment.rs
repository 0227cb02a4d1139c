use super::observation::{Observation, create_observation};
use crate::error::InvalidStateError;
use crate::game::{Action, GameConfig, GameEngine, GameState};

/// Snake environment for reinforcement learning
///
/// Wraps the game engine and exposes the standard RL interface:
/// - 11-feature observations
/// - Discrete action space (Up, Down, Left, Right)
/// - `reset` / `step` returning (observation, reward, done)
pub struct SnakeEnvironment {
    engine: GameEngine,
}

impl SnakeEnvironment {
    /// Create a new Snake environment; call [`SnakeEnvironment::reset`] before stepping
    pub fn new(config: GameConfig) -> Self {
        Self {
            engine: GameEngine::new(config),
        }
    }

    /// Reset the environment and return the initial observation
    pub fn reset(&mut self) -> Observation {
        let (width, height) = self.grid_size();
        let state = self.engine.reset();
        create_observation(state, width, height)
    }

    /// Step the environment with a discrete action
    ///
    /// Returns: (observation, reward, done)
    pub fn step(&mut self, action: Action) -> Result<(Observation, f32, bool), InvalidStateError> {
        let result = self.engine.step(action)?;
        let observation = self.observation().ok_or(InvalidStateError::NotStarted)?;
        Ok((observation, result.reward, result.done))
    }

    /// Observation of the current state without stepping
    pub fn observation(&self) -> Option<Observation> {
        let (width, height) = self.grid_size();
        self.engine
            .state()
            .map(|state| create_observation(state, width, height))
    }

    /// Current game state, if a game has been started
    pub fn state(&self) -> Option<&GameState> {
        self.engine.state()
    }

    /// Score of the current (or just finished) game
    pub fn score(&self) -> u32 {
        self.engine.state().map_or(0, |s| s.score)
    }

    pub fn config(&self) -> &GameConfig {
        self.engine.config()
    }

    fn grid_size(&self) -> (usize, usize) {
        let config = self.engine.config();
        (config.grid_width, config.grid_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creation() {
        let env = SnakeEnvironment::new(GameConfig::default());
        assert!(env.state().is_none());
        assert!(env.observation().is_none());
        assert_eq!(env.score(), 0);
    }

    #[test]
    fn test_step_before_reset() {
        let mut env = SnakeEnvironment::new(GameConfig::small());
        assert_eq!(env.step(Action::Up), Err(InvalidStateError::NotStarted));
    }

    #[test]
    fn test_reset_returns_valid_observation() {
        let mut env = SnakeEnvironment::new(GameConfig::default());
        let obs = env.reset();

        assert_eq!(obs[0], 0.5);
        assert_eq!(obs[1], 0.5);
        // Moving right
        assert_eq!(&obs[7..], &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(env.observation(), Some(obs));
    }

    #[test]
    fn test_terminal_state_handling() {
        let mut env = SnakeEnvironment::new(GameConfig::new(5, 5).with_initial_length(3));
        env.reset();

        let mut done = false;
        for _ in 0..5 {
            let (_, reward, finished) = env.step(Action::Right).unwrap();
            if finished {
                assert_eq!(reward, -10.0);
                done = true;
                break;
            }
        }

        assert!(done);
        assert_eq!(env.step(Action::Right), Err(InvalidStateError::GameOver));
    }

    #[test]
    fn test_multiple_episodes() {
        let mut env = SnakeEnvironment::new(GameConfig::small().with_seed(4));
        for _ in 0..3 {
            env.reset();
            let mut steps = 0;
            loop {
                let (_, _, done) = env.step(Action::Up).unwrap();
                steps += 1;
                if done {
                    break;
                }
            }
            assert!(steps <= 10);
            assert!(env.state().unwrap().over);
        }
    }
}
