//! DQN algorithm hyperparameter configuration

use serde::{Deserialize, Serialize};

/// Configuration for the DQN agent and its training loop
///
/// # Example
///
/// ```rust
/// use snake_dqn::rl::DqnConfig;
///
/// let config = DqnConfig {
///     batch_size: 32,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    /// Learning rate for the Adam optimizer
    ///
    /// Default: 1e-3
    pub learning_rate: f64,

    /// Discount factor applied to the best next-state value
    ///
    /// Default: 0.9
    pub gamma: f32,

    /// Exploration rate of a fresh agent
    ///
    /// Default: 1.0
    pub epsilon_start: f64,

    /// Floor the exploration rate never decays below
    ///
    /// Default: 0.01
    pub epsilon_min: f64,

    /// Multiplicative decay applied once per episode
    ///
    /// Default: 0.995
    pub epsilon_decay: f64,

    /// Hidden layer widths of the Q-network
    ///
    /// Default: [128, 128]
    pub hidden_layers: Vec<usize>,

    /// Transitions per training step; also the replay warm-up threshold
    ///
    /// Default: 64
    pub batch_size: usize,

    /// Replay buffer capacity
    ///
    /// Default: 10000
    pub memory_size: usize,

    /// Training steps between hard target-network syncs
    ///
    /// Default: 100
    pub target_update_every: usize,

    /// Seed for exploration and replay sampling, random when unset
    pub seed: Option<u64>,
}

impl DqnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.learning_rate <= 0.0 {
            return Err(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }

        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(format!("gamma must be in [0, 1], got {}", self.gamma));
        }

        if !(0.0..=1.0).contains(&self.epsilon_start) {
            return Err(format!(
                "epsilon_start must be in [0, 1], got {}",
                self.epsilon_start
            ));
        }

        if !(0.0..=1.0).contains(&self.epsilon_min) {
            return Err(format!(
                "epsilon_min must be in [0, 1], got {}",
                self.epsilon_min
            ));
        }

        if self.epsilon_min > self.epsilon_start {
            return Err(format!(
                "epsilon_min ({}) cannot exceed epsilon_start ({})",
                self.epsilon_min, self.epsilon_start
            ));
        }

        if self.epsilon_decay <= 0.0 || self.epsilon_decay > 1.0 {
            return Err(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            ));
        }

        if self.hidden_layers.contains(&0) {
            return Err("hidden layer widths must be at least 1".to_string());
        }

        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }

        if self.target_update_every == 0 {
            return Err("target_update_every must be at least 1".to_string());
        }

        if self.batch_size > self.memory_size {
            return Err(format!(
                "batch_size ({}) cannot exceed memory_size ({})",
                self.batch_size, self.memory_size
            ));
        }

        Ok(())
    }
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            gamma: 0.9,
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            hidden_layers: vec![128, 128],
            batch_size: 64,
            memory_size: 10_000,
            target_update_every: 100,
            seed: None,
        }
    }
}
