//! Reinforcement learning for the Snake game
//!
//! Provides:
//! - 11-feature observations
//! - RL environment interface over the game engine
//! - Experience replay buffer
//! - Swappable Q-function seam with a Burn MLP implementation
//! - DQN agent and episodic trainer
//! - Snapshot persistence

pub mod agent;
pub mod approximator;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod environment;
pub mod network;
pub mod observation;
pub mod persistence;
pub mod trainer;

pub use agent::DqnAgent;
pub use approximator::{ActionValues, QFunction};
pub use backend::{TrainingBackend, default_device};
pub use buffer::{ReplayBuffer, Transition};
pub use config::DqnConfig;
pub use environment::SnakeEnvironment;
pub use network::{BurnQFunction, QNetwork, QNetworkConfig};
pub use observation::{OBSERVATION_SIZE, Observation, create_observation};
pub use persistence::{ModelMetadata, ModelStore, SnapshotInfo};
pub use trainer::{EpisodeReport, StopSignal, Trainer, TrainingSummary};

/// Agent backed by the Burn Q-network
pub type BurnAgent<B> = DqnAgent<BurnQFunction<B>>;

/// Build a fresh Burn-backed agent from a DQN configuration
pub fn new_burn_agent<B: burn::tensor::backend::AutodiffBackend>(
    config: DqnConfig,
    device: &B::Device,
) -> BurnAgent<B> {
    let network_config = QNetworkConfig::new(config.hidden_layers.clone());
    let online = BurnQFunction::new(&network_config, config.learning_rate, device);
    let target = BurnQFunction::new(&network_config, config.learning_rate, device);
    DqnAgent::new(online, target, config)
}
