//! Headless training mode
//!
//! Builds a [`TrainingService`] around a fresh (or resumed) agent, optionally
//! preloads the replay buffer with recorded human play, runs training on a
//! background worker and saves snapshots into a [`ModelStore`]. Ctrl+C asks
//! the worker to stop after the episode in flight; the final snapshot is still
//! written.
//!
//! # Example
//!
//! ```rust,ignore
//! use snake_dqn::modes::{TrainConfig, TrainMode};
//! use snake_dqn::rl::{TrainingBackend, default_device};
//!
//! let config = TrainConfig::new(500, "models".into());
//! let mut mode = TrainMode::<TrainingBackend>::new(config, default_device())?;
//! let outcome = mode.run().await?;
//! println!("saved {}", outcome.snapshot_id);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ValidationError;
use crate::game::GameConfig;
use crate::rl::{
    BurnAgent, BurnQFunction, DqnConfig, EpisodeReport, ModelMetadata, ModelStore, ReplayBuffer,
    TrainingSummary, new_burn_agent,
};
use crate::service::{ExperienceBatch, TrainingService};

/// Configuration for training mode
///
/// Loadable from JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of episodes to train
    pub num_episodes: usize,

    /// Directory snapshots are saved to (and resumed from)
    pub model_dir: PathBuf,

    /// Save a checkpoint every N episodes, 0 to only save at the end
    pub checkpoint_frequency: usize,

    /// Print training progress every N episodes
    pub log_frequency: usize,

    /// Continue from the newest snapshot in `model_dir` when one exists
    pub resume: bool,

    /// Recorded experiences (an experience batch JSON) to seed the buffer with
    pub experiences: Option<PathBuf>,

    pub game_config: GameConfig,

    pub dqn_config: DqnConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_episodes: 1000,
            model_dir: PathBuf::from("models"),
            checkpoint_frequency: 100,
            log_frequency: 10,
            resume: false,
            experiences: None,
            game_config: GameConfig::default(),
            dqn_config: DqnConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn new(num_episodes: usize, model_dir: PathBuf) -> Self {
        Self {
            num_episodes,
            model_dir,
            ..Default::default()
        }
    }

    /// Read a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read training config {:?}", path))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse training config {:?}", path))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.num_episodes == 0 {
            return Err(ValidationError::Config(
                "num_episodes must be positive".to_string(),
            ));
        }
        if self.log_frequency == 0 {
            return Err(ValidationError::Config(
                "log_frequency must be positive".to_string(),
            ));
        }
        self.game_config.validate().map_err(ValidationError::Config)?;
        self.dqn_config.validate().map_err(ValidationError::Config)?;
        Ok(())
    }
}

/// Result of a finished training session
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub summary: TrainingSummary,
    /// Id of the final snapshot
    pub snapshot_id: String,
}

pub struct TrainMode<B: AutodiffBackend> {
    service: TrainingService<BurnQFunction<B>>,
    store: ModelStore,
    config: TrainConfig,
    resumed_from: Option<String>,
}

impl<B: AutodiffBackend> TrainMode<B> {
    /// Prepare the agent, buffer and model store
    pub fn new(config: TrainConfig, device: B::Device) -> Result<Self> {
        config.validate().context("Invalid training configuration")?;
        let store = ModelStore::open(&config.model_dir)?;

        let (agent, resumed_from) = Self::initial_agent(&config, &store, &device)?;
        let memory_size = agent.config().memory_size;
        let buffer = match agent.config().seed {
            Some(seed) => ReplayBuffer::with_seed(memory_size, seed),
            None => ReplayBuffer::new(memory_size),
        };

        let service = TrainingService::new(agent, buffer, config.game_config.clone())
            .context("Invalid agent configuration")?;

        if let Some(path) = &config.experiences {
            let batch = load_experiences(path)?;
            let stored = service
                .submit_experiences(&batch)
                .with_context(|| format!("Rejected experiences from {:?}", path))?;
            println!("Preloaded {} recorded transitions from {:?}", stored, path);
        }

        Ok(Self {
            service,
            store,
            config,
            resumed_from,
        })
    }

    fn initial_agent(
        config: &TrainConfig,
        store: &ModelStore,
        device: &B::Device,
    ) -> Result<(BurnAgent<B>, Option<String>)> {
        if config.resume {
            if let Some((id, agent, metadata)) = store.load_latest::<B>(device)? {
                let game = &config.game_config;
                if (metadata.grid_width, metadata.grid_height) != (game.grid_width, game.grid_height)
                {
                    warn!(
                        id = %id,
                        trained = %format!("{}x{}", metadata.grid_width, metadata.grid_height),
                        current = %format!("{}x{}", game.grid_width, game.grid_height),
                        "resuming on a different grid size"
                    );
                }
                return Ok((agent, Some(id)));
            }
            info!(dir = ?store.dir(), "no snapshot to resume from, starting fresh");
        }
        Ok((new_burn_agent::<B>(config.dqn_config.clone(), device), None))
    }

    /// Train for the configured number of episodes and save the result
    pub async fn run(&mut self) -> Result<TrainOutcome> {
        self.print_header();

        let on_episode = episode_observer(
            self.service.agent(),
            self.store.clone(),
            self.config.game_config.clone(),
            self.config.checkpoint_frequency,
            self.config.log_frequency,
        );
        let handle = self
            .service
            .start_training(self.config.num_episodes, on_episode)?;

        let stop = handle.stop_signal();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current episode");
                stop.stop();
            }
        });

        let summary = handle.join().await;
        ctrl_c.abort();
        let summary = summary.context("Training run failed")?;

        let snapshot_id = save_snapshot(
            &self.service.agent(),
            &self.store,
            &self.config.game_config,
            summary.rolling_average_score,
            summary.rolling_max_score,
        )?;

        if summary.stopped {
            println!(
                "\nTraining stopped after {} of {} episodes",
                summary.episodes_completed, self.config.num_episodes
            );
        } else {
            println!("\nTraining complete!");
        }
        println!("Final model saved as {} in {:?}", snapshot_id, self.store.dir());
        println!(
            "Avg score (last 100): {:.2} | Max score: {} | Steps: {}",
            summary.rolling_average_score, summary.rolling_max_score, summary.total_steps
        );

        Ok(TrainOutcome {
            summary,
            snapshot_id,
        })
    }

    pub fn service(&self) -> &TrainingService<BurnQFunction<B>> {
        &self.service
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    fn print_header(&self) {
        let dqn = &self.config.dqn_config;
        let game = &self.config.game_config;

        println!("{}", "=".repeat(70));
        println!("DQN Training - Snake");
        println!("{}", "=".repeat(70));
        println!("Episodes: {}", self.config.num_episodes);
        println!("Grid: {}x{}", game.grid_width, game.grid_height);
        if let Some(id) = &self.resumed_from {
            println!("Resuming from: {}", id);
        }
        println!("DQN Config:");
        println!("  Learning rate: {}", dqn.learning_rate);
        println!("  Gamma: {}", dqn.gamma);
        println!(
            "  Epsilon: {} -> {} (x{} per episode)",
            dqn.epsilon_start, dqn.epsilon_min, dqn.epsilon_decay
        );
        println!("  Hidden layers: {:?}", dqn.hidden_layers);
        println!("  Batch size: {}", dqn.batch_size);
        println!("  Replay memory: {}", dqn.memory_size);
        println!("  Target sync: every {} training steps", dqn.target_update_every);
        if self.config.checkpoint_frequency > 0 {
            println!(
                "Checkpoints: Every {} episodes",
                self.config.checkpoint_frequency
            );
        }
        println!("Model dir: {:?}", self.config.model_dir);
        println!("{}", "=".repeat(70));
        println!();
    }
}

/// Progress printing and periodic checkpoints, run on the worker thread
fn episode_observer<B: AutodiffBackend>(
    agent: Arc<Mutex<BurnAgent<B>>>,
    store: ModelStore,
    game_config: GameConfig,
    checkpoint_frequency: usize,
    log_frequency: usize,
) -> impl FnMut(&EpisodeReport) + Send + 'static {
    move |report: &EpisodeReport| {
        if report.episode % log_frequency == 0 {
            print_progress(report);
        }

        // The final snapshot is written once the run has joined
        let is_last = report.episode == report.total_episodes;
        if checkpoint_frequency > 0 && report.episode % checkpoint_frequency == 0 && !is_last {
            match save_snapshot(
                &agent,
                &store,
                &game_config,
                report.rolling_average_score,
                report.rolling_max_score,
            ) {
                Ok(id) => println!("  Checkpoint saved: {}", id),
                Err(e) => warn!(error = %e, episode = report.episode, "checkpoint failed"),
            }
        }
    }
}

fn print_progress(report: &EpisodeReport) {
    let loss = report
        .loss
        .map_or_else(|| "-".to_string(), |l| format!("{:.4}", l));
    println!(
        "[Episode {}/{}] Score: {} | Avg: {:.2} | Max: {} | Epsilon: {:.3} | Loss: {}",
        report.episode,
        report.total_episodes,
        report.score,
        report.rolling_average_score,
        report.rolling_max_score,
        report.epsilon,
        loss
    );
}

fn save_snapshot<B: AutodiffBackend>(
    agent: &Arc<Mutex<BurnAgent<B>>>,
    store: &ModelStore,
    game_config: &GameConfig,
    rolling_average_score: f32,
    rolling_max_score: u32,
) -> Result<String> {
    let agent = agent
        .lock()
        .map_err(|_| anyhow!("agent lock poisoned, cannot save snapshot"))?;
    let metadata =
        ModelMetadata::from_agent(&agent, game_config.grid_width, game_config.grid_height)
            .with_scores(rolling_average_score, rolling_max_score);
    store.save(&agent, &metadata)
}

/// Read a recorded experience batch
pub fn load_experiences(path: &Path) -> Result<ExperienceBatch> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read experiences from {:?}", path))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse experiences from {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::{Transition, TrainingBackend, default_device};
    use crate::game::Action;
    use tempfile::TempDir;

    fn test_config(dir: &Path, episodes: usize) -> TrainConfig {
        let mut config = TrainConfig::new(episodes, dir.to_path_buf());
        config.game_config = GameConfig::small().with_seed(4);
        config.dqn_config = DqnConfig {
            hidden_layers: vec![16],
            batch_size: 8,
            memory_size: 200,
            seed: Some(2),
            ..Default::default()
        };
        config.checkpoint_frequency = 2;
        config.log_frequency = 100;
        config
    }

    #[test]
    fn test_train_config_creation() {
        let config = TrainConfig::new(1000, PathBuf::from("test_models"));
        assert_eq!(config.num_episodes, 1000);
        assert_eq!(config.model_dir, PathBuf::from("test_models"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TrainConfig::default();
        config.num_episodes = 0;
        assert!(matches!(config.validate(), Err(ValidationError::Config(_))));

        let mut config = TrainConfig::default();
        config.dqn_config.gamma = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("train.json");
        fs::write(
            &path,
            r#"{"num_episodes": 42, "dqn_config": {"batch_size": 16}, "game_config": {"grid_width": 12}}"#,
        )
        .unwrap();

        let config = TrainConfig::from_file(&path).unwrap();
        assert_eq!(config.num_episodes, 42);
        assert_eq!(config.dqn_config.batch_size, 16);
        assert_eq!(config.dqn_config.memory_size, 10000);
        assert_eq!(config.game_config.grid_width, 12);
        assert_eq!(config.checkpoint_frequency, 100);
    }

    #[tokio::test]
    async fn test_run_saves_checkpoints_and_final_model() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), 5);

        let mut mode = TrainMode::<TrainingBackend>::new(config, default_device()).unwrap();
        let outcome = mode.run().await.unwrap();

        assert_eq!(outcome.summary.episodes_completed, 5);
        assert!(!outcome.summary.stopped);
        assert!(!mode.service().is_training());

        // Checkpoints after episodes 2 and 4, then the final snapshot
        let snapshots = mode.store().list().unwrap();
        assert_eq!(snapshots.len(), 3);
        let latest = mode.store().latest().unwrap().unwrap();
        assert_eq!(latest.id, outcome.snapshot_id);
        assert_eq!(latest.metadata.episodes_trained, 5);
        assert_eq!(latest.metadata.grid_width, 10);
    }

    #[tokio::test]
    async fn test_resume_continues_progress() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path(), 3);
        config.checkpoint_frequency = 0;

        let mut first = TrainMode::<TrainingBackend>::new(config.clone(), default_device()).unwrap();
        first.run().await.unwrap();

        config.resume = true;
        config.num_episodes = 2;
        let mut second = TrainMode::<TrainingBackend>::new(config, default_device()).unwrap();
        assert!(second.resumed_from.is_some());
        let outcome = second.run().await.unwrap();

        let latest = second.store().latest().unwrap().unwrap();
        assert_eq!(latest.id, outcome.snapshot_id);
        assert_eq!(latest.metadata.episodes_trained, 5);
        assert_eq!(second.store().list().unwrap().len(), 2);
    }

    #[test]
    fn test_preloads_recorded_experiences() {
        let temp_dir = TempDir::new().unwrap();
        let transitions: Vec<Transition> = (0..3)
            .map(|i| Transition {
                observation: [0.0; 11],
                action: Action::ALL[i],
                reward: 0.1,
                next_observation: [1.0; 11],
                done: i == 2,
            })
            .collect();
        let path = temp_dir.path().join("recorded.json");
        fs::write(
            &path,
            serde_json::to_string(&ExperienceBatch::from_transitions(&transitions)).unwrap(),
        )
        .unwrap();

        let mut config = test_config(&temp_dir.path().join("models"), 1);
        config.experiences = Some(path);
        let mode = TrainMode::<TrainingBackend>::new(config, default_device()).unwrap();

        let status = mode.service().buffer_status().unwrap();
        assert_eq!(status.count, 3);
        assert!(!status.is_ready);
    }

    #[test]
    fn test_rejects_invalid_experience_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"experiences":[{"state":[0,0],"action":0,"reward":0,"nextState":[0,0],"done":false}]}"#,
        )
        .unwrap();

        let mut config = test_config(&temp_dir.path().join("models"), 1);
        config.experiences = Some(path);
        assert!(TrainMode::<TrainingBackend>::new(config, default_device()).is_err());
    }
}
