//! Episodic DQN training loop
//!
//! The trainer interleaves simulation and learning on a single thread. The
//! agent and the replay buffer are shared behind mutexes so that other
//! parties (status queries, inference, experience submission) can reach them,
//! but the trainer keeps both locked for a whole episode. Everything else,
//! including the stop signal, is observed only between episodes.

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info};

use super::agent::DqnAgent;
use super::approximator::QFunction;
use super::buffer::{ReplayBuffer, Transition};
use super::environment::SnakeEnvironment;
use crate::error::TrainingError;
use crate::metrics::TrainingStats;

/// Episodes between progress log lines
const LOG_EVERY: usize = 10;

/// Cooperative cancellation flag, checked at episode boundaries
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to finish after the in-flight episode
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Status emitted after every finished episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    /// 1-based index of the episode within this run
    pub episode: usize,
    /// Episodes requested for this run
    pub total_episodes: usize,
    pub score: u32,
    pub reward: f32,
    pub steps: usize,
    pub rolling_average_score: f32,
    pub rolling_max_score: u32,
    /// Exploration rate after this episode's decay
    pub epsilon: f64,
    /// Most recent training loss, absent while the buffer is warming up
    pub loss: Option<f32>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub episodes_completed: usize,
    /// Whether the run ended early because of a stop request
    pub stopped: bool,
    pub total_steps: usize,
    pub rolling_average_score: f32,
    pub rolling_max_score: u32,
    pub last_loss: Option<f32>,
}

struct EpisodeOutcome {
    score: u32,
    reward: f32,
    steps: usize,
    epsilon: f64,
}

pub struct Trainer<Q: QFunction> {
    env: SnakeEnvironment,
    agent: Arc<Mutex<DqnAgent<Q>>>,
    buffer: Arc<Mutex<ReplayBuffer>>,
    stats: TrainingStats,
}

impl<Q: QFunction> Trainer<Q> {
    pub fn new(
        env: SnakeEnvironment,
        agent: Arc<Mutex<DqnAgent<Q>>>,
        buffer: Arc<Mutex<ReplayBuffer>>,
    ) -> Self {
        Self {
            env,
            agent,
            buffer,
            stats: TrainingStats::default(),
        }
    }

    /// Run up to `episodes` episodes, reporting each one to `on_episode`
    ///
    /// The stop signal is honoured before starting an episode, never in the
    /// middle of one. Locks are released before `on_episode` is called.
    pub fn run<F>(
        &mut self,
        episodes: usize,
        stop: &StopSignal,
        mut on_episode: F,
    ) -> Result<TrainingSummary, TrainingError>
    where
        F: FnMut(&EpisodeReport),
    {
        info!(episodes, "training started");
        let mut completed = 0;

        for episode in 1..=episodes {
            if stop.is_stopped() {
                info!(completed, "stop requested, ending training");
                break;
            }

            let outcome = self.run_episode()?;
            completed = episode;

            let report = EpisodeReport {
                episode,
                total_episodes: episodes,
                score: outcome.score,
                reward: outcome.reward,
                steps: outcome.steps,
                rolling_average_score: self.stats.rolling_average_score(),
                rolling_max_score: self.stats.rolling_max_score(),
                epsilon: outcome.epsilon,
                loss: self.stats.last_loss(),
            };

            if episode % LOG_EVERY == 0 {
                info!(
                    episode,
                    total = episodes,
                    score = outcome.score,
                    epsilon = outcome.epsilon,
                    "{}",
                    self.stats.format_summary()
                );
            }

            on_episode(&report);
        }

        let summary = TrainingSummary {
            episodes_completed: completed,
            stopped: completed < episodes,
            total_steps: self.stats.total_steps(),
            rolling_average_score: self.stats.rolling_average_score(),
            rolling_max_score: self.stats.rolling_max_score(),
            last_loss: self.stats.last_loss(),
        };
        info!(
            episodes = summary.episodes_completed,
            stopped = summary.stopped,
            avg_score = summary.rolling_average_score,
            max_score = summary.rolling_max_score,
            "training finished"
        );
        Ok(summary)
    }

    /// Play one episode to termination, learning after every step
    fn run_episode(&mut self) -> Result<EpisodeOutcome, TrainingError> {
        let mut agent = lock(&self.agent, "agent")?;
        let mut buffer = lock(&self.buffer, "replay buffer")?;
        let batch_size = agent.config().batch_size;

        let mut observation = self.env.reset();
        let mut total_reward = 0.0;
        let mut steps = 0;

        loop {
            let action = agent.select_action(&observation, true)?;
            let (next_observation, reward, done) = self.env.step(action)?;

            buffer.push(Transition {
                observation,
                action,
                reward,
                next_observation,
                done,
            });

            if let Some(batch) = buffer.sample(batch_size) {
                let loss = agent.train_step(&batch)?;
                self.stats.record_loss(loss);
                if agent.advance_target_schedule() {
                    debug!(
                        training_steps = agent.training_steps(),
                        "target network synced"
                    );
                }
            }

            total_reward += reward;
            steps += 1;
            observation = next_observation;

            if done {
                break;
            }
        }

        let score = self.env.score();
        self.stats.record_episode(score, total_reward, steps);
        agent.end_episode();

        Ok(EpisodeOutcome {
            score,
            reward: total_reward,
            steps,
            epsilon: agent.epsilon(),
        })
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> Result<MutexGuard<'a, T>, TrainingError> {
    mutex.lock().map_err(|_| TrainingError::Poisoned(name))
}
