//! Training service: the boundary other components talk to
//!
//! A [`TrainingService`] owns one agent and one replay buffer. It runs at most
//! one background training run at a time and answers status, inference and
//! experience-submission requests. While a run is active the worker holds the
//! agent and buffer for a whole episode, so requests that need either of them
//! wait for the next episode boundary.

pub mod inference;
pub mod submission;

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use crate::error::{ConcurrentTrainingError, ServiceError, TrainingError, ValidationError};
use crate::game::GameConfig;
use crate::rl::{
    DqnAgent, EpisodeReport, QFunction, ReplayBuffer, SnakeEnvironment, StopSignal, Trainer,
    TrainingSummary, observation::observation_from_slice,
};

pub use inference::Prediction;
pub use submission::{ExperienceBatch, ExperienceRecord};

/// Snapshot of training progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatus {
    pub is_training: bool,
    pub current_episode: usize,
    pub total_episodes: usize,
    pub rolling_average_score: f32,
    pub rolling_max_score: u32,
    pub current_loss: Option<f32>,
    pub current_epsilon: f64,
}

impl TrainingStatus {
    fn idle(epsilon: f64) -> Self {
        Self {
            is_training: false,
            current_episode: 0,
            total_episodes: 0,
            rolling_average_score: 0.0,
            rolling_max_score: 0,
            current_loss: None,
            current_epsilon: epsilon,
        }
    }

    fn apply(&mut self, report: &EpisodeReport) {
        self.current_episode = report.episode;
        self.total_episodes = report.total_episodes;
        self.rolling_average_score = report.rolling_average_score;
        self.rolling_max_score = report.rolling_max_score;
        self.current_loss = report.loss;
        self.current_epsilon = report.epsilon;
    }
}

/// Replay buffer fill level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStatus {
    pub count: usize,
    pub capacity: usize,
    /// Whether a training batch can be sampled
    pub is_ready: bool,
}

/// Handle to a running training worker
pub struct TrainingHandle {
    stop: StopSignal,
    status: watch::Receiver<TrainingStatus>,
    join: JoinHandle<Result<TrainingSummary, TrainingError>>,
}

impl TrainingHandle {
    /// Request a stop; the in-flight episode still completes
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Receiver that observes every status update of this run
    pub fn status(&self) -> watch::Receiver<TrainingStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker to finish
    pub async fn join(self) -> Result<TrainingSummary, ServiceError> {
        Ok(self.join.await??)
    }
}

/// Clears the active flag when the worker ends, even by panic
struct ActiveRun {
    active: Arc<AtomicBool>,
    status: Arc<watch::Sender<TrainingStatus>>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.status.send_modify(|s| s.is_training = false);
        self.active.store(false, Ordering::SeqCst);
    }
}

pub struct TrainingService<Q: QFunction> {
    agent: Arc<Mutex<DqnAgent<Q>>>,
    buffer: Arc<Mutex<ReplayBuffer>>,
    game_config: GameConfig,
    active: Arc<AtomicBool>,
    status: Arc<watch::Sender<TrainingStatus>>,
}

impl<Q: QFunction> TrainingService<Q> {
    /// Wrap an agent and buffer, rejecting configurations a run could not use
    pub fn new(
        agent: DqnAgent<Q>,
        buffer: ReplayBuffer,
        game_config: GameConfig,
    ) -> Result<Self, ValidationError> {
        agent.config().validate().map_err(ValidationError::Config)?;
        game_config.validate().map_err(ValidationError::Config)?;

        let (status, _) = watch::channel(TrainingStatus::idle(agent.epsilon()));
        Ok(Self {
            agent: Arc::new(Mutex::new(agent)),
            buffer: Arc::new(Mutex::new(buffer)),
            game_config,
            active: Arc::new(AtomicBool::new(false)),
            status: Arc::new(status),
        })
    }

    /// Latest status snapshot
    pub fn status(&self) -> TrainingStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<TrainingStatus> {
        self.status.subscribe()
    }

    pub fn is_training(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Validate a submitted batch and append it to the replay buffer
    ///
    /// Returns the number of transitions stored. An invalid record rejects
    /// the whole batch and leaves the buffer untouched.
    pub fn submit_experiences(&self, batch: &ExperienceBatch) -> Result<usize, ServiceError> {
        let transitions = batch.validate()?;
        let count = transitions.len();

        let mut buffer = lock(&self.buffer, "replay buffer")?;
        buffer.push_batch(transitions);
        info!(count, buffered = buffer.len(), "experiences submitted");
        Ok(count)
    }

    /// Greedy action, action values and confidence for one observation
    pub fn predict(&self, observation: &[f32]) -> Result<Prediction, ServiceError> {
        let observation = observation_from_slice(observation)?;
        let agent = lock(&self.agent, "agent")?;
        let values = agent.q_values(&observation)?;
        Ok(Prediction::from_q_values(&values))
    }

    pub fn buffer_status(&self) -> Result<BufferStatus, ServiceError> {
        let batch_size = lock(&self.agent, "agent")?.config().batch_size;
        let buffer = lock(&self.buffer, "replay buffer")?;
        Ok(BufferStatus {
            count: buffer.len(),
            capacity: buffer.capacity(),
            is_ready: buffer.is_ready(batch_size),
        })
    }

    /// Shared handle to the agent, e.g. for saving snapshots between runs
    pub fn agent(&self) -> Arc<Mutex<DqnAgent<Q>>> {
        Arc::clone(&self.agent)
    }

    /// Run `f` with the agent locked
    pub fn with_agent<R>(&self, f: impl FnOnce(&mut DqnAgent<Q>) -> R) -> Result<R, ServiceError> {
        let mut agent = lock(&self.agent, "agent")?;
        Ok(f(&mut agent))
    }

    pub fn game_config(&self) -> &GameConfig {
        &self.game_config
    }
}

impl<Q> TrainingService<Q>
where
    Q: QFunction + Send + 'static,
{
    /// Start a background training run of `episodes` episodes
    ///
    /// `on_episode` runs on the worker thread after every episode, with no
    /// locks held. Fails immediately if a run is already active; the active
    /// run is not affected. Must be called from within a Tokio runtime.
    pub fn start_training<F>(
        &self,
        episodes: usize,
        mut on_episode: F,
    ) -> Result<TrainingHandle, ConcurrentTrainingError>
    where
        F: FnMut(&EpisodeReport) + Send + 'static,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("training request rejected, a run is already active");
            return Err(ConcurrentTrainingError);
        }

        let epsilon = match self.agent.lock() {
            Ok(agent) => agent.epsilon(),
            Err(_) => self.status.borrow().current_epsilon,
        };
        self.status.send_replace(TrainingStatus {
            is_training: true,
            total_episodes: episodes,
            ..TrainingStatus::idle(epsilon)
        });

        let guard = ActiveRun {
            active: Arc::clone(&self.active),
            status: Arc::clone(&self.status),
        };
        let stop = StopSignal::new();
        let worker_stop = stop.clone();
        let status = Arc::clone(&self.status);
        let env = SnakeEnvironment::new(self.game_config.clone());
        let agent = Arc::clone(&self.agent);
        let buffer = Arc::clone(&self.buffer);

        info!(episodes, "starting training worker");
        let join = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let mut trainer = Trainer::new(env, agent, buffer);
            let result = trainer.run(episodes, &worker_stop, |report| {
                status.send_modify(|s| s.apply(report));
                on_episode(report);
            });
            if let Err(e) = &result {
                error!(error = %e, "training worker failed");
            }
            result
        });

        Ok(TrainingHandle {
            stop,
            status: self.status.subscribe(),
            join,
        })
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> Result<MutexGuard<'a, T>, ServiceError> {
    mutex.lock().map_err(|_| ServiceError::Poisoned(name))
}
