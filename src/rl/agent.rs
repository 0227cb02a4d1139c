//! DQN agent: epsilon-greedy exploration around a Q-learning update rule
//!
//! The agent owns two copies of the Q-function. The online copy is trained
//! every step; the target copy only changes through a hard weight copy and is
//! used both to select and to evaluate the best next action (single DQN).

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::approximator::{ActionValues, QFunction, argmax};
use super::buffer::Transition;
use super::config::DqnConfig;
use super::observation::Observation;
use crate::error::ShapeError;
use crate::game::Action;

pub struct DqnAgent<Q: QFunction> {
    online: Q,
    target: Q,
    config: DqnConfig,
    epsilon: f64,
    steps_since_sync: usize,
    training_steps: usize,
    episodes_trained: usize,
    rng: StdRng,
}

impl<Q: QFunction> DqnAgent<Q> {
    /// Create an agent; the target network starts as a copy of `online`
    pub fn new(online: Q, mut target: Q, config: DqnConfig) -> Self {
        target.set_weights(online.weights());
        Self::from_networks(online, target, config)
    }

    /// Assemble an agent from networks that already hold their weights,
    /// e.g. a target network restored separately from disk
    pub fn from_networks(online: Q, target: Q, config: DqnConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            online,
            target,
            epsilon: config.epsilon_start,
            config,
            steps_since_sync: 0,
            training_steps: 0,
            episodes_trained: 0,
            rng,
        }
    }

    /// Epsilon-greedy action selection
    ///
    /// With `exploring` set, a uniformly random action is returned with
    /// probability epsilon. Otherwise the greedy action is returned.
    pub fn select_action(
        &mut self,
        observation: &Observation,
        exploring: bool,
    ) -> Result<Action, ShapeError> {
        if exploring && self.rng.r#gen::<f64>() < self.epsilon {
            return Ok(Action::ALL[self.rng.gen_range(0..Action::COUNT)]);
        }
        self.greedy_action(observation)
    }

    /// Highest-valued action, the first one on ties
    pub fn greedy_action(&self, observation: &Observation) -> Result<Action, ShapeError> {
        let values = self.q_values(observation)?;
        Ok(Action::ALL[argmax(&values)])
    }

    /// Online network action values for one observation
    pub fn q_values(&self, observation: &Observation) -> Result<ActionValues, ShapeError> {
        self.online
            .q_values(std::slice::from_ref(observation))?
            .into_iter()
            .next()
            .ok_or(ShapeError::EmptyBatch)
    }

    /// One Q-learning update on a sampled batch, returning the loss
    ///
    /// Targets are `reward + gamma * max_a' Q_target(s', a')`, collapsing to
    /// the reward alone for terminal transitions.
    pub fn train_step(&mut self, batch: &[Transition]) -> Result<f32, ShapeError> {
        if batch.is_empty() {
            return Err(ShapeError::EmptyBatch);
        }

        let next_observations: Vec<Observation> =
            batch.iter().map(|t| t.next_observation).collect();
        let next_values = self.target.q_values(&next_observations)?;
        if next_values.len() != batch.len() {
            return Err(ShapeError::RowCount {
                expected: batch.len(),
                actual: next_values.len(),
            });
        }

        let gamma = self.config.gamma;
        let targets: Vec<f32> = batch
            .iter()
            .zip(&next_values)
            .map(|(t, next)| {
                if t.done {
                    t.reward
                } else {
                    let best = next.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    t.reward + gamma * best
                }
            })
            .collect();

        let observations: Vec<Observation> = batch.iter().map(|t| t.observation).collect();
        let actions: Vec<Action> = batch.iter().map(|t| t.action).collect();

        let loss = self.online.fit(&observations, &actions, &targets)?;
        self.training_steps += 1;
        Ok(loss)
    }

    /// Hard copy of the online weights into the target network
    pub fn sync_target_network(&mut self) {
        self.target.set_weights(self.online.weights());
        self.steps_since_sync = 0;
    }

    /// Count one training step towards the next target sync
    ///
    /// Returns true when this step triggered a sync.
    pub fn advance_target_schedule(&mut self) -> bool {
        self.steps_since_sync += 1;
        if self.steps_since_sync >= self.config.target_update_every {
            self.sync_target_network();
            return true;
        }
        false
    }

    /// `epsilon = max(epsilon_min, epsilon * epsilon_decay)`, never increasing
    pub fn decay_epsilon(&mut self) {
        let decayed = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        self.epsilon = decayed.min(self.epsilon);
    }

    /// Book-keeping at the end of an episode
    pub fn end_episode(&mut self) {
        self.decay_epsilon();
        self.episodes_trained += 1;
    }

    /// Restore counters of a previously saved agent
    pub fn restore_progress(
        &mut self,
        epsilon: f64,
        training_steps: usize,
        episodes_trained: usize,
        steps_since_sync: usize,
    ) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
        self.training_steps = training_steps;
        self.episodes_trained = episodes_trained;
        self.steps_since_sync = steps_since_sync;
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn online(&self) -> &Q {
        &self.online
    }

    pub fn target(&self) -> &Q {
        &self.target
    }

    pub fn training_steps(&self) -> usize {
        self.training_steps
    }

    pub fn episodes_trained(&self) -> usize {
        self.episodes_trained
    }

    pub fn steps_since_sync(&self) -> usize {
        self.steps_since_sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::{BurnQFunction, QNetworkConfig, TrainingBackend, default_device};

    /// Q-function returning the same values for every observation
    #[derive(Default)]
    struct ConstantQ {
        values: ActionValues,
        last_targets: Vec<f32>,
    }

    impl QFunction for ConstantQ {
        type Weights = ActionValues;

        fn q_values(&self, observations: &[Observation]) -> Result<Vec<ActionValues>, ShapeError> {
            Ok(vec![self.values; observations.len()])
        }

        fn fit(
            &mut self,
            observations: &[Observation],
            actions: &[Action],
            targets: &[f32],
        ) -> Result<f32, ShapeError> {
            crate::rl::approximator::check_batch(observations.len(), actions.len(), targets.len())?;
            self.last_targets = targets.to_vec();
            let loss = actions
                .iter()
                .zip(targets)
                .map(|(a, y)| (self.values[a.index()] - y).powi(2))
                .sum::<f32>()
                / targets.len() as f32;
            Ok(loss)
        }

        fn weights(&self) -> Self::Weights {
            self.values
        }

        fn set_weights(&mut self, weights: Self::Weights) {
            self.values = weights;
        }
    }

    fn constant_agent(values: ActionValues, config: DqnConfig) -> DqnAgent<ConstantQ> {
        let online = ConstantQ {
            values,
            ..Default::default()
        };
        DqnAgent::new(online, ConstantQ::default(), config)
    }

    fn seeded_config() -> DqnConfig {
        DqnConfig {
            seed: Some(17),
            ..Default::default()
        }
    }

    fn transition(reward: f32, done: bool) -> Transition {
        Transition {
            observation: [0.0; 11],
            action: Action::Left,
            reward,
            next_observation: [1.0; 11],
            done,
        }
    }

    #[test]
    fn test_new_syncs_target() {
        let agent = constant_agent([1.0, 2.0, 3.0, 4.0], seeded_config());
        assert_eq!(agent.target().values, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(agent.epsilon(), 1.0);
    }

    #[test]
    fn test_epsilon_zero_is_greedy() {
        let mut agent = constant_agent([0.1, 0.9, 0.3, 0.2], seeded_config());
        agent.set_epsilon(0.0);
        for _ in 0..100 {
            assert_eq!(agent.select_action(&[0.0; 11], true).unwrap(), Action::Down);
        }
    }

    #[test]
    fn test_greedy_ties_pick_first_index() {
        let agent = constant_agent([0.5, 0.7, 0.7, 0.1], seeded_config());
        assert_eq!(agent.greedy_action(&[0.0; 11]).unwrap(), Action::Down);
    }

    #[test]
    fn test_epsilon_one_always_explores() {
        let mut agent = constant_agent([0.0, 0.0, 0.0, 5.0], seeded_config());
        let mut counts = [0usize; 4];
        for _ in 0..400 {
            counts[agent.select_action(&[0.0; 11], true).unwrap().index()] += 1;
        }
        // The greedy action alone would give [0, 0, 0, 400]
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_not_exploring_ignores_epsilon() {
        let mut agent = constant_agent([0.0, 0.0, 0.0, 5.0], seeded_config());
        for _ in 0..100 {
            assert_eq!(agent.select_action(&[0.0; 11], false).unwrap(), Action::Right);
        }
    }

    #[test]
    fn test_epsilon_decay_sequence() {
        let config = DqnConfig {
            epsilon_start: 0.5,
            epsilon_decay: 0.9,
            epsilon_min: 0.1,
            ..seeded_config()
        };
        let mut agent = constant_agent([0.0; 4], config);

        agent.decay_epsilon();
        assert!((agent.epsilon() - 0.45).abs() < 1e-12);

        let mut previous = agent.epsilon();
        for _ in 0..100 {
            agent.decay_epsilon();
            assert!(agent.epsilon() <= previous);
            assert!(agent.epsilon() >= 0.1);
            previous = agent.epsilon();
        }
        assert_eq!(agent.epsilon(), 0.1);
    }

    #[test]
    fn test_decay_never_increases_below_floor() {
        let mut agent = constant_agent([0.0; 4], seeded_config());
        agent.set_epsilon(0.0);
        agent.decay_epsilon();
        assert_eq!(agent.epsilon(), 0.0);
    }

    #[test]
    fn test_td_targets() {
        let mut agent = constant_agent([0.0, 0.0, 0.0, 0.0], seeded_config());
        agent.target.set_weights([1.0, 2.0, 3.0, 0.0]);

        agent
            .train_step(&[transition(1.0, false), transition(-10.0, true)])
            .unwrap();

        let targets = &agent.online().last_targets;
        assert!((targets[0] - (1.0 + 0.9 * 3.0)).abs() < 1e-6);
        assert_eq!(targets[1], -10.0);
        assert_eq!(agent.training_steps(), 1);
    }

    /// Q-function that always answers with a single row
    struct SingleRowQ;

    impl QFunction for SingleRowQ {
        type Weights = ();

        fn q_values(&self, _observations: &[Observation]) -> Result<Vec<ActionValues>, ShapeError> {
            Ok(vec![[0.0; 4]])
        }

        fn fit(&mut self, _: &[Observation], _: &[Action], _: &[f32]) -> Result<f32, ShapeError> {
            Ok(0.0)
        }

        fn weights(&self) -> Self::Weights {}

        fn set_weights(&mut self, _weights: Self::Weights) {}
    }

    #[test]
    fn test_train_step_rejects_missing_target_rows() {
        let mut agent = DqnAgent::new(SingleRowQ, SingleRowQ, seeded_config());
        let batch = [transition(1.0, false), transition(2.0, false), transition(3.0, true)];

        assert_eq!(
            agent.train_step(&batch),
            Err(ShapeError::RowCount {
                expected: 3,
                actual: 1
            })
        );
        assert_eq!(agent.training_steps(), 0);
    }

    #[test]
    fn test_train_step_empty_batch() {
        let mut agent = constant_agent([0.0; 4], seeded_config());
        assert_eq!(agent.train_step(&[]), Err(ShapeError::EmptyBatch));
        assert_eq!(agent.training_steps(), 0);
    }

    #[test]
    fn test_target_sync_schedule() {
        let config = DqnConfig {
            target_update_every: 3,
            ..seeded_config()
        };
        let mut agent = constant_agent([1.0, 1.0, 1.0, 1.0], config);
        agent.online.set_weights([2.0, 2.0, 2.0, 2.0]);

        assert!(!agent.advance_target_schedule());
        assert!(!agent.advance_target_schedule());
        assert_eq!(agent.target().values, [1.0; 4]);

        assert!(agent.advance_target_schedule());
        assert_eq!(agent.target().values, [2.0; 4]);
        assert_eq!(agent.steps_since_sync(), 0);
    }

    #[test]
    fn test_from_networks_keeps_target() {
        let online = ConstantQ {
            values: [1.0; 4],
            ..Default::default()
        };
        let target = ConstantQ {
            values: [3.0; 4],
            ..Default::default()
        };
        let mut agent = DqnAgent::from_networks(online, target, seeded_config());
        assert_eq!(agent.target().values, [3.0; 4]);

        agent.restore_progress(0.4, 12, 3, 7);
        assert_eq!(agent.steps_since_sync(), 7);
        assert_eq!(agent.training_steps(), 12);
        assert_eq!(agent.episodes_trained(), 3);
        assert_eq!(agent.epsilon(), 0.4);
    }

    #[test]
    fn test_end_episode() {
        let mut agent = constant_agent([0.0; 4], seeded_config());
        agent.end_episode();
        assert_eq!(agent.episodes_trained(), 1);
        assert!((agent.epsilon() - 0.995).abs() < 1e-12);
    }

    #[test]
    fn test_burn_agent_train_step() {
        let device = default_device();
        let network_config = QNetworkConfig::new(vec![32]);
        let online = BurnQFunction::<TrainingBackend>::new(&network_config, 1e-3, &device);
        let target = BurnQFunction::<TrainingBackend>::new(&network_config, 1e-3, &device);
        let mut agent = DqnAgent::new(online, target, seeded_config());

        let obs = [0.25f32; 11];
        assert_eq!(
            agent.online().q_values(&[obs]).unwrap(),
            agent.target().q_values(&[obs]).unwrap()
        );

        let batch: Vec<Transition> = (0..8).map(|i| transition(i as f32, i % 2 == 0)).collect();
        let loss = agent.train_step(&batch).unwrap();
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
    }
}
