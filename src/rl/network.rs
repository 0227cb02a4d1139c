//! Q-network for the Snake DQN agent
//!
//! A plain multilayer perceptron over the 11-feature observation:
//!
//! ```text
//! Input: [batch, 11]
//!   ↓ Linear(11 → 128) + ReLU
//!   ↓ Linear(128 → 128) + ReLU
//!   ↓ Linear(128 → 4)
//! Output: [batch, 4] action values (up, down, left, right)
//! ```
//!
//! # Example
//!
//! ```rust
//! use snake_dqn::rl::{QNetworkConfig, TrainingBackend, default_device};
//! use burn::tensor::Tensor;
//!
//! let device = default_device();
//! let network = QNetworkConfig::default().init::<TrainingBackend>(&device);
//!
//! let observations = Tensor::zeros([8, 11], &device);
//! let q_values = network.forward(observations);
//!
//! assert_eq!(q_values.dims(), [8, 4]);
//! ```

use burn::{
    module::{AutodiffModule, Module},
    nn::{
        Linear, LinearConfig,
        loss::{MseLoss, Reduction},
    },
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    tensor::{
        ElementConversion, Int, Tensor, TensorData,
        activation::relu,
        backend::{AutodiffBackend, Backend},
    },
};

use super::approximator::{ActionValues, QFunction, check_batch};
use super::observation::{OBSERVATION_SIZE, Observation};
use crate::error::ShapeError;
use crate::game::Action;

/// Layer sizes of the Q-network
#[derive(Debug, Clone)]
pub struct QNetworkConfig {
    /// Number of input features (default: 11)
    pub input_size: usize,

    /// Width of each hidden layer (default: [128, 128])
    pub hidden_layers: Vec<usize>,

    /// Number of action values produced (default: 4)
    pub num_actions: usize,
}

impl QNetworkConfig {
    pub fn new(hidden_layers: Vec<usize>) -> Self {
        Self {
            input_size: OBSERVATION_SIZE,
            hidden_layers,
            num_actions: Action::COUNT,
        }
    }

    /// Initialize the network with fresh random weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        let mut hidden = Vec::with_capacity(self.hidden_layers.len());
        let mut width = self.input_size;
        for &size in &self.hidden_layers {
            hidden.push(LinearConfig::new(width, size).init(device));
            width = size;
        }

        QNetwork {
            hidden,
            output: LinearConfig::new(width, self.num_actions).init(device),
        }
    }
}

impl Default for QNetworkConfig {
    fn default() -> Self {
        Self::new(vec![128, 128])
    }
}

/// Fully connected Q-network
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    /// Hidden layers, each followed by ReLU
    hidden: Vec<Linear<B>>,
    /// Linear output head, one value per action
    output: Linear<B>,
}

impl<B: Backend> QNetwork<B> {
    /// Forward pass: `[batch, input_size]` → `[batch, num_actions]`
    pub fn forward(&self, observations: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self
            .hidden
            .iter()
            .fold(observations, |x, layer| relu(layer.forward(x)));
        self.output.forward(x)
    }
}

/// Stack observations into a `[batch, 11]` tensor
pub fn observation_batch<B: Backend>(
    observations: &[Observation],
    device: &B::Device,
) -> Tensor<B, 2> {
    let flat: Vec<f32> = observations.iter().flatten().copied().collect();
    Tensor::from_data(
        TensorData::new(flat, [observations.len(), OBSERVATION_SIZE]),
        device,
    )
}

fn action_value_rows<B: Backend>(q_values: Tensor<B, 2>) -> Result<Vec<ActionValues>, ShapeError> {
    let [_, width] = q_values.dims();
    if width != Action::COUNT {
        return Err(ShapeError::OutputWidth {
            expected: Action::COUNT,
            actual: width,
        });
    }

    let flat: Vec<f32> = q_values.into_data().iter::<f32>().collect();
    Ok(flat
        .chunks_exact(Action::COUNT)
        .map(|row| {
            let mut values = [0.0; Action::COUNT];
            values.copy_from_slice(row);
            values
        })
        .collect())
}

/// Adam moment estimates of a [`BurnQFunction`], keyed by parameter id
pub type OptimizerRecord<B> =
    <OptimizerAdaptor<Adam, QNetwork<B>, B> as Optimizer<QNetwork<B>, B>>::Record;

/// [`QFunction`] backed by a Burn [`QNetwork`] trained with Adam
pub struct BurnQFunction<B: AutodiffBackend> {
    network: QNetwork<B>,
    optim: OptimizerAdaptor<Adam, QNetwork<B>, B>,
    learning_rate: f64,
    device: B::Device,
}

impl<B: AutodiffBackend> BurnQFunction<B> {
    /// Fresh randomly initialised network
    pub fn new(config: &QNetworkConfig, learning_rate: f64, device: &B::Device) -> Self {
        Self::from_network(config.init(device), learning_rate, device)
    }

    /// Wrap an existing network, e.g. one restored from disk
    pub fn from_network(network: QNetwork<B>, learning_rate: f64, device: &B::Device) -> Self {
        Self {
            network,
            optim: AdamConfig::new().init(),
            learning_rate,
            device: device.clone(),
        }
    }

    pub fn network(&self) -> &QNetwork<B> {
        &self.network
    }

    pub fn optimizer_record(&self) -> OptimizerRecord<B> {
        self.optim.to_record()
    }

    /// Continue from saved Adam state instead of a fresh optimizer
    pub fn load_optimizer_record(&mut self, record: OptimizerRecord<B>) {
        let optim: OptimizerAdaptor<Adam, QNetwork<B>, B> = AdamConfig::new().init();
        self.optim = optim.load_record(record);
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

impl<B: AutodiffBackend> QFunction for BurnQFunction<B> {
    type Weights = QNetwork<B>;

    fn q_values(&self, observations: &[Observation]) -> Result<Vec<ActionValues>, ShapeError> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }

        // Forward pass in valid (no-grad) mode
        let network = self.network.clone().valid();
        let input = observation_batch::<B::InnerBackend>(observations, &self.device);
        action_value_rows(network.forward(input))
    }

    fn fit(
        &mut self,
        observations: &[Observation],
        actions: &[Action],
        targets: &[f32],
    ) -> Result<f32, ShapeError> {
        check_batch(observations.len(), actions.len(), targets.len())?;

        let input = observation_batch::<B>(observations, &self.device);
        let action_data: Vec<i32> = actions.iter().map(|a| a.index() as i32).collect();
        let actions = Tensor::<B, 1, Int>::from_ints(action_data.as_slice(), &self.device);
        let targets = Tensor::<B, 1>::from_floats(targets, &self.device);

        let q_values = self.network.forward(input);
        let [_, width] = q_values.dims();
        if width != Action::COUNT {
            return Err(ShapeError::OutputWidth {
                expected: Action::COUNT,
                actual: width,
            });
        }

        // Q(s, a) for the action actually taken
        let predicted = q_values.gather(1, actions.unsqueeze_dim(1)).squeeze::<1>(1);
        let loss = MseLoss::new().forward(predicted, targets, Reduction::Mean);
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.network);
        self.network = self
            .optim
            .step(self.learning_rate, self.network.clone(), grads);

        Ok(loss_value)
    }

    fn weights(&self) -> Self::Weights {
        self.network.clone()
    }

    fn set_weights(&mut self, weights: Self::Weights) {
        self.network = weights;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::{TrainingBackend, default_device};

    fn create_q_function() -> BurnQFunction<TrainingBackend> {
        let device = default_device();
        BurnQFunction::new(&QNetworkConfig::new(vec![16, 16]), 0.01, &device)
    }

    #[test]
    fn test_network_output_shape() {
        let device = default_device();
        let network = QNetworkConfig::default().init::<TrainingBackend>(&device);
        let output = network.forward(Tensor::zeros([3, OBSERVATION_SIZE], &device));
        assert_eq!(output.dims(), [3, 4]);
    }

    #[test]
    fn test_no_hidden_layers() {
        let device = default_device();
        let network = QNetworkConfig::new(Vec::new()).init::<TrainingBackend>(&device);
        let output = network.forward(Tensor::zeros([2, OBSERVATION_SIZE], &device));
        assert_eq!(output.dims(), [2, 4]);
    }

    #[test]
    fn test_q_values_rows() {
        let q = create_q_function();
        let rows = q.q_values(&[[0.1; 11], [0.5; 11]]).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().flatten().all(|v| v.is_finite()));
        assert!(q.q_values(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_fit_reduces_loss() {
        let mut q = create_q_function();
        let observations = vec![[0.2f32; 11], [0.7f32; 11]];
        let actions = vec![Action::Up, Action::Right];
        let targets = vec![1.0, -1.0];

        let first = q.fit(&observations, &actions, &targets).unwrap();
        let mut last = first;
        for _ in 0..200 {
            last = q.fit(&observations, &actions, &targets).unwrap();
        }

        assert!(first.is_finite());
        assert!(last < first);
    }

    #[test]
    fn test_fit_rejects_ragged_batch() {
        let mut q = create_q_function();
        let result = q.fit(&[[0.0; 11]], &[Action::Up, Action::Down], &[0.0]);
        assert!(matches!(result, Err(ShapeError::LengthMismatch { .. })));
    }

    #[test]
    fn test_weight_copy_reproduces_outputs() {
        let source = create_q_function();
        let mut copy = create_q_function();
        let obs = [[0.3f32; 11]];

        assert_ne!(source.q_values(&obs).unwrap(), copy.q_values(&obs).unwrap());
        copy.set_weights(source.weights());
        assert_eq!(source.q_values(&obs).unwrap(), copy.q_values(&obs).unwrap());
    }
}
