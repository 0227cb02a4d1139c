//! Function approximator seam used by the DQN agent
//!
//! The agent only needs batched forward passes, one regression step towards
//! TD targets, and a way to copy weights into the target network. Anything
//! implementing [`QFunction`] can be plugged in; the crate ships a Burn MLP in
//! [`crate::rl::network`].

use super::observation::Observation;
use crate::error::ShapeError;
use crate::game::Action;

/// Estimated value of each action, indexed by [`Action::index`]
pub type ActionValues = [f32; Action::COUNT];

pub trait QFunction {
    /// Snapshot of the learnable parameters
    type Weights: Clone;

    /// Forward pass over a batch of observations, one row per observation
    fn q_values(&self, observations: &[Observation]) -> Result<Vec<ActionValues>, ShapeError>;

    /// Regress Q(observation, action) towards `targets` with a single
    /// gradient step and return the mean squared error before the step
    fn fit(
        &mut self,
        observations: &[Observation],
        actions: &[Action],
        targets: &[f32],
    ) -> Result<f32, ShapeError>;

    fn weights(&self) -> Self::Weights;

    fn set_weights(&mut self, weights: Self::Weights);
}

/// Reject empty or ragged training batches
pub fn check_batch(observations: usize, actions: usize, targets: usize) -> Result<(), ShapeError> {
    if observations != actions || observations != targets {
        return Err(ShapeError::LengthMismatch {
            observations,
            actions,
            targets,
        });
    }
    if observations == 0 {
        return Err(ShapeError::EmptyBatch);
    }
    Ok(())
}

/// Index of the largest value, the first one on ties
pub fn argmax(values: &ActionValues) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = i;
        }
    }
    best
}
