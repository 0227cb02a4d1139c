//! Experience replay buffer for DQN training
//!
//! A bounded FIFO of transitions. Once the buffer is full every push evicts
//! the oldest entry. Sampling draws distinct transitions uniformly at random
//! and never removes anything.

use std::collections::VecDeque;

use rand::{SeedableRng, rngs::StdRng, seq::index};

use super::observation::Observation;
use crate::game::Action;

/// One step of experience
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Observation,
    pub action: Action,
    pub reward: f32,
    pub next_observation: Observation,
    pub done: bool,
}

/// Replay buffer with a fixed capacity
///
/// # Example
///
/// ```rust
/// use snake_dqn::game::Action;
/// use snake_dqn::rl::{ReplayBuffer, Transition};
///
/// let mut buffer = ReplayBuffer::with_seed(2, 0);
/// for i in 0..3 {
///     buffer.push(Transition {
///         observation: [i as f32; 11],
///         action: Action::Up,
///         reward: 0.1,
///         next_observation: [0.0; 11],
///         done: false,
///     });
/// }
///
/// assert_eq!(buffer.len(), 2);
/// assert!(buffer.sample(3).is_none());
/// assert_eq!(buffer.sample(2).map(|batch| batch.len()), Some(2));
/// ```
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
    rng: StdRng,
}

impl ReplayBuffer {
    /// Create an empty buffer holding at most `capacity` transitions
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    /// Create an empty buffer whose sampling is reproducible
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            rng,
        }
    }

    /// Add a transition, evicting the oldest one when full
    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Push transitions in order
    pub fn push_batch(&mut self, transitions: impl IntoIterator<Item = Transition>) {
        for transition in transitions {
            self.push(transition);
        }
    }

    /// Draw `batch_size` distinct transitions
    ///
    /// Returns `None` while fewer than `batch_size` transitions are stored.
    pub fn sample(&mut self, batch_size: usize) -> Option<Vec<Transition>> {
        if self.buffer.len() < batch_size {
            return None;
        }

        let picked = index::sample(&mut self.rng, self.buffer.len(), batch_size);
        Some(picked.iter().map(|i| self.buffer[i].clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a batch of `batch_size` can be sampled
    pub fn is_ready(&self, batch_size: usize) -> bool {
        self.buffer.len() >= batch_size
    }

    /// Stored transitions, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn transition(tag: f32) -> Transition {
        Transition {
            observation: [tag; 11],
            action: Action::Right,
            reward: tag,
            next_observation: [tag + 1.0; 11],
            done: false,
        }
    }

    #[test]
    fn test_buffer_new() {
        let buffer = ReplayBuffer::new(16);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 16);
        assert!(!buffer.is_ready(1));
    }

    #[test]
    fn test_buffer_push() {
        let mut buffer = ReplayBuffer::new(4);
        buffer.push(transition(1.0));
        assert_eq!(buffer.len(), 1);
        assert!(buffer.is_ready(1));
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut buffer = ReplayBuffer::with_seed(5, 1);
        for i in 0..10 {
            buffer.push(transition(i as f32));
        }

        assert_eq!(buffer.len(), 5);
        let rewards: Vec<f32> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut buffer = ReplayBuffer::new(3);
        for i in 0..50 {
            buffer.push(transition(i as f32));
            assert!(buffer.len() <= 3);
        }
    }

    #[test]
    fn test_push_batch_is_sequential() {
        let mut buffer = ReplayBuffer::new(3);
        buffer.push_batch((0..4).map(|i| transition(i as f32)));
        let rewards: Vec<f32> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sample_not_ready() {
        let mut buffer = ReplayBuffer::with_seed(10, 3);
        buffer.push_batch((0..4).map(|i| transition(i as f32)));
        assert!(buffer.sample(5).is_none());
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_sample_returns_distinct_items() {
        let mut buffer = ReplayBuffer::with_seed(100, 7);
        buffer.push_batch((0..20).map(|i| transition(i as f32)));

        for _ in 0..10 {
            let batch = buffer.sample(20).unwrap();
            assert_eq!(batch.len(), 20);
            let distinct: HashSet<u32> = batch.iter().map(|t| t.reward as u32).collect();
            assert_eq!(distinct.len(), 20);
        }

        // Sampling never removes anything
        assert_eq!(buffer.len(), 20);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut buffer = ReplayBuffer::new(0);
        buffer.push(transition(1.0));
        assert!(buffer.is_empty());
        assert_eq!(buffer.sample(0).map(|b| b.len()), Some(0));
    }

    #[test]
    fn test_buffer_clear() {
        let mut buffer = ReplayBuffer::new(4);
        buffer.push_batch((0..3).map(|i| transition(i as f32)));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
