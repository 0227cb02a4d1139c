//! Training statistics tracking for DQN
//!
//! Episode scores are kept in a rolling window (the last 100 episodes by
//! default) from which the reported average and maximum are computed.

use std::collections::VecDeque;

/// Default number of episodes in the rolling window
pub const DEFAULT_WINDOW: usize = 100;

/// Training statistics tracker with rolling averages
///
/// # Example
///
/// ```rust
/// use snake_dqn::metrics::TrainingStats;
///
/// let mut stats = TrainingStats::new(100);
/// stats.record_episode(3, 12.5, 40);
/// stats.record_loss(0.25);
///
/// assert_eq!(stats.rolling_max_score(), 3);
/// assert_eq!(stats.last_loss(), Some(0.25));
/// ```
#[derive(Debug, Clone)]
pub struct TrainingStats {
    /// Episode scores (food eaten), rolling window
    episode_scores: VecDeque<u32>,

    /// Total episode rewards, rolling window
    episode_rewards: VecDeque<f32>,

    /// Episode lengths in steps, rolling window
    episode_lengths: VecDeque<usize>,

    /// Most recent training loss
    last_loss: Option<f32>,

    total_episodes: usize,
    total_steps: usize,
    window_size: usize,
}

impl TrainingStats {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            episode_scores: VecDeque::with_capacity(window_size),
            episode_rewards: VecDeque::with_capacity(window_size),
            episode_lengths: VecDeque::with_capacity(window_size),
            last_loss: None,
            total_episodes: 0,
            total_steps: 0,
            window_size,
        }
    }

    /// Record the completion of an episode, trimming the oldest entry once
    /// the window is full
    pub fn record_episode(&mut self, score: u32, reward: f32, length: usize) {
        Self::push_deque(&mut self.episode_scores, score, self.window_size);
        Self::push_deque(&mut self.episode_rewards, reward, self.window_size);
        Self::push_deque(&mut self.episode_lengths, length, self.window_size);
        self.total_episodes += 1;
        self.total_steps += length;
    }

    pub fn record_loss(&mut self, loss: f32) {
        self.last_loss = Some(loss);
    }

    /// Mean score over the window, 0.0 before the first episode
    pub fn rolling_average_score(&self) -> f32 {
        if self.episode_scores.is_empty() {
            return 0.0;
        }
        self.episode_scores.iter().sum::<u32>() as f32 / self.episode_scores.len() as f32
    }

    /// Best score in the window, 0 before the first episode
    pub fn rolling_max_score(&self) -> u32 {
        self.episode_scores.iter().copied().max().unwrap_or(0)
    }

    pub fn mean_episode_reward(&self) -> f32 {
        if self.episode_rewards.is_empty() {
            return 0.0;
        }
        self.episode_rewards.iter().sum::<f32>() / self.episode_rewards.len() as f32
    }

    pub fn mean_episode_length(&self) -> f32 {
        if self.episode_lengths.is_empty() {
            return 0.0;
        }
        self.episode_lengths.iter().sum::<usize>() as f32 / self.episode_lengths.len() as f32
    }

    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Scores currently in the window, oldest first
    pub fn scores(&self) -> impl Iterator<Item = u32> + '_ {
        self.episode_scores.iter().copied()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// One-line summary for progress logs
    pub fn format_summary(&self) -> String {
        let loss = self
            .last_loss
            .map_or_else(|| "-".to_string(), |l| format!("{l:.4}"));
        format!(
            "Episodes: {} | Steps: {} | Avg score: {:.2} | Max score: {} | Reward: {:.2} | Len: {:.1} | Loss: {}",
            self.total_episodes,
            self.total_steps,
            self.rolling_average_score(),
            self.rolling_max_score(),
            self.mean_episode_reward(),
            self.mean_episode_length(),
            loss,
        )
    }

    fn push_deque<T>(deque: &mut VecDeque<T>, value: T, window_size: usize) {
        if deque.len() >= window_size {
            deque.pop_front();
        }
        deque.push_back(value);
    }
}

impl Default for TrainingStats {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let stats = TrainingStats::default();
        assert_eq!(stats.window_size(), 100);
        assert_eq!(stats.total_episodes(), 0);
        assert_eq!(stats.rolling_average_score(), 0.0);
        assert_eq!(stats.rolling_max_score(), 0);
        assert_eq!(stats.last_loss(), None);
    }

    #[test]
    fn test_record_episode() {
        let mut stats = TrainingStats::new(100);
        stats.record_episode(3, 10.0, 50);
        stats.record_episode(1, 2.0, 30);

        assert_eq!(stats.total_episodes(), 2);
        assert_eq!(stats.total_steps(), 80);
        assert!((stats.rolling_average_score() - 2.0).abs() < 1e-6);
        assert_eq!(stats.rolling_max_score(), 3);
        assert!((stats.mean_episode_reward() - 6.0).abs() < 1e-6);
        assert!((stats.mean_episode_length() - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_trims_oldest() {
        let mut stats = TrainingStats::new(100);
        stats.record_episode(50, 0.0, 1);
        for _ in 0..100 {
            stats.record_episode(1, 0.0, 1);
        }

        // The 50 from the first episode has left the window
        assert_eq!(stats.scores().count(), 100);
        assert_eq!(stats.rolling_max_score(), 1);
        assert!((stats.rolling_average_score() - 1.0).abs() < 1e-6);
        assert_eq!(stats.total_episodes(), 101);
    }

    #[test]
    fn test_last_loss() {
        let mut stats = TrainingStats::default();
        stats.record_loss(0.5);
        stats.record_loss(0.1);
        assert_eq!(stats.last_loss(), Some(0.1));
        assert!(stats.format_summary().contains("Loss: 0.1000"));
    }
}
