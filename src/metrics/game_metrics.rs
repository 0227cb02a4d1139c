use std::time::{Duration, Instant};

/// Per-session counters shown by the terminal front-ends
pub struct SessionMetrics {
    pub game_started: Instant,
    pub elapsed_time: Duration,
    pub high_score: u32,
    pub games_played: u32,
    pub total_score: u32,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            game_started: Instant::now(),
            elapsed_time: Duration::ZERO,
            high_score: 0,
            games_played: 0,
            total_score: 0,
        }
    }

    /// Refresh the clock of the running game
    pub fn tick(&mut self) {
        self.elapsed_time = self.game_started.elapsed();
    }

    pub fn on_game_start(&mut self) {
        self.game_started = Instant::now();
        self.elapsed_time = Duration::ZERO;
    }

    pub fn on_game_over(&mut self, final_score: u32) {
        self.games_played += 1;
        self.total_score += final_score;
        self.high_score = self.high_score.max(final_score);
    }

    pub fn average_score(&self) -> f32 {
        if self.games_played == 0 {
            return 0.0;
        }
        self.total_score as f32 / self.games_played as f32
    }

    pub fn format_time(&self) -> String {
        let total_secs = self.elapsed_time.as_secs();
        format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
