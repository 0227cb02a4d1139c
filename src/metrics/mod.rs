pub mod game_metrics;
pub mod training_stats;

pub use game_metrics::SessionMetrics;
pub use training_stats::TrainingStats;
