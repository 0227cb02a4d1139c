pub mod play;
pub mod train;
pub mod watch;

pub use play::PlayMode;
pub use train::{TrainConfig, TrainMode, TrainOutcome};
pub use watch::WatchMode;
