use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use snake_dqn::game::{Autopilot, GameConfig};
use snake_dqn::modes::{PlayMode, TrainConfig, TrainMode, WatchMode};
use snake_dqn::rl::{TrainingBackend, default_device};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snake_dqn")]
#[command(version, about = "Snake game with a deep Q-learning agent")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Train an agent headlessly and save snapshots
    Train(TrainArgs),
    /// Play snake with keyboard controls
    Play(PlayArgs),
    /// Watch a trained agent play
    Watch(WatchArgs),
}

#[derive(clap::Args)]
struct GridArgs {
    /// Grid width
    #[arg(long)]
    width: Option<usize>,

    /// Grid height
    #[arg(long)]
    height: Option<usize>,

    /// Seed for food placement
    #[arg(long)]
    seed: Option<u64>,
}

impl GridArgs {
    fn apply(&self, config: &mut GameConfig) {
        if let Some(width) = self.width {
            config.grid_width = width;
        }
        if let Some(height) = self.height {
            config.grid_height = height;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

#[derive(clap::Args)]
struct TrainArgs {
    /// JSON training configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of episodes to train
    #[arg(long)]
    episodes: Option<usize>,

    /// Directory for model snapshots
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Save a checkpoint every N episodes (0 = final save only)
    #[arg(long)]
    checkpoint_every: Option<usize>,

    /// Continue from the newest snapshot in the model directory
    #[arg(long)]
    resume: bool,

    /// Recorded experiences to preload into the replay buffer
    #[arg(long)]
    experiences: Option<PathBuf>,

    #[command(flatten)]
    grid: GridArgs,
}

#[derive(clap::Args)]
struct PlayArgs {
    /// Write the played transitions to this file on exit
    #[arg(long)]
    record: Option<PathBuf>,

    /// Let the heuristic autopilot steer instead of the keyboard
    #[arg(long)]
    autopilot: bool,

    #[command(flatten)]
    grid: GridArgs,
}

#[derive(clap::Args)]
struct WatchArgs {
    /// Directory holding model snapshots
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Snapshot id to load (defaults to the newest)
    #[arg(long)]
    snapshot: Option<String>,

    /// Seed for food placement (the grid size comes from the snapshot)
    #[arg(long)]
    seed: Option<u64>,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.mode {
        Mode::Train(args) => {
            init_tracing("info");

            let mut config = match &args.config {
                Some(path) => TrainConfig::from_file(path)?,
                None => TrainConfig::default(),
            };
            if let Some(episodes) = args.episodes {
                config.num_episodes = episodes;
            }
            if let Some(dir) = args.model_dir {
                config.model_dir = dir;
            }
            if let Some(every) = args.checkpoint_every {
                config.checkpoint_frequency = every;
            }
            if args.resume {
                config.resume = true;
            }
            if args.experiences.is_some() {
                config.experiences = args.experiences;
            }
            args.grid.apply(&mut config.game_config);

            let mut train_mode = TrainMode::<TrainingBackend>::new(config, default_device())?;
            train_mode.run().await?;
        }
        Mode::Play(args) => {
            init_tracing("warn");

            let mut config = GameConfig::default();
            args.grid.apply(&mut config);
            config.validate().map_err(anyhow::Error::msg)?;

            let mut play_mode = PlayMode::new(config, args.record);
            if args.autopilot {
                play_mode = play_mode.with_autopilot(Autopilot::default());
            }
            play_mode.run().await?;
        }
        Mode::Watch(args) => {
            init_tracing("warn");

            let config = GameConfig {
                seed: args.seed,
                ..Default::default()
            };

            let mut watch_mode = WatchMode::<TrainingBackend>::new(
                &args.model_dir,
                args.snapshot.as_deref(),
                config,
                default_device(),
            )?;
            watch_mode.run().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_autopilot_flag() {
        let cli = Cli::try_parse_from(["snake_dqn", "play", "--autopilot", "--width", "12"]).unwrap();
        let Mode::Play(args) = cli.mode else {
            panic!("expected play mode");
        };
        assert!(args.autopilot);
        assert_eq!(args.grid.width, Some(12));
    }

    #[test]
    fn test_watch_takes_grid_from_snapshot() {
        let cli = Cli::try_parse_from(["snake_dqn", "watch", "--seed", "3"]).unwrap();
        let Mode::Watch(args) = cli.mode else {
            panic!("expected watch mode");
        };
        assert_eq!(args.seed, Some(3));
        assert_eq!(args.model_dir, PathBuf::from("models"));

        assert!(Cli::try_parse_from(["snake_dqn", "watch", "--width", "12"]).is_err());
        assert!(Cli::try_parse_from(["snake_dqn", "watch", "--height", "12"]).is_err());
    }
}
