//! Watch a trained agent play
//!
//! Loads a snapshot from a model store and lets the agent play greedily in
//! the terminal, with its action values and confidence shown beside the
//! board.
//!
//! # Controls
//!
//! - Space: Pause/unpause
//! - R: Start a new episode
//! - 1-4: Speed control (1=slow, 2=normal, 3=fast, 4=very fast)
//! - Q/Esc: Quit

use anyhow::{Context, Result, anyhow};
use burn::tensor::backend::AutodiffBackend;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    io::{Stderr, stderr},
    path::Path,
    time::Duration,
};
use tokio::time::{Interval, interval};

use crate::game::{Action, GameConfig};
use crate::input::{InputHandler, KeyAction};
use crate::metrics::SessionMetrics;
use crate::render::{AgentPanel, Controls, Renderer};
use crate::rl::{BurnAgent, ModelMetadata, ModelStore, SnakeEnvironment};
use crate::service::Prediction;

/// Playback speed settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSpeed {
    /// 2 Hz
    Slow,
    /// 8 Hz, same as human play
    Normal,
    /// 20 Hz
    Fast,
    /// 60 Hz
    VeryFast,
}

impl PlaybackSpeed {
    fn from_preset(preset: u8) -> Option<Self> {
        match preset {
            1 => Some(Self::Slow),
            2 => Some(Self::Normal),
            3 => Some(Self::Fast),
            4 => Some(Self::VeryFast),
            _ => None,
        }
    }

    fn tick_interval(&self) -> Duration {
        match self {
            Self::Slow => Duration::from_millis(500),
            Self::Normal => Duration::from_millis(125),
            Self::Fast => Duration::from_millis(50),
            Self::VeryFast => Duration::from_millis(16),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "Slow",
            Self::Normal => "Normal",
            Self::Fast => "Fast",
            Self::VeryFast => "Very Fast",
        }
    }
}

pub struct WatchMode<B: AutodiffBackend> {
    agent: BurnAgent<B>,
    snapshot_id: String,
    metadata: ModelMetadata,
    env: SnakeEnvironment,
    renderer: Renderer,
    metrics: SessionMetrics,
    input_handler: InputHandler,
    last_prediction: Option<Prediction>,
    should_quit: bool,
    paused: bool,
    speed: PlaybackSpeed,
    episode: usize,
}

impl<B: AutodiffBackend> WatchMode<B> {
    /// Load a snapshot (the newest one when `snapshot` is `None`)
    ///
    /// The board takes the grid size the agent was trained on; the rest of
    /// `config` (food region, rewards, seed) is used as given.
    pub fn new(
        model_dir: &Path,
        snapshot: Option<&str>,
        mut config: GameConfig,
        device: B::Device,
    ) -> Result<Self> {
        let store = ModelStore::open(model_dir)?;
        let (snapshot_id, agent, metadata) = match snapshot {
            Some(id) => {
                let (agent, metadata) = store.load::<B>(id, &device)?;
                (id.to_string(), agent, metadata)
            }
            None => store
                .load_latest::<B>(&device)?
                .ok_or_else(|| anyhow!("No saved models in {:?}", model_dir))?,
        };

        config.grid_width = metadata.grid_width;
        config.grid_height = metadata.grid_height;
        config.validate().map_err(anyhow::Error::msg)?;

        println!("{}", "=".repeat(60));
        println!("Loaded Model Information");
        println!("{}", "=".repeat(60));
        println!("Snapshot: {}", snapshot_id);
        println!("Episodes trained: {}", metadata.episodes_trained);
        println!("Training steps: {}", metadata.training_steps);
        println!("Grid size: {}x{}", metadata.grid_width, metadata.grid_height);
        println!(
            "Avg score at save: {:.2} (max {})",
            metadata.rolling_average_score, metadata.rolling_max_score
        );
        println!("Saved: {}", metadata.created_at);
        println!("Version: {}", metadata.version);
        println!("{}", "=".repeat(60));

        let renderer = Renderer::new(config.grid_width, config.grid_height, Controls::Watch);
        let mut env = SnakeEnvironment::new(config);
        env.reset();

        Ok(Self {
            agent,
            snapshot_id,
            metadata,
            env,
            renderer,
            metrics: SessionMetrics::new(),
            input_handler: InputHandler::new(),
            last_prediction: None,
            should_quit: false,
            paused: false,
            speed: PlaybackSpeed::Normal,
            episode: 1,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stderr = stderr();
        execute!(stderr, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stderr);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor().context("Failed to hide cursor")?;
        terminal.clear().context("Failed to clear terminal")?;

        let result = self.run_watch_loop(&mut terminal).await;

        self.cleanup_terminal(&mut terminal)?;

        result
    }

    async fn run_watch_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        let mut event_stream = EventStream::new();
        let mut tick_timer = interval(self.speed.tick_interval());
        let mut render_timer = interval(Duration::from_millis(33));

        loop {
            tokio::select! {
                maybe_event = event_stream.next() => {
                    if let Some(Ok(event)) = maybe_event {
                        self.handle_event(event, &mut tick_timer);
                    }
                }

                _ = tick_timer.tick() => {
                    if !self.paused {
                        self.tick()?;
                    }
                }

                _ = render_timer.tick() => {
                    self.metrics.tick();
                    let panel = self.agent_panel();
                    if let Some(state) = self.env.state() {
                        terminal.draw(|frame| {
                            self.renderer.render(frame, state, &self.metrics, panel.as_ref());
                        }).context("Failed to draw frame")?;
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    self.should_quit = true;
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Step the agent, or start the next episode once the last one ended
    fn tick(&mut self) -> Result<()> {
        let over = self.env.state().is_none_or(|s| s.over);
        if over {
            self.new_episode();
            return Ok(());
        }
        self.step_agent()
    }

    /// Let the agent pick the greedy action and apply it
    fn step_agent(&mut self) -> Result<()> {
        let observation = self
            .env
            .observation()
            .context("No game in progress")?;
        let values = self
            .agent
            .q_values(&observation)
            .context("Failed to evaluate action values")?;
        let prediction = Prediction::from_q_values(&values);
        let action = Action::try_from(prediction.action)?;

        let (_, _, done) = self.env.step(action)?;
        if done {
            self.metrics.on_game_over(self.env.score());
        }
        self.last_prediction = Some(prediction);
        Ok(())
    }

    fn new_episode(&mut self) {
        self.env.reset();
        self.metrics.on_game_start();
        self.last_prediction = None;
        self.episode += 1;
    }

    fn handle_event(&mut self, event: Event, tick_timer: &mut Interval) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }

        match self.input_handler.handle_key_event(key) {
            KeyAction::Quit => self.should_quit = true,
            KeyAction::TogglePause => self.paused = !self.paused,
            KeyAction::Restart => self.new_episode(),
            KeyAction::Speed(preset) => {
                if let Some(speed) = PlaybackSpeed::from_preset(preset) {
                    self.speed = speed;
                    tick_timer.reset_after(speed.tick_interval());
                }
            }
            KeyAction::Move(_) | KeyAction::None => {}
        }
    }

    fn agent_panel(&self) -> Option<AgentPanel> {
        let prediction = self.last_prediction.as_ref()?;
        let q_values: [f32; 4] = prediction.q_values.as_slice().try_into().ok()?;
        Some(AgentPanel {
            q_values,
            action: Action::try_from(prediction.action).ok()?,
            confidence: prediction.confidence,
            episode: self.episode,
            speed: self.speed.as_str(),
            paused: self.paused,
            snapshot: self.snapshot_id.clone(),
            episodes_trained: self.metadata.episodes_trained,
        })
    }

    fn cleanup_terminal(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        disable_raw_mode().context("Failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("Failed to leave alternate screen")?;
        terminal.show_cursor().context("Failed to show cursor")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::{DqnConfig, TrainingBackend, default_device, new_burn_agent};
    use tempfile::TempDir;

    fn save_agent(dir: &Path, width: usize, height: usize) -> String {
        let device = default_device();
        let config = DqnConfig {
            hidden_layers: vec![16],
            seed: Some(3),
            ..Default::default()
        };
        let agent = new_burn_agent::<TrainingBackend>(config, &device);
        let store = ModelStore::open(dir).unwrap();
        let metadata = ModelMetadata::from_agent(&agent, width, height);
        store.save(&agent, &metadata).unwrap()
    }

    #[test]
    fn test_missing_model_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = WatchMode::<TrainingBackend>::new(
            temp_dir.path(),
            None,
            GameConfig::small(),
            default_device(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_loads_latest_and_adopts_grid() {
        let temp_dir = TempDir::new().unwrap();
        let id = save_agent(temp_dir.path(), 12, 8);

        let mode = WatchMode::<TrainingBackend>::new(
            temp_dir.path(),
            None,
            GameConfig::small().with_seed(1),
            default_device(),
        )
        .unwrap();

        assert_eq!(mode.snapshot_id, id);
        assert_eq!(mode.env.config().grid_width, 12);
        assert_eq!(mode.env.config().grid_height, 8);
    }

    #[test]
    fn test_agent_plays_greedy_steps() {
        let temp_dir = TempDir::new().unwrap();
        let id = save_agent(temp_dir.path(), 10, 10);
        let mut mode = WatchMode::<TrainingBackend>::new(
            temp_dir.path(),
            Some(&id),
            GameConfig::small().with_seed(1),
            default_device(),
        )
        .unwrap();

        mode.tick().unwrap();

        let prediction = mode.last_prediction.clone().unwrap();
        assert_eq!(prediction.q_values.len(), 4);
        assert!(prediction.confidence > 0.0 && prediction.confidence <= 1.0);
        assert_eq!(mode.env.state().unwrap().steps, 1);

        let panel = mode.agent_panel().unwrap();
        assert_eq!(panel.action.index(), prediction.action);
        assert_eq!(panel.episode, 1);
    }

    #[test]
    fn test_restarts_after_game_over() {
        let temp_dir = TempDir::new().unwrap();
        save_agent(temp_dir.path(), 10, 10);
        let mut mode = WatchMode::<TrainingBackend>::new(
            temp_dir.path(),
            None,
            GameConfig::small().with_seed(1),
            default_device(),
        )
        .unwrap();

        // A greedy agent either dies or loops; cap the number of ticks
        for _ in 0..500 {
            mode.tick().unwrap();
            if mode.episode > 1 {
                break;
            }
        }
        if mode.episode > 1 {
            assert_eq!(mode.metrics.games_played, 1);
            assert_eq!(mode.env.state().unwrap().steps, 0);
            assert!(mode.last_prediction.is_none());
        }
    }

    #[test]
    fn test_speed_presets() {
        assert_eq!(PlaybackSpeed::from_preset(1), Some(PlaybackSpeed::Slow));
        assert_eq!(PlaybackSpeed::from_preset(4), Some(PlaybackSpeed::VeryFast));
        assert_eq!(PlaybackSpeed::from_preset(9), None);
        assert!(PlaybackSpeed::Slow.tick_interval() > PlaybackSpeed::Fast.tick_interval());
    }
}
