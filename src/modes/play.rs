//! Human play in the terminal, optionally recording experiences
//!
//! Every step taken is kept as a transition. With a recording path set, the
//! transitions are written on exit as an experience batch that
//! `train --experiences` can feed into the replay buffer. With an
//! [`Autopilot`] attached the heuristic steers instead of the keyboard, which
//! is a cheap way to record competent demonstrations.

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::fs;
use std::io::{Stderr, stderr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

use crate::game::{Action, Autopilot, GameConfig};
use crate::input::{InputHandler, KeyAction};
use crate::metrics::SessionMetrics;
use crate::render::{Controls, Renderer};
use crate::rl::{Observation, SnakeEnvironment, Transition};
use crate::service::ExperienceBatch;

pub struct PlayMode {
    env: SnakeEnvironment,
    observation: Observation,
    metrics: SessionMetrics,
    renderer: Renderer,
    input_handler: InputHandler,
    should_quit: bool,
    pending_action: Option<Action>,
    transitions: Vec<Transition>,
    record_path: Option<PathBuf>,
    autopilot: Option<Autopilot>,
}

impl PlayMode {
    pub fn new(config: GameConfig, record_path: Option<PathBuf>) -> Self {
        let renderer = Renderer::new(config.grid_width, config.grid_height, Controls::Play);
        let mut env = SnakeEnvironment::new(config);
        let observation = env.reset();

        Self {
            env,
            observation,
            metrics: SessionMetrics::new(),
            renderer,
            input_handler: InputHandler::new(),
            should_quit: false,
            pending_action: None,
            transitions: Vec::new(),
            record_path,
            autopilot: None,
        }
    }

    /// Let the autopilot steer; movement keys are ignored
    pub fn with_autopilot(mut self, autopilot: Autopilot) -> Self {
        self.autopilot = Some(autopilot);
        self
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stderr = stderr();
        execute!(stderr, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stderr);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor().context("Failed to hide cursor")?;
        terminal.clear().context("Failed to clear terminal")?;

        let result = self.run_game_loop(&mut terminal).await;

        self.cleanup_terminal(&mut terminal)?;
        result?;

        if let Some(path) = self.record_path.clone() {
            let count = self.save_recording(&path)?;
            println!("Recorded {} transitions to {:?}", count, path);
        }
        Ok(())
    }

    async fn run_game_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        let mut event_stream = EventStream::new();

        // Game ticks at 8 Hz
        let mut tick_timer = interval(Duration::from_millis(125));

        // Render at 30 FPS
        let mut render_timer = interval(Duration::from_millis(33));

        loop {
            tokio::select! {
                maybe_event = event_stream.next() => {
                    if let Some(Ok(event)) = maybe_event {
                        self.handle_event(event);
                    }
                }

                _ = tick_timer.tick() => {
                    self.update_game()?;
                }

                _ = render_timer.tick() => {
                    self.metrics.tick();
                    if let Some(state) = self.env.state() {
                        terminal.draw(|frame| {
                            self.renderer.render(frame, state, &self.metrics, None);
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

    fn handle_event(&mut self, event: Event) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }

        match self.input_handler.handle_key_event(key) {
            KeyAction::Move(action) if self.autopilot.is_none() => {
                self.pending_action = Some(action)
            }
            KeyAction::Restart => self.reset_game(),
            KeyAction::Quit => self.should_quit = true,
            KeyAction::Move(_) | KeyAction::TogglePause | KeyAction::Speed(_) | KeyAction::None => {}
        }
    }

    /// Advance one tick; idle while the game-over screen is shown
    fn update_game(&mut self) -> Result<()> {
        let Some(state) = self.env.state() else {
            return Ok(());
        };
        if state.over {
            return Ok(());
        }

        let action = match &self.autopilot {
            Some(autopilot) => {
                let config = self.env.config();
                autopilot.next_action(state, config.grid_width, config.grid_height)
            }
            // Without input the snake keeps its heading
            None => self
                .pending_action
                .take()
                .unwrap_or_else(|| Action::from(state.direction)),
        };

        let (next_observation, reward, done) = self.env.step(action)?;
        self.transitions.push(Transition {
            observation: self.observation,
            action,
            reward,
            next_observation,
            done,
        });
        self.observation = next_observation;

        if done {
            self.metrics.on_game_over(self.env.score());
        }
        Ok(())
    }

    fn reset_game(&mut self) {
        self.observation = self.env.reset();
        self.metrics.on_game_start();
        self.pending_action = None;
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Write the recorded transitions as an experience batch
    pub fn save_recording(&self, path: &Path) -> Result<usize> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let batch = ExperienceBatch::from_transitions(&self.transitions);
        let json = serde_json::to_string(&batch).context("Failed to serialize experiences")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write experiences to {:?}", path))?;

        info!(count = batch.len(), path = ?path, "experiences recorded");
        Ok(batch.len())
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
