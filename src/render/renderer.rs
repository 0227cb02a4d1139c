use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};

use crate::game::{Action, GameState, Position};
use crate::metrics::SessionMetrics;
use crate::rl::ActionValues;

/// Which front-end the footer describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controls {
    Play,
    Watch,
}

/// Agent details drawn next to the board in watch mode
#[derive(Debug, Clone, PartialEq)]
pub struct AgentPanel {
    pub q_values: ActionValues,
    pub action: Action,
    pub confidence: f32,
    pub episode: usize,
    pub speed: &'static str,
    pub paused: bool,
    pub snapshot: String,
    pub episodes_trained: usize,
}

pub struct Renderer {
    grid_width: usize,
    grid_height: usize,
    controls: Controls,
}

impl Renderer {
    pub fn new(grid_width: usize, grid_height: usize, controls: Controls) -> Self {
        Self {
            grid_width,
            grid_height,
            controls,
        }
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        state: &GameState,
        metrics: &SessionMetrics,
        panel: Option<&AgentPanel>,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Game area
                Constraint::Length(3), // Footer
            ])
            .split(frame.area());

        frame.render_widget(self.render_stats(state, metrics), chunks[0]);

        let columns = match panel {
            Some(_) => [
                Constraint::Percentage(5),
                Constraint::Percentage(65),
                Constraint::Percentage(30),
            ],
            None => [
                Constraint::Percentage(10),
                Constraint::Percentage(80),
                Constraint::Percentage(10),
            ],
        };
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(columns)
            .split(chunks[1]);

        if state.over {
            frame.render_widget(self.render_game_over(state), body[1]);
        } else {
            frame.render_widget(self.render_grid(state), body[1]);
        }

        if let Some(panel) = panel {
            frame.render_widget(self.render_agent_panel(panel), body[2]);
        }

        frame.render_widget(self.render_controls(), chunks[2]);
    }

    fn render_grid(&self, state: &GameState) -> Paragraph<'_> {
        let head = state.snake.head();
        let mut lines = Vec::with_capacity(self.grid_height);

        for y in 0..self.grid_height {
            let mut spans = Vec::with_capacity(self.grid_width);

            for x in 0..self.grid_width {
                let pos = Position::new(x as i32, y as i32);

                let cell = if pos == head {
                    Span::styled(
                        "■ ",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )
                } else if state.snake.contains(pos) {
                    Span::styled("□ ", Style::default().fg(Color::Green))
                } else if state.food == Some(pos) {
                    Span::styled(
                        "O ",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::styled(". ", Style::default().fg(Color::DarkGray))
                };

                spans.push(cell);
            }

            lines.push(Line::from(spans));
        }

        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(Color::White))
                    .title(" Snake "),
            )
            .alignment(Alignment::Center)
    }

    fn render_stats(&self, state: &GameState, metrics: &SessionMetrics) -> Paragraph<'_> {
        let label = Style::default().fg(Color::Yellow);
        let value = Style::default().fg(Color::White);

        let text = vec![Line::from(vec![
            Span::styled("Score: ", label),
            Span::styled(state.score.to_string(), value.add_modifier(Modifier::BOLD)),
            Span::raw("    "),
            Span::styled("Steps: ", label),
            Span::styled(state.steps.to_string(), value),
            Span::raw("    "),
            Span::styled("High: ", label),
            Span::styled(metrics.high_score.to_string(), value),
            Span::raw("    "),
            Span::styled("Avg: ", label),
            Span::styled(format!("{:.1}", metrics.average_score()), value),
            Span::raw("    "),
            Span::styled("Time: ", label),
            Span::styled(metrics.format_time(), value),
        ])];

        Paragraph::new(text).alignment(Alignment::Center)
    }

    fn render_agent_panel(&self, panel: &AgentPanel) -> Paragraph<'_> {
        let mut lines = vec![
            Line::from(Span::styled(
                "Action values",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];

        for action in Action::ALL {
            let chosen = action == panel.action;
            let style = if chosen {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{:<6}", action_label(action)), style),
                Span::styled(format!("{:>9.3}", panel.q_values[action.index()]), style),
                Span::styled(if chosen { " ◀" } else { "" }, style),
            ]));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Confidence: ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{:.3}", panel.confidence)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Episode: ", Style::default().fg(Color::Yellow)),
            Span::raw(panel.episode.to_string()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Speed: ", Style::default().fg(Color::Yellow)),
            Span::raw(panel.speed),
        ]));
        if panel.paused {
            lines.push(Line::from(Span::styled(
                "PAUSED",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            panel.snapshot.clone(),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(Span::styled(
            format!("trained {} episodes", panel.episodes_trained),
            Style::default().fg(Color::DarkGray),
        )));

        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Agent "),
        )
    }

    fn render_game_over(&self, state: &GameState) -> Paragraph<'_> {
        let text = vec![
            Line::from(""),
            Line::from(vec![Span::styled(
                "GAME OVER",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(vec![
                Span::styled("Final Score: ", Style::default().fg(Color::Yellow)),
                Span::styled(
                    state.score.to_string(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled("Press ", Style::default().fg(Color::Gray)),
                Span::styled(
                    "R",
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(" to restart or ", Style::default().fg(Color::Gray)),
                Span::styled(
                    "Q",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::styled(" to quit", Style::default().fg(Color::Gray)),
            ]),
        ];

        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
    }

    fn render_controls(&self) -> Paragraph<'_> {
        let key = Style::default().fg(Color::Cyan);
        let spans = match self.controls {
            Controls::Play => vec![
                Span::styled("↑↓←→", key),
                Span::raw(" or "),
                Span::styled("WASD", key),
                Span::raw(" to move | "),
                Span::styled("R", key),
                Span::raw(" restart | "),
                Span::styled("Q", Style::default().fg(Color::Red)),
                Span::raw(" to quit"),
            ],
            Controls::Watch => vec![
                Span::styled("Space", key),
                Span::raw(" pause | "),
                Span::styled("1-4", key),
                Span::raw(" speed | "),
                Span::styled("R", key),
                Span::raw(" new episode | "),
                Span::styled("Q", Style::default().fg(Color::Red)),
                Span::raw(" to quit"),
            ],
        };

        Paragraph::new(vec![Line::from(spans)]).alignment(Alignment::Center)
    }
}

fn action_label(action: Action) -> &'static str {
    match action {
        Action::Up => "Up",
        Action::Down => "Down",
        Action::Left => "Left",
        Action::Right => "Right",
    }
}
