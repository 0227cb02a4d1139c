//! Snake DQN - a Snake game with a deep Q-learning agent
//!
//! This library provides:
//! - Core game logic and the heuristic autopilot (game module)
//! - Feature extraction, replay memory, the DQN agent and trainer (rl module)
//! - The training service boundary: submission, status, inference (service module)
//! - Training and gameplay statistics (metrics module)
//! - TUI rendering and input (render, input modules)
//! - Execution modes: train, play, watch (modes module)

pub mod error;
pub mod game;
pub mod input;
pub mod metrics;
pub mod modes;
pub mod render;
pub mod rl;
pub mod service;
