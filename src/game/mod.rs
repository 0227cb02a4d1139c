//! Core game logic module for Snake
//!
//! This module contains all the game logic without any I/O or rendering dependencies.
//! It is driven both by the terminal front-ends and by the learning environment.

pub mod action;
pub mod autopilot;
pub mod config;
pub mod engine;
pub mod state;

// Re-export commonly used types
pub use action::{Action, Direction};
pub use autopilot::{Autopilot, AutopilotConfig};
pub use config::{FoodRegion, GameConfig};
pub use engine::{GameEngine, StepInfo, StepResult};
pub use state::{CollisionType, GameState, Position, Snake, is_in_bounds};
