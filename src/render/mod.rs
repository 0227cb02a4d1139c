pub mod renderer;

pub use renderer::{AgentPanel, Controls, Renderer};
