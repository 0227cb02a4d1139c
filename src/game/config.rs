use serde::{Deserialize, Serialize};

/// Central rectangle where food is preferentially placed, as fractions of the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRegion {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for FoodRegion {
    fn default() -> Self {
        Self {
            x_min: 0.30,
            x_max: 0.70,
            y_min: 0.40,
            y_max: 0.60,
        }
    }
}

impl FoodRegion {
    /// Cell bounds `(x_min, x_max, y_min, y_max)` with exclusive maxima
    pub fn cell_bounds(&self, width: usize, height: usize) -> (i32, i32, i32, i32) {
        (
            (width as f64 * self.x_min) as i32,
            (width as f64 * self.x_max) as i32,
            (height as f64 * self.y_min) as i32,
            (height as f64 * self.y_max) as i32,
        )
    }
}

/// Configuration for the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Width of the game grid
    pub grid_width: usize,
    /// Height of the game grid
    pub grid_height: usize,
    /// Initial length of the snake
    pub initial_snake_length: usize,
    /// Where food spawns during the first placement attempts
    pub food_region: FoodRegion,

    // Rewards (for RL)
    /// Reward for eating food
    pub food_reward: f32,
    /// Reward for surviving a step without eating
    pub survival_reward: f32,
    /// Bonus (or penalty, when moving away) for changing the distance to food
    pub approach_reward: f32,
    /// Penalty for dying
    pub death_penalty: f32,

    /// Seed for food placement, random when unset
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_width: 24,
            grid_height: 24,
            initial_snake_length: 4,
            food_region: FoodRegion::default(),
            food_reward: 10.0,
            survival_reward: 0.1,
            approach_reward: 0.5,
            death_penalty: -10.0,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Create a new configuration with custom grid size
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            grid_width: width,
            grid_height: height,
            ..Default::default()
        }
    }

    /// Create a small grid for testing
    pub fn small() -> Self {
        Self::new(10, 10)
    }

    pub fn with_initial_length(mut self, length: usize) -> Self {
        self.initial_snake_length = length;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check that the starting snake fits and the food region is sane
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_width < 2 || self.grid_height < 1 {
            return Err(format!(
                "grid must be at least 2x1, got {}x{}",
                self.grid_width, self.grid_height
            ));
        }
        if self.initial_snake_length == 0 {
            return Err("initial_snake_length must be at least 1".to_string());
        }
        // The tail extends left from the centre column
        if self.initial_snake_length > self.grid_width / 2 + 1 {
            return Err(format!(
                "initial_snake_length {} does not fit a grid {} cells wide",
                self.initial_snake_length, self.grid_width
            ));
        }
        let r = &self.food_region;
        for (name, value) in [
            ("x_min", r.x_min),
            ("x_max", r.x_max),
            ("y_min", r.y_min),
            ("y_max", r.y_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("food_region.{name} must be in [0, 1], got {value}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.grid_width, 24);
        assert_eq!(config.grid_height, 24);
        assert_eq!(config.initial_snake_length, 4);
        assert_eq!(config.food_reward, 10.0);
        assert_eq!(config.death_penalty, -10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_config() {
        let config = GameConfig::new(15, 12);
        assert_eq!(config.grid_width, 15);
        assert_eq!(config.grid_height, 12);
    }

    #[test]
    fn test_food_region_bounds() {
        let region = FoodRegion::default();
        assert_eq!(region.cell_bounds(24, 24), (7, 16, 9, 14));
        assert_eq!(region.cell_bounds(5, 5), (1, 3, 2, 3));
    }

    #[test]
    fn test_validate_rejects_oversized_snake() {
        let config = GameConfig::new(5, 5).with_initial_length(4);
        assert!(config.validate().is_err());

        let config = GameConfig::new(5, 5).with_initial_length(3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: GameConfig = serde_json::from_str(r#"{"grid_width": 12}"#).unwrap();
        assert_eq!(config.grid_width, 12);
        assert_eq!(config.grid_height, 24);
        assert_eq!(config.survival_reward, 0.1);
        assert_eq!(
            config,
            GameConfig {
                grid_width: 12,
                ..Default::default()
            }
        );
    }
}
