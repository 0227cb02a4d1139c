use serde::{Deserialize, Serialize};

use crate::rl::ActionValues;
use crate::rl::approximator::argmax;

/// Added to the value spread so confidence stays below 1
pub const CONFIDENCE_EPSILON: f32 = 1e-6;

/// Confidence reported when every action has the same value
pub const NEUTRAL_CONFIDENCE: f32 = 0.5;

/// Greedy action for one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Action index: 0 up, 1 down, 2 left, 3 right
    pub action: usize,
    pub q_values: Vec<f32>,
    pub confidence: f32,
}

impl Prediction {
    pub fn from_q_values(values: &ActionValues) -> Self {
        Self {
            action: argmax(values),
            q_values: values.to_vec(),
            confidence: confidence(values),
        }
    }
}

/// `(max - min) / (max - min + ε)`, or 0.5 when all values are equal
pub fn confidence(values: &ActionValues) -> f32 {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let spread = max - min;
    if spread == 0.0 || !spread.is_finite() {
        return NEUTRAL_CONFIDENCE;
    }
    spread / (spread + CONFIDENCE_EPSILON)
}
