//! Wire format for experience gathered outside the trainer
//!
//! A batch is validated as a whole: one bad record rejects everything, so a
//! rejected submission never leaves a partial write in the replay buffer.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::game::Action;
use crate::rl::{Transition, observation::observation_from_slice};

/// One transition as submitted by an external play session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceRecord {
    pub state: Vec<f32>,
    pub action: i64,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub done: bool,
}

impl ExperienceRecord {
    pub fn from_transition(transition: &Transition) -> Self {
        Self {
            state: transition.observation.to_vec(),
            action: transition.action.index() as i64,
            reward: transition.reward,
            next_state: transition.next_observation.to_vec(),
            done: transition.done,
        }
    }

    /// Check widths, finiteness and the action range
    pub fn validate(&self) -> Result<Transition, ValidationError> {
        let observation = observation_from_slice(&self.state)?;
        let next_observation = observation_from_slice(&self.next_state)?;
        let action = Action::try_from(self.action)?;
        if !self.reward.is_finite() {
            return Err(ValidationError::NonFiniteReward);
        }

        Ok(Transition {
            observation,
            action,
            reward: self.reward,
            next_observation,
            done: self.done,
        })
    }
}

/// A batch of submitted transitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceBatch {
    pub experiences: Vec<ExperienceRecord>,
}

impl ExperienceBatch {
    pub fn from_transitions<'a>(transitions: impl IntoIterator<Item = &'a Transition>) -> Self {
        Self {
            experiences: transitions
                .into_iter()
                .map(ExperienceRecord::from_transition)
                .collect(),
        }
    }

    /// Validate every record, reporting the first failure with its index
    pub fn validate(&self) -> Result<Vec<Transition>, ValidationError> {
        self.experiences
            .iter()
            .enumerate()
            .map(|(index, record)| {
                record.validate().map_err(|e| ValidationError::Record {
                    index,
                    source: Box::new(e),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.experiences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(action: i64) -> ExperienceRecord {
        ExperienceRecord {
            state: vec![0.1; 11],
            action,
            reward: 0.1,
            next_state: vec![0.2; 11],
            done: false,
        }
    }

    #[test]
    fn test_valid_record() {
        let transition = record(3).validate().unwrap();
        assert_eq!(transition.action, Action::Right);
        assert_eq!(transition.observation, [0.1; 11]);
        assert_eq!(transition.next_observation, [0.2; 11]);
    }

    #[test]
    fn test_rejects_bad_width() {
        let mut bad = record(0);
        bad.next_state.pop();
        assert_eq!(
            bad.validate(),
            Err(ValidationError::ObservationWidth {
                expected: 11,
                actual: 10
            })
        );
    }

    #[test]
    fn test_rejects_bad_action() {
        assert_eq!(
            record(4).validate(),
            Err(ValidationError::ActionOutOfRange(4))
        );
        assert_eq!(
            record(-1).validate(),
            Err(ValidationError::ActionOutOfRange(-1))
        );
    }

    #[test]
    fn test_rejects_non_finite_reward() {
        let mut bad = record(1);
        bad.reward = f32::INFINITY;
        assert_eq!(bad.validate(), Err(ValidationError::NonFiniteReward));
    }

    #[test]
    fn test_batch_reports_failing_index() {
        let batch = ExperienceBatch {
            experiences: vec![record(0), record(1), record(9)],
        };
        match batch.validate() {
            Err(ValidationError::Record { index, source }) => {
                assert_eq!(index, 2);
                assert_eq!(*source, ValidationError::ActionOutOfRange(9));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = r#"{"experiences":[{"state":[0,0,0,0,0,0,0,0,0,0,1],"action":2,"reward":-10.0,"nextState":[0,0,0,0,0,0,0,0,0,0,1],"done":true}]}"#;
        let batch: ExperienceBatch = serde_json::from_str(json).unwrap();
        let transitions = batch.validate().unwrap();
        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].done);
        assert_eq!(transitions[0].action, Action::Left);
    }

    #[test]
    fn test_transition_round_trip() {
        let transition = record(2).validate().unwrap();
        let batch = ExperienceBatch::from_transitions([&transition]);
        assert_eq!(batch.validate().unwrap(), vec![transition]);
    }
}
