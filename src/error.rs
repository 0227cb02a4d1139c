//! Error types shared across the game, learning and service layers

use thiserror::Error;

/// The environment was stepped when no live game exists
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidStateError {
    #[error("step called before reset")]
    NotStarted,
    #[error("step called after the game ended; call reset first")]
    GameOver,
}

/// Malformed input arriving from outside the core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("observation must have {expected} values, got {actual}")]
    ObservationWidth { expected: usize, actual: usize },

    #[error("observation contains a non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("reward is not a finite number")]
    NonFiniteReward,

    #[error("action {0} is outside the action space [0, 4)")]
    ActionOutOfRange(i64),

    #[error("record {index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A batch handed to the function approximator had an inconsistent shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("batch is empty")]
    EmptyBatch,

    #[error("batch length mismatch: {observations} observations, {actions} actions, {targets} targets")]
    LengthMismatch {
        observations: usize,
        actions: usize,
        targets: usize,
    },

    #[error("approximator returned {actual} rows for a batch of {expected}")]
    RowCount { expected: usize, actual: usize },

    #[error("approximator produced {actual} action values per row, expected {expected}")]
    OutputWidth { expected: usize, actual: usize },
}

/// A training run was requested while another one is still active
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a training run is already in progress")]
pub struct ConcurrentTrainingError;

/// Failures raised while running the episode loop
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("{0} lock poisoned by a panicked thread")]
    Poisoned(&'static str),
}

/// Errors surfaced by the training service boundary
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    ConcurrentTraining(#[from] ConcurrentTrainingError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error("training worker did not finish: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("{0} lock poisoned by a panicked thread")]
    Poisoned(&'static str),
}
