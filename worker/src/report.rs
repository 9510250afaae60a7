use std::fmt;

use comms::CommsErr;
use machine_learning::MlErr;

use crate::{
    WorkerErr,
    coordinator::{PublishOutcome, PublishState},
};

/// A failure an activation recovered from, or that ended it early without taking the
/// process down.
#[derive(Debug)]
pub enum ActivationFailure {
    /// The board's cell range can't be scaled, the examples were dropped.
    DegenerateRange { min: f32, max: f32 },
    /// The stored model doesn't fit the board, it was replaced by a fresh one.
    DimensionMismatch {
        stored: (usize, usize),
        expected: (usize, usize),
    },
    /// The stored model couldn't be read, it was replaced by a fresh one.
    ModelLoad(WorkerErr),
    /// A model with a non-finite error or parameters was discarded, `stored` tells whether
    /// it came from the model store or out of the training step.
    NonFiniteModel { stored: bool },
    /// The trained model couldn't be stored.
    ModelSave(WorkerErr),
    /// The example source couldn't be read.
    Source(WorkerErr),
    /// An example doesn't fit the model.
    Encoding(MlErr),
    Training(MlErr),
    RemoteQueryFailure(CommsErr),
    PublishFailed(CommsErr),
    /// One of the activation's tasks panicked.
    TaskFailed(WorkerErr),
}

impl fmt::Display for ActivationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationFailure::DegenerateRange { min, max } => {
                write!(f, "degenerate cell range [{min}, {max}]")
            }
            ActivationFailure::DimensionMismatch { stored, expected } => write!(
                f,
                "stored model is {}x{}, expected {}x{}",
                stored.0, stored.1, expected.0, expected.1
            ),
            ActivationFailure::ModelLoad(e) => write!(f, "model load failed: {e}"),
            ActivationFailure::NonFiniteModel { stored: true } => {
                write!(f, "stored model has non-finite parameters")
            }
            ActivationFailure::NonFiniteModel { stored: false } => {
                write!(f, "training step produced a non-finite model")
            }
            ActivationFailure::ModelSave(e) => write!(f, "model save failed: {e}"),
            ActivationFailure::Source(e) => write!(f, "example source failed: {e}"),
            ActivationFailure::Encoding(e) => write!(f, "example encoding failed: {e}"),
            ActivationFailure::Training(e) => write!(f, "training failed: {e}"),
            ActivationFailure::RemoteQueryFailure(e) => write!(f, "best rating query failed: {e}"),
            ActivationFailure::PublishFailed(e) => write!(f, "publish failed: {e}"),
            ActivationFailure::TaskFailed(e) => write!(f, "activation task failed: {e}"),
        }
    }
}

/// How the training half of an activation ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainingStatus {
    /// A step was run, `saved` tells whether the result reached the model store.
    Trained { error: f32, saved: bool },
    NoTrainingPerformed { available: usize },
    /// The step couldn't run, see the report's failures.
    Failed,
}

/// Everything that happened during one activation.
#[derive(Debug)]
pub struct ActivationReport {
    pub training: TrainingStatus,
    pub publish: PublishOutcome,
    /// Every state the publish coordinator went through, in order.
    pub transitions: Vec<PublishState>,
    pub failures: Vec<ActivationFailure>,
}

impl ActivationReport {
    pub fn published(&self) -> bool {
        matches!(self.publish, PublishOutcome::Published { .. })
    }

    /// Returns whether the activation ran without recovering from any failure.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
