use crate::{Result, arch::Sequential, dataset::TrainingBatch};

/// The product of a single training step: the trained model and its error over the batch it
/// was trained with, measured after the step.
#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub model: Sequential,
    pub error: f32,
}

/// What a training run hands over to whoever publishes its result.
#[derive(Debug)]
pub enum TrainingOutcome {
    Trained(TrainingResult),
    /// There weren't enough examples to fill a batch, the model was left untouched.
    NoTrainingPerformed { available: usize },
}

/// A model trainer, runs a single optimization iteration per call.
pub trait Trainer: Send {
    /// Runs exactly one optimization iteration of `model` over `batch`.
    ///
    /// # Arguments
    /// * `model` - The model to train, ownership is handed back within the result.
    /// * `batch` - The samples to train with.
    ///
    /// # Returns
    /// The trained model and its error, or an error if the batch is empty or its widths don't
    /// match the model's.
    fn train_one_step(&mut self, model: Sequential, batch: &TrainingBatch) -> Result<TrainingResult>;
}
