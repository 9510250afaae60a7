use log::debug;

use super::{Trainer, TrainingResult};
use crate::{
    MlErr, Result,
    arch::{Sequential, loss::LossFn},
    dataset::TrainingBatch,
    optimization::Optimizer,
};

/// A model `Trainer`. Holds the optimizer and loss function, the model itself goes in and out
/// of every `train_one_step` call.
pub struct ModelTrainer<O, L>
where
    O: Optimizer,
    L: LossFn,
{
    optimizer: O,
    loss_fn: L,
    grad: Vec<f32>,
}

impl<O, L> ModelTrainer<O, L>
where
    O: Optimizer,
    L: LossFn,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer used to update the parameters on each step.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    pub fn new(optimizer: O, loss_fn: L) -> Self {
        Self {
            optimizer,
            loss_fn,
            grad: Vec::new(),
        }
    }
}

impl<O, L> ModelTrainer<O, L>
where
    O: Optimizer,
    L: LossFn,
{
    fn check_widths(model: &Sequential, batch: &TrainingBatch) -> Result<()> {
        if batch.is_empty() {
            return Err(MlErr::EmptyBatch);
        }

        if batch.input_width() != model.input_width() {
            return Err(MlErr::DimensionMismatch {
                what: "batch input width",
                got: batch.input_width(),
                expected: model.input_width(),
            });
        }

        if batch.output_width() != model.output_width() {
            return Err(MlErr::DimensionMismatch {
                what: "batch output width",
                got: batch.output_width(),
                expected: model.output_width(),
            });
        }

        Ok(())
    }
}

impl<O, L> Trainer for ModelTrainer<O, L>
where
    O: Optimizer + Send,
    L: LossFn + Send,
{
    fn train_one_step(
        &mut self,
        mut model: Sequential,
        batch: &TrainingBatch,
    ) -> Result<TrainingResult> {
        Self::check_widths(&model, batch)?;

        let (x, y) = batch.views();
        self.grad.clear();
        self.grad.resize(model.size(), 0.);

        let before = model.backprop(x, y, &self.loss_fn, &mut self.grad)?;
        self.optimizer.update_params(model.params_mut(), &self.grad)?;

        let y_pred = model.forward(x)?;
        let error = self.loss_fn.loss(y_pred.view(), y);
        debug!("trained one step over {} samples: error {before} -> {error}", batch.len());

        Ok(TrainingResult { model, error })
    }
}
