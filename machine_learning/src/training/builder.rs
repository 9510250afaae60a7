use serde::{Deserialize, Serialize};

use super::{ModelTrainer, Trainer};
use crate::{
    arch::loss::Mse,
    optimization::{GradientDescent, Rprop},
};

/// The optimizer a `Trainer` is built with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerSpec {
    #[default]
    Rprop,
    GradientDescent {
        learning_rate: f32,
    },
}

/// Builds `Trainer`s given a specification.
#[derive(Default)]
pub struct TrainerBuilder;

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Trainer` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The optimizer to train with.
    pub fn build(&self, spec: OptimizerSpec) -> Box<dyn Trainer> {
        match spec {
            OptimizerSpec::Rprop => Box::new(ModelTrainer::new(Rprop::new(), Mse)),
            OptimizerSpec::GradientDescent { learning_rate } => {
                Box::new(ModelTrainer::new(GradientDescent::new(learning_rate), Mse))
            }
        }
    }
}
