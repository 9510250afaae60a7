mod builder;
mod model_trainer;
mod trainer;

pub use builder::{OptimizerSpec, TrainerBuilder};
pub use model_trainer::ModelTrainer;
pub use trainer::{Trainer, TrainingOutcome, TrainingResult};
