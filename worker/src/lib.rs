pub mod activation;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod report;
pub mod schedule;
pub mod service;
pub mod source;
pub mod store;
pub mod training;

pub use activation::Activation;
pub use config::{BoardConfig, WorkerConfig};
pub use coordinator::{PublishCoordinator, PublishOutcome, PublishState, RemotePolicy};
pub use error::{Result, WorkerErr};
pub use report::{ActivationFailure, ActivationReport, TrainingStatus};
pub use service::TrainingService;
