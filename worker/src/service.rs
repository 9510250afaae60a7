use comms::HttpRegistry;
use log::info;
use machine_learning::training::TrainerBuilder;
use tokio::sync::mpsc;

use crate::{
    Result, WorkerConfig,
    activation::Activation,
    coordinator::PublishCoordinator,
    report::ActivationReport,
    schedule::Scheduler,
    source::SpoolSource,
    store::FileModelStore,
    training::TrainingTask,
};

/// The key of the trigger waking the service up.
pub const TRIGGER_KEY: &str = "training";

/// The background trainer: every activation takes a batch of spooled examples, trains the
/// stored model with it and publishes the result if it beats the registry's best.
pub struct TrainingService {
    config: WorkerConfig,
    scheduler: Scheduler,
    trainer_builder: TrainerBuilder,
}

impl TrainingService {
    /// Creates a new `TrainingService`.
    ///
    /// # Arguments
    /// * `config` - The service's configuration.
    /// * `wake` - Where the service's trigger sends its wake-ups.
    ///
    /// # Returns
    /// A new `TrainingService` or an error if the configuration is invalid.
    pub fn new(config: WorkerConfig, wake: mpsc::Sender<String>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            scheduler: Scheduler::new(wake),
            trainer_builder: TrainerBuilder::new(),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Makes sure the service's repeating trigger is registered.
    ///
    /// # Returns
    /// Whether a new trigger had to be registered.
    pub fn ensure_trigger(&self) -> bool {
        self.scheduler.register(TRIGGER_KEY, self.config.interval())
    }

    /// Runs one activation.
    ///
    /// The example spool, the model store and the registry client are opened here and
    /// owned by the activation, so they're released as soon as it ends however it ends.
    ///
    /// # Returns
    /// The activation's report, or an error if its resources couldn't be opened.
    pub async fn activate(&self) -> Result<ActivationReport> {
        self.ensure_trigger();

        let config = &self.config;
        let source = SpoolSource::open(&config.examples_dir)?;
        let store = FileModelStore::new(&config.model_path);
        let registry = HttpRegistry::new(&config.registry())?;
        let trainer = self.trainer_builder.build(config.optimizer);

        let training = TrainingTask::new(source, store, trainer, config.board.clone(), config.batch_size)
            .with_seed(config.seed);
        let coordinator = PublishCoordinator::new(registry, config.policy);

        info!("activation started");
        Ok(Activation::new(training, coordinator).run().await)
    }

    /// Cancels the service's triggers, no more wake-ups are sent afterwards.
    pub fn deactivate(&self) {
        self.scheduler.cancel_all();
        info!("service deactivated");
    }

    /// Returns whether the service's trigger is registered and running.
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.active() > 0
    }
}
