use comms::RemoteRegistry;
use log::{info, warn};
use tokio::{sync::oneshot, task};

use crate::{
    WorkerErr,
    coordinator::{PublishCoordinator, PublishOutcome, PublishRun},
    report::{ActivationFailure, ActivationReport, TrainingStatus},
    source::ExampleSource,
    store::ModelStore,
    training::{TrainingRun, TrainingTask},
};

/// A single training and publishing round.
///
/// The training task runs on a blocking thread while the coordinator waits on a one shot
/// slot for its outcome, so the registry is never contacted before the trained model has
/// been stored.
pub struct Activation<S, M, R> {
    training: TrainingTask<S, M>,
    coordinator: PublishCoordinator<R>,
}

impl<S, M, R> Activation<S, M, R>
where
    S: ExampleSource + 'static,
    M: ModelStore + 'static,
    R: RemoteRegistry + Send + Sync + 'static,
{
    pub fn new(training: TrainingTask<S, M>, coordinator: PublishCoordinator<R>) -> Self {
        Self {
            training,
            coordinator,
        }
    }

    /// Runs both tasks and waits for both of them to finish.
    ///
    /// # Returns
    /// A report aggregating both tasks' outcomes and failures. Failures never escape as errors.
    pub async fn run(self) -> ActivationReport {
        let Self {
            training,
            coordinator,
        } = self;

        let (tx, rx) = oneshot::channel();
        let publish = tokio::spawn(coordinator.run(rx));
        let training = task::spawn_blocking(move || training.run(tx));

        let (training, publish) = tokio::join!(training, publish);
        let mut failures = Vec::new();

        let training = training.unwrap_or_else(|e| {
            warn!("training task failed: {e}");
            failures.push(ActivationFailure::TaskFailed(WorkerErr::Join(e)));
            TrainingRun {
                status: TrainingStatus::Failed,
                failures: Vec::new(),
            }
        });

        let publish = publish.unwrap_or_else(|e| {
            warn!("publish task failed: {e}");
            failures.push(ActivationFailure::TaskFailed(WorkerErr::Join(e)));
            PublishRun {
                outcome: PublishOutcome::Aborted,
                transitions: Vec::new(),
                failures: Vec::new(),
            }
        });

        failures.extend(training.failures);
        failures.extend(publish.failures);

        let report = ActivationReport {
            training: training.status,
            publish: publish.outcome,
            transitions: publish.transitions,
            failures,
        };

        info!(
            published = report.published(),
            failures = report.failures.len();
            "activation finished"
        );

        report
    }
}
