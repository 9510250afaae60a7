use comms::{RemoteRegistry, WORST_RATING};
use log::{debug, warn};
use machine_learning::training::{TrainingOutcome, TrainingResult};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::report::ActivationFailure;

/// The states a `PublishCoordinator` goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    WaitingForTraining,
    CheckingRemote,
    Publishing,
    Skipped,
    Done,
}

/// What to do when the registry's best rating can't be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePolicy {
    /// Take the remote best as the worst possible rating and publish.
    #[default]
    FailOpen,
    /// Don't publish.
    FailClosed,
}

/// How the publish half of an activation ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishOutcome {
    /// There was nothing to publish, the registry wasn't contacted.
    NoTraining,
    Published { local: f32, remote: f64 },
    /// The local model isn't better than the remote best, `remote` is `None` if it couldn't
    /// be queried.
    Skipped { local: f32, remote: Option<f64> },
    PublishFailed { local: f32, remote: f64 },
    /// The publish task panicked.
    Aborted,
}

/// What's left of a `PublishCoordinator` after it ran.
#[derive(Debug)]
pub struct PublishRun {
    pub outcome: PublishOutcome,
    pub transitions: Vec<PublishState>,
    pub failures: Vec<ActivationFailure>,
}

/// Waits for a training result and publishes it to the registry if it beats the registry's
/// best rating.
pub struct PublishCoordinator<R> {
    registry: R,
    policy: RemotePolicy,
    transitions: Vec<PublishState>,
    failures: Vec<ActivationFailure>,
}

impl<R: RemoteRegistry> PublishCoordinator<R> {
    /// Creates a new `PublishCoordinator`.
    ///
    /// # Arguments
    /// * `registry` - The registry to query and publish to.
    /// * `policy` - What to do when the registry can't be queried.
    pub fn new(registry: R, policy: RemotePolicy) -> Self {
        Self {
            registry,
            policy,
            transitions: Vec::with_capacity(4),
            failures: Vec::new(),
        }
    }

    /// Runs the coordinator to completion.
    ///
    /// Suspends until `handoff` resolves. No request reaches the registry unless a trained
    /// model comes through it.
    ///
    /// # Arguments
    /// * `handoff` - The receiving half of the slot the training task fills.
    pub async fn run(mut self, handoff: oneshot::Receiver<TrainingOutcome>) -> PublishRun {
        self.enter(PublishState::WaitingForTraining);

        let outcome = match handoff.await {
            Ok(TrainingOutcome::Trained(result)) => self.check_and_publish(result).await,
            Ok(TrainingOutcome::NoTrainingPerformed { available }) => {
                debug!(available = available; "no training performed, nothing to publish");
                PublishOutcome::NoTraining
            }
            Err(_) => {
                debug!("training ended without a result, nothing to publish");
                PublishOutcome::NoTraining
            }
        };

        self.enter(PublishState::Done);

        PublishRun {
            outcome,
            transitions: self.transitions,
            failures: self.failures,
        }
    }

    async fn check_and_publish(&mut self, result: TrainingResult) -> PublishOutcome {
        let local = result.error;
        if !local.is_finite() {
            warn!(error = local; "training error is not finite, skipping publish");
            self.enter(PublishState::Skipped);
            return PublishOutcome::Skipped { local, remote: None };
        }

        self.enter(PublishState::CheckingRemote);
        let remote = match self.registry.best_rating().await {
            Ok(remote) => Some(remote),
            Err(e) => {
                warn!(policy:? = self.policy; "best rating query failed: {e}");
                self.failures.push(ActivationFailure::RemoteQueryFailure(e));
                None
            }
        };

        let threshold = match (remote, self.policy) {
            (Some(remote), _) => remote,
            (None, RemotePolicy::FailOpen) => WORST_RATING,
            (None, RemotePolicy::FailClosed) => {
                self.enter(PublishState::Skipped);
                return PublishOutcome::Skipped { local, remote: None };
            }
        };

        if f64::from(local) > threshold {
            debug!(local = local, remote = threshold; "remote model is better");
            self.enter(PublishState::Skipped);
            return PublishOutcome::Skipped { local, remote };
        }

        self.enter(PublishState::Publishing);
        let blob = match result.model.to_blob() {
            Ok(blob) => blob,
            Err(e) => {
                warn!("could not serialize the trained model: {e}");
                self.failures.push(ActivationFailure::Training(e));
                return PublishOutcome::PublishFailed { local, remote: threshold };
            }
        };

        match self.registry.publish(&blob, f64::from(local)).await {
            Ok(()) => PublishOutcome::Published { local, remote: threshold },
            Err(e) => {
                warn!("publish failed: {e}");
                self.failures.push(ActivationFailure::PublishFailed(e));
                PublishOutcome::PublishFailed { local, remote: threshold }
            }
        }
    }

    fn enter(&mut self, state: PublishState) {
        debug!(state:? = state; "publish coordinator transition");
        self.transitions.push(state);
    }
}
