use log::{debug, info, warn};
use machine_learning::{
    MlErr,
    arch::Sequential,
    dataset::TrainingBatch,
    encoding::{self, Example},
    training::{Trainer, TrainingOutcome},
};
use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::oneshot;

use crate::{
    config::BoardConfig,
    report::{ActivationFailure, TrainingStatus},
    source::ExampleSource,
    store::ModelStore,
};

/// The training half of an activation: gathers a batch, runs a single training step over
/// the stored model, stores it back and hands the result over to the publisher.
///
/// The whole run is synchronous and CPU bound, it's meant to be run on a blocking thread.
pub struct TrainingTask<S, M> {
    source: S,
    store: M,
    trainer: Box<dyn Trainer>,
    board: BoardConfig,
    batch_size: usize,
    seed: Option<u64>,
}

/// What's left of a `TrainingTask` after it ran.
#[derive(Debug)]
pub struct TrainingRun {
    pub status: TrainingStatus,
    pub failures: Vec<ActivationFailure>,
}

impl<S: ExampleSource, M: ModelStore> TrainingTask<S, M> {
    /// Creates a new `TrainingTask`.
    ///
    /// # Arguments
    /// * `source` - Where the examples are taken from.
    /// * `store` - Where the model is loaded from and saved to.
    /// * `trainer` - Runs the training step.
    /// * `board` - The board the examples are played on.
    /// * `batch_size` - The amount of examples a training step needs.
    pub fn new(
        source: S,
        store: M,
        trainer: Box<dyn Trainer>,
        board: BoardConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            store,
            trainer,
            board,
            batch_size,
            seed: None,
        }
    }

    /// Seeds the initialization of a fresh model.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Runs the task to completion.
    ///
    /// The outcome is sent through `handoff` only once the model has been stored. If the
    /// training can't run at all, `handoff` is dropped without sending anything.
    ///
    /// # Arguments
    /// * `handoff` - The sending half of the slot the publisher waits on.
    ///
    /// # Returns
    /// How the training ended along with every failure recovered from.
    pub fn run(mut self, handoff: oneshot::Sender<TrainingOutcome>) -> TrainingRun {
        let mut failures = Vec::new();

        let status = match self.train(&mut failures) {
            Ok((outcome, status)) => {
                if handoff.send(outcome).is_err() {
                    debug!("nobody is waiting for the training outcome");
                }
                status
            }
            Err(failure) => {
                warn!("training aborted: {failure}");
                failures.push(failure);
                TrainingStatus::Failed
            }
        };

        TrainingRun { status, failures }
    }

    fn train(
        &mut self,
        failures: &mut Vec<ActivationFailure>,
    ) -> Result<(TrainingOutcome, TrainingStatus), ActivationFailure> {
        let examples = self.collect()?;

        if examples.len() < self.batch_size {
            let available = examples.len();
            info!(available = available, needed = self.batch_size; "not enough examples, skipping training");
            return Ok((
                TrainingOutcome::NoTrainingPerformed { available },
                TrainingStatus::NoTrainingPerformed { available },
            ));
        }

        let model = self.load_model(failures)?;
        let batch = self.encode(&examples, &model)?;
        let result = self
            .trainer
            .train_one_step(model, &batch)
            .map_err(ActivationFailure::Training)?;

        if !result.error.is_finite() || !result.model.is_finite() {
            warn!(error = result.error; "training step diverged, keeping the stored model");
            return Err(ActivationFailure::NonFiniteModel { stored: false });
        }

        let saved = match self.store.save(&result.model) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not store the trained model: {e}");
                failures.push(ActivationFailure::ModelSave(e));
                false
            }
        };

        info!(error = result.error, saved = saved; "training step done");
        let status = TrainingStatus::Trained {
            error: result.error,
            saved,
        };

        Ok((TrainingOutcome::Trained(result), status))
    }

    /// Takes up to `batch_size` examples out of the source.
    fn collect(&mut self) -> Result<Vec<Example>, ActivationFailure> {
        let mut examples = Vec::with_capacity(self.batch_size);

        while examples.len() < self.batch_size {
            if !self.source.has_more().map_err(ActivationFailure::Source)? {
                break;
            }

            match self.source.take_one().map_err(ActivationFailure::Source)? {
                Some(example) => examples.push(example),
                None => break,
            }
        }

        Ok(examples)
    }

    /// Loads the stored model, falling back to a fresh one if there's none, it holds
    /// non-finite parameters or it can't be used with the current board.
    fn load_model(
        &self,
        failures: &mut Vec<ActivationFailure>,
    ) -> Result<Sequential, ActivationFailure> {
        let expected = (self.board.input_width(), self.board.output_width());

        match self.store.load() {
            Ok(Some(model)) => {
                let stored = (model.input_width(), model.output_width());
                if stored != expected {
                    warn!("stored model is {stored:?}, expected {expected:?}, starting over");
                    failures.push(ActivationFailure::DimensionMismatch { stored, expected });
                } else if !model.is_finite() {
                    warn!("stored model has non-finite parameters, starting over");
                    failures.push(ActivationFailure::NonFiniteModel { stored: true });
                } else {
                    return Ok(model);
                }
            }
            Ok(None) => debug!("no stored model, starting over"),
            Err(e) => {
                warn!("stored model is unreadable, starting over: {e}");
                failures.push(ActivationFailure::ModelLoad(e));
            }
        }

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Sequential::sigmoid_perceptron(&self.board.widths(), rng).map_err(ActivationFailure::Training)
    }

    fn encode(
        &self,
        examples: &[Example],
        model: &Sequential,
    ) -> Result<TrainingBatch, ActivationFailure> {
        let min = self.board.min_cell as f32;
        let max = self.board.max_cell as f32;

        let players = self.board.players;

        let samples = examples
            .iter()
            .map(|e| {
                if e.board.len() != self.board.rows {
                    return Err(MlErr::DimensionMismatch {
                        what: "board rows",
                        got: e.board.len(),
                        expected: self.board.rows,
                    });
                }
                encoding::encode(e, min, max, players, model.input_width(), model.output_width())
            })
            .collect::<machine_learning::Result<Vec<_>>>()
            .map_err(|e| match e {
                MlErr::DegenerateRange { min, max } => ActivationFailure::DegenerateRange { min, max },
                other => ActivationFailure::Encoding(other),
            })?;

        TrainingBatch::new(&samples).map_err(ActivationFailure::Training)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use machine_learning::training::{OptimizerSpec, TrainerBuilder, TrainingResult};
    use parking_lot::Mutex;

    use super::*;
    use crate::{Result, WorkerErr, source::MemorySource};

    /// A `ModelStore` kept in memory, shared with the test through `model`.
    #[derive(Clone, Default)]
    struct MemoryStore {
        model: Arc<Mutex<Option<Sequential>>>,
        unreadable: bool,
    }

    impl ModelStore for MemoryStore {
        fn load(&self) -> Result<Option<Sequential>> {
            if self.unreadable {
                return Err(WorkerErr::Config("unreadable".into()));
            }
            Ok(self.model.lock().clone())
        }

        fn save(&self, model: &Sequential) -> Result<()> {
            *self.model.lock() = Some(model.clone());
            Ok(())
        }
    }

    fn examples(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| Example {
                board: (0..7).map(|r| (0..4).map(|c| ((r + c + i) % 5) as i32).collect()).collect(),
                player: i % 4 + 1,
                column: i % 4,
            })
            .collect()
    }

    fn task(n: usize, store: MemoryStore, board: BoardConfig) -> TrainingTask<MemorySource, MemoryStore> {
        let trainer = TrainerBuilder::new().build(OptimizerSpec::Rprop);
        TrainingTask::new(MemorySource::new(examples(n)), store, trainer, board, 10).with_seed(Some(9))
    }

    #[test]
    fn short_source_performs_no_training() {
        let store = MemoryStore::default();
        let (tx, mut rx) = oneshot::channel();

        let run = task(9, store.clone(), BoardConfig::default()).run(tx);

        assert_eq!(run.status, TrainingStatus::NoTrainingPerformed { available: 9 });
        assert!(matches!(
            rx.try_recv(),
            Ok(TrainingOutcome::NoTrainingPerformed { available: 9 })
        ));
        assert!(store.model.lock().is_none());
    }

    #[test]
    fn full_batch_is_trained_and_stored_before_handoff() {
        let store = MemoryStore::default();
        let (tx, mut rx) = oneshot::channel();

        let run = task(12, store.clone(), BoardConfig::default()).run(tx);

        let TrainingStatus::Trained { error, saved } = run.status else {
            panic!("expected a trained status, got {:?}", run.status);
        };
        assert!(saved);
        assert!(run.failures.is_empty());

        let Ok(TrainingOutcome::Trained(result)) = rx.try_recv() else {
            panic!("expected a training result");
        };
        assert_eq!(result.error, error);

        let stored = store.model.lock().clone().unwrap();
        assert_eq!(stored.params(), result.model.params());
    }

    #[test]
    fn stored_model_is_trained_further() {
        let board = BoardConfig::default();
        let initial = Sequential::sigmoid_perceptron(&board.widths(), StdRng::seed_from_u64(1)).unwrap();
        let store = MemoryStore {
            model: Arc::new(Mutex::new(Some(initial.clone()))),
            unreadable: false,
        };
        let (tx, _rx) = oneshot::channel();

        let run = task(10, store.clone(), board).run(tx);

        assert!(run.failures.is_empty());
        let stored = store.model.lock().clone().unwrap();
        assert_eq!(stored.size(), initial.size());
        assert_ne!(stored.params(), initial.params());
    }

    #[test]
    fn mismatched_model_is_replaced() {
        let wrong = Sequential::sigmoid_perceptron(&[10, 5, 3], StdRng::seed_from_u64(1)).unwrap();
        let store = MemoryStore {
            model: Arc::new(Mutex::new(Some(wrong))),
            unreadable: false,
        };
        let (tx, _rx) = oneshot::channel();

        let run = task(10, store.clone(), BoardConfig::default()).run(tx);

        assert!(matches!(run.status, TrainingStatus::Trained { .. }));
        assert!(matches!(
            run.failures[..],
            [ActivationFailure::DimensionMismatch {
                stored: (10, 3),
                expected: (32, 4)
            }]
        ));
        assert_eq!(store.model.lock().as_ref().unwrap().input_width(), 32);
    }

    #[test]
    fn unreadable_model_is_replaced() {
        let store = MemoryStore {
            unreadable: true,
            ..Default::default()
        };
        let (tx, _rx) = oneshot::channel();

        let run = task(10, store, BoardConfig::default()).run(tx);

        assert!(matches!(run.status, TrainingStatus::Trained { .. }));
        assert!(matches!(run.failures[..], [ActivationFailure::ModelLoad(_)]));
    }

    /// A `Trainer` whose step always blows up into NaN.
    struct DivergingTrainer;

    impl Trainer for DivergingTrainer {
        fn train_one_step(
            &mut self,
            mut model: Sequential,
            _batch: &TrainingBatch,
        ) -> machine_learning::Result<TrainingResult> {
            model.params_mut().fill(f32::NAN);
            Ok(TrainingResult {
                model,
                error: f32::NAN,
            })
        }
    }

    fn stored(model: Sequential) -> MemoryStore {
        MemoryStore {
            model: Arc::new(Mutex::new(Some(model))),
            unreadable: false,
        }
    }

    #[test]
    fn saturated_model_keeps_training_finite() {
        let board = BoardConfig::default();
        let mut saturated = Sequential::sigmoid_perceptron(&board.widths(), StdRng::seed_from_u64(1)).unwrap();
        saturated.params_mut().fill(-100.);
        let store = stored(saturated);

        for _ in 0..2 {
            let (tx, _rx) = oneshot::channel();
            let run = task(10, store.clone(), board.clone()).run(tx);

            let TrainingStatus::Trained { error, saved } = run.status else {
                panic!("expected a trained status, got {:?}", run.status);
            };
            assert!(error.is_finite());
            assert!(saved);
            assert!(store.model.lock().as_ref().unwrap().is_finite());
        }
    }

    #[test]
    fn non_finite_stored_model_is_replaced() {
        let board = BoardConfig::default();
        let mut poisoned = Sequential::sigmoid_perceptron(&board.widths(), StdRng::seed_from_u64(1)).unwrap();
        poisoned.params_mut().fill(f32::NAN);
        let store = stored(poisoned);
        let (tx, mut rx) = oneshot::channel();

        let run = task(10, store.clone(), board).run(tx);

        assert!(matches!(run.status, TrainingStatus::Trained { saved: true, .. }));
        assert!(matches!(
            run.failures[..],
            [ActivationFailure::NonFiniteModel { stored: true }]
        ));
        assert!(matches!(rx.try_recv(), Ok(TrainingOutcome::Trained(_))));
        assert!(store.model.lock().as_ref().unwrap().is_finite());
    }

    #[test]
    fn diverged_step_is_neither_stored_nor_handed_off() {
        let board = BoardConfig::default();
        let initial = Sequential::sigmoid_perceptron(&board.widths(), StdRng::seed_from_u64(1)).unwrap();
        let store = stored(initial.clone());
        let (tx, mut rx) = oneshot::channel();

        let task = TrainingTask::new(
            MemorySource::new(examples(10)),
            store.clone(),
            Box::new(DivergingTrainer),
            board,
            10,
        );
        let run = task.run(tx);

        assert_eq!(run.status, TrainingStatus::Failed);
        assert!(matches!(
            run.failures[..],
            [ActivationFailure::NonFiniteModel { stored: false }]
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(store.model.lock().as_ref().unwrap().params(), initial.params());
    }

    #[test]
    fn board_with_extra_rows_is_rejected() {
        let mut examples = examples(10);
        examples[3].board.push(vec![0; 4]);
        let store = MemoryStore::default();
        let (tx, mut rx) = oneshot::channel();

        let trainer = TrainerBuilder::new().build(OptimizerSpec::Rprop);
        let task = TrainingTask::new(
            MemorySource::new(examples),
            store.clone(),
            trainer,
            BoardConfig::default(),
            10,
        );
        let run = task.run(tx);

        assert_eq!(run.status, TrainingStatus::Failed);
        assert!(matches!(
            run.failures[..],
            [ActivationFailure::Encoding(MlErr::DimensionMismatch {
                what: "board rows",
                got: 8,
                expected: 7
            })]
        ));
        assert!(rx.try_recv().is_err());
        assert!(store.model.lock().is_none());
    }

    #[test]
    fn degenerate_range_aborts_without_handoff() {
        let board = BoardConfig {
            min_cell: 2,
            max_cell: 2,
            ..Default::default()
        };
        let store = MemoryStore::default();
        let (tx, mut rx) = oneshot::channel();

        let run = task(10, store.clone(), board).run(tx);

        assert_eq!(run.status, TrainingStatus::Failed);
        assert!(matches!(
            run.failures[..],
            [ActivationFailure::DegenerateRange { .. }]
        ));
        assert!(rx.try_recv().is_err());
        assert!(store.model.lock().is_none());
    }
}
