use machine_learning::{
    arch::Sequential,
    dataset::TrainingBatch,
    encoding::{self, Example},
    training::{OptimizerSpec, TrainerBuilder},
};
use rand::{SeedableRng, rngs::StdRng};

const COLS: usize = 4;
const ROWS: usize = 7;
const PLAYERS: usize = 4;
const INPUTS: usize = COLS * ROWS + PLAYERS;
const HIDDEN: usize = COLS * ROWS / 2;

/// Every player always answers with the column matching its own id.
fn examples() -> Vec<Example> {
    (0..12)
        .map(|i| {
            let player = i % PLAYERS + 1;
            let board = (0..ROWS)
                .map(|r| (0..COLS).map(|c| ((r + c + i) % 5) as i32).collect())
                .collect();

            Example {
                board,
                player,
                column: player - 1,
            }
        })
        .collect()
}

fn batch() -> TrainingBatch {
    let samples: Vec<_> = examples()
        .iter()
        .map(|e| encoding::encode(e, 0., 4., PLAYERS, INPUTS, COLS).unwrap())
        .collect();

    TrainingBatch::new(&samples).unwrap()
}

#[test]
fn rprop_learns_the_player_column_mapping() {
    let batch = batch();
    let mut model =
        Sequential::sigmoid_perceptron(&[INPUTS, HIDDEN, COLS], StdRng::seed_from_u64(17)).unwrap();
    let mut trainer = TrainerBuilder::new().build(OptimizerSpec::Rprop);

    let mut errors = Vec::new();
    for _ in 0..100 {
        let result = trainer.train_one_step(model, &batch).unwrap();
        errors.push(result.error);
        model = result.model;
    }

    let first = errors[0];
    let last = errors[errors.len() - 1];
    assert!(last < first / 2., "error went from {first} to {last}");
}

#[test]
fn trained_model_survives_a_blob_roundtrip() {
    let batch = batch();
    let model =
        Sequential::sigmoid_perceptron(&[INPUTS, HIDDEN, COLS], StdRng::seed_from_u64(2)).unwrap();
    let mut trainer = TrainerBuilder::new().build(OptimizerSpec::GradientDescent { learning_rate: 0.5 });

    let result = trainer.train_one_step(model, &batch).unwrap();
    let restored = Sequential::from_blob(&result.model.to_blob().unwrap()).unwrap();

    assert_eq!(restored.input_width(), INPUTS);
    assert_eq!(restored.output_width(), COLS);
    assert_eq!(restored.params(), result.model.params());
}
