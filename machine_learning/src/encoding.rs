use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// A recorded move: the board before the move, who moved and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// The board cells, row by row.
    pub board: Vec<Vec<i32>>,
    /// The 1-based identifier of the player who moved.
    pub player: usize,
    /// The 0-based column the player chose.
    pub column: usize,
}

impl Example {
    /// Returns the total amount of cells on the board.
    pub fn cells(&self) -> usize {
        self.board.iter().map(Vec::len).sum()
    }
}

/// A fixed width input/output pair ready to be fed to a model.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSample {
    pub input: Vec<f32>,
    pub output: Vec<f32>,
}

/// Encodes an `Example` into an `EncodedSample`.
///
/// The input vector holds every board cell scaled into `[0, 1]` followed by a one-hot block
/// of length `players` marking the player who moved. The board must be rectangular and hold
/// exactly `input_width - players` cells. The output vector is a one-hot over `output_width`
/// columns.
///
/// # Arguments
/// * `example` - The example to encode.
/// * `min` - The smallest possible cell value.
/// * `max` - The biggest possible cell value.
/// * `players` - The amount of players in the game.
/// * `input_width` - The model's input count.
/// * `output_width` - The model's output count.
///
/// # Returns
/// The encoded sample or an error if the example doesn't fit the given widths.
pub fn encode(
    example: &Example,
    min: f32,
    max: f32,
    players: usize,
    input_width: usize,
    output_width: usize,
) -> Result<EncodedSample> {
    let range = max - min;
    if range == 0. {
        return Err(MlErr::DegenerateRange { min, max });
    }

    let board_cells = input_width
        .checked_sub(players)
        .ok_or(MlErr::DimensionMismatch {
            what: "player block",
            got: players,
            expected: input_width,
        })?;

    let row_len = example.board.first().map_or(0, Vec::len);
    if let Some(row) = example.board.iter().find(|row| row.len() != row_len) {
        return Err(MlErr::DimensionMismatch {
            what: "board row",
            got: row.len(),
            expected: row_len,
        });
    }

    let cells = example.cells();
    if cells != board_cells {
        return Err(MlErr::DimensionMismatch {
            what: "board cells",
            got: cells,
            expected: board_cells,
        });
    }

    if example.player == 0 || example.player > players {
        return Err(MlErr::InvalidPlayer {
            player: example.player,
            players,
        });
    }

    if example.column >= output_width {
        return Err(MlErr::InvalidColumn {
            column: example.column,
            columns: output_width,
        });
    }

    let mut input = Vec::with_capacity(input_width);
    input.extend(
        example
            .board
            .iter()
            .flatten()
            .map(|&cell| (cell as f32 - min) / range),
    );
    input.extend((1..=players).map(|p| one_hot(p == example.player)));

    let output = (0..output_width)
        .map(|c| one_hot(c == example.column))
        .collect();

    Ok(EncodedSample { input, output })
}

fn one_hot(hot: bool) -> f32 {
    if hot { 1. } else { 0. }
}
