use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// The scaling range of the board cells is empty (`max == min`).
    DegenerateRange {
        min: f32,
        max: f32,
    },
    /// The shape of some data doesn't match the shape declared by the model.
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidPlayer {
        player: usize,
        players: usize,
    },
    InvalidColumn {
        column: usize,
        columns: usize,
    },
    EmptyBatch,
    Initialization(String),
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Serde(serde_json::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::DegenerateRange { min, max } => {
                write!(f, "degenerate scaling range: min {min} equals max {max}")
            }
            MlErr::DimensionMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "dimension mismatch on {what}: got {got}, expected {expected}"
            ),
            MlErr::InvalidPlayer { player, players } => write!(
                f,
                "player {player} is out of range, there are {players} players (1-based)"
            ),
            MlErr::InvalidColumn { column, columns } => write!(
                f,
                "column {column} is out of range, there are {columns} columns"
            ),
            MlErr::EmptyBatch => write!(f, "tried to train over an empty batch"),
            MlErr::Initialization(e) => write!(f, "failed to initialize parameters: {e}"),
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "there's a size mismatch on {what}, got {got} and expected {expected}"
            ),
            MlErr::Serde(e) => write!(f, "model (de)serialization failed: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Serde(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}
