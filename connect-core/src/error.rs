//! Engine error type.
//!
//! Every variant is a caller contract violation. Selection moves that fail the
//! chaining rules are not errors; they come back as [`crate::Extend::Ignored`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("cell index {index} is outside the board (0..{limit})")]
    OutOfRange { index: usize, limit: usize },
    #[error("a selection is already in progress")]
    AlreadySelecting,
    #[error("no selection is in progress")]
    NotSelecting,
    #[error("tile value {value} at cell {index} is not a power of two >= 2")]
    InvalidTile { index: usize, value: u32 },
    #[error("board encoding {encoding:#x} is not a valid board")]
    InvalidEncoding { encoding: u128 },
}
