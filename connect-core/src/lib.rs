//! Material Connect game engine.
//!
//! Players drag across a 5×5 grid of power-of-two tiles, chaining equal
//! neighbours (diagonals included). Releasing a chain of two or more tiles
//! merges it into the last selected cell, the board falls column by column,
//! and fresh tiles drop in from the top.
//!
//! # Grid Layout
//!
//! ```text
//! Cell indices (row-major, index = y * 5 + x):
//!    0  1  2  3  4
//!    5  6  7  8  9
//!   10 11 12 13 14
//!   15 16 17 18 19
//!   20 21 22 23 24
//! ```
//!
//! Row 0 is the top of the board; gravity pulls toward row 4.
//!
//! # Merge Rule
//!
//! ```text
//! total  = first tile value × chain length       (score delta)
//! merged = smallest power of two >= total        (new tile at chain end)
//!
//! 2 × 3 =  6 -> 8
//! 4 × 4 = 16 -> 16
//! ```
//!
//! # Board Encoding (128-bit)
//!
//! ```text
//! Bits 5i..5i+5: exponent of the tile at cell i (value = 2^exponent)
//! Bits 125-127:  unused (zero)
//! ```
//!
//! The engine is synchronous and single-owner: a UI loop holds a [`Game`] and
//! feeds it `begin` / `extend` / `end` events in order.

mod board;
mod error;
mod game;
mod selection;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use board::{merged_value, Board, Merge, Pos, CELL_COUNT, GRID_SIZE, SPAWN_VALUES};
pub use error::EngineError;
pub use game::{Game, TurnOutcome};
pub use selection::{Extend, Selection};
