use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::EngineError;

/// Width and height of the square grid.
pub const GRID_SIZE: usize = 5;
/// Number of cells on the board.
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;
/// Values a freshly generated tile can take, each equally likely.
pub const SPAWN_VALUES: [u32; 3] = [2, 4, 8];

/// Placeholder for a cell emptied by a merge, before gravity runs.
const EMPTY: u32 = 0;
/// Largest tile the board stores; merges past it saturate here.
const MAX_TILE: u32 = 1 << 31;

/// Neighbour offsets (dx, dy) that visit every adjacent pair exactly once:
/// right, down, down-right, down-left.
const FORWARD_NEIGHBORS: [(i8, i8); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];

/// Bits per cell in the packed encoding.
const CELL_BITS: u32 = 5;
/// Mask for a single packed cell.
const CELL_MASK: u128 = 0b11111;

/// Position on the 5x5 board (0-24).
///
/// Layout:
/// ```text
///    0  1  2  3  4
///    5  6  7  8  9
///   10 11 12 13 14
///   15 16 17 18 19
///   20 21 22 23 24
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pos(pub u8);

impl Pos {
    /// Create a position from column and row (0-4 each).
    #[inline]
    pub fn from_xy(x: u8, y: u8) -> Pos {
        debug_assert!((x as usize) < GRID_SIZE && (y as usize) < GRID_SIZE);
        Pos(y * GRID_SIZE as u8 + x)
    }

    /// Convert a caller-supplied cell index, rejecting anything off the board.
    pub fn from_index(index: usize) -> Result<Pos, EngineError> {
        if index < CELL_COUNT {
            Ok(Pos(index as u8))
        } else {
            Err(EngineError::OutOfRange {
                index,
                limit: CELL_COUNT,
            })
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Column (0-4).
    #[inline]
    pub fn x(self) -> u8 {
        self.0 % GRID_SIZE as u8
    }

    /// Row (0-4), 0 at the top.
    #[inline]
    pub fn y(self) -> u8 {
        self.0 / GRID_SIZE as u8
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.index() < CELL_COUNT
    }

    /// Iterate over all 25 positions in row-major order.
    pub fn all() -> impl Iterator<Item = Pos> {
        (0..CELL_COUNT as u8).map(Pos)
    }

    /// Chebyshev distance of one: orthogonal or diagonal neighbours.
    /// A cell is not adjacent to itself.
    #[inline]
    pub fn is_adjacent(self, other: Pos) -> bool {
        self != other && self.x().abs_diff(other.x()) <= 1 && self.y().abs_diff(other.y()) <= 1
    }

    /// The up to eight cells surrounding this one.
    pub fn neighbors(self) -> impl Iterator<Item = Pos> {
        let (x, y) = (self.x() as i8, self.y() as i8);
        (-1..=1i8)
            .flat_map(move |dy| (-1..=1i8).map(move |dx| (x + dx, y + dy)))
            .filter(move |&(nx, ny)| (nx, ny) != (x, y))
            .filter_map(|(nx, ny)| Pos::offset_in_bounds(nx, ny))
    }

    fn offset_in_bounds(x: i8, y: i8) -> Option<Pos> {
        let size = GRID_SIZE as i8;
        if (0..size).contains(&x) && (0..size).contains(&y) {
            Some(Pos::from_xy(x as u8, y as u8))
        } else {
            None
        }
    }
}

/// Result of collapsing a chain into one tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Merge {
    /// Value shared by every tile in the chain.
    pub base: u32,
    /// Number of tiles consumed.
    pub length: usize,
    /// `base * length`; this is the score delta.
    pub total: u64,
    /// Tile written at `at`.
    pub value: u32,
    /// Last cell of the chain, where the merged tile lands.
    pub at: Pos,
}

/// Smallest power of two that is at least `total`, found by doubling 2.
///
/// Exact powers of two map to themselves, and anything at or below 2 maps to 2.
pub fn merged_value(total: u64) -> u64 {
    let mut value = 2u64;
    while value < total {
        value *= 2;
    }
    value
}

/// Uniform draw from [`SPAWN_VALUES`].
fn spawn_tile<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    SPAWN_VALUES[rng.random_range(0..SPAWN_VALUES.len())]
}

fn is_tile(value: u32) -> bool {
    value >= 2 && value.is_power_of_two()
}

/// The 5x5 grid of tile values.
///
/// Between operations every cell holds a power of two >= 2. Cells only go
/// empty inside [`Board::commit_merge`], which refills them before returning.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Board {
    cells: [u32; CELL_COUNT],
}

impl Board {
    /// Deal a fresh board: every cell drawn uniformly from {2, 4, 8}.
    ///
    /// The deal is not checked for playability; see [`crate::Game::new`].
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Board {
        let mut cells = [EMPTY; CELL_COUNT];
        for cell in cells.iter_mut() {
            *cell = spawn_tile(rng);
        }
        Board { cells }
    }

    /// Build a board from explicit row-major values.
    pub fn from_values(values: [u32; CELL_COUNT]) -> Result<Board, EngineError> {
        if let Some((index, &value)) = values.iter().enumerate().find(|&(_, &v)| !is_tile(v)) {
            return Err(EngineError::InvalidTile { index, value });
        }
        Ok(Board { cells: values })
    }

    #[inline]
    pub fn values(&self) -> &[u32; CELL_COUNT] {
        &self.cells
    }

    /// Rows from top to bottom, for rendering.
    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        self.cells.chunks(GRID_SIZE)
    }

    /// Tile value at `pos`.
    pub fn value_at(&self, pos: Pos) -> Result<u32, EngineError> {
        self.cells
            .get(pos.index())
            .copied()
            .ok_or(EngineError::OutOfRange {
                index: pos.index(),
                limit: CELL_COUNT,
            })
    }

    pub fn max_tile(&self) -> u32 {
        self.cells.iter().copied().max().unwrap_or(EMPTY)
    }

    // ========== Merge & Gravity ==========

    /// Collapse a chain into its last cell, then drop and refill the columns.
    ///
    /// Does NOT validate: `path` must be a legal chain (distinct, adjacent,
    /// equal-valued), which is what [`crate::Selection`] guarantees. Paths
    /// shorter than two cells leave the board untouched and return `None`.
    pub fn commit_merge<R: Rng + ?Sized>(&mut self, path: &[Pos], rng: &mut R) -> Option<Merge> {
        if path.len() < 2 {
            return None;
        }
        let (&last, rest) = path.split_last()?;

        let base = self.cells[path[0].index()];
        let total = u64::from(base) * path.len() as u64;
        let value = merged_value(total).min(u64::from(MAX_TILE)) as u32;

        for pos in rest {
            self.cells[pos.index()] = EMPTY;
        }
        self.cells[last.index()] = value;
        self.apply_gravity_and_refill(rng);

        debug!(base, length = path.len(), total, value, at = last.0, "chain merged");
        Some(Merge {
            base,
            length: path.len(),
            total,
            value,
            at: last,
        })
    }

    /// Compact each column toward the bottom, keeping vertical order, and pad
    /// the top with new tiles. One pass per column; nothing cascades.
    pub fn apply_gravity_and_refill<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for x in 0..GRID_SIZE {
            let mut column = [EMPTY; GRID_SIZE];
            let mut fill = GRID_SIZE;
            for y in (0..GRID_SIZE).rev() {
                let value = self.cells[y * GRID_SIZE + x];
                if value != EMPTY {
                    fill -= 1;
                    column[fill] = value;
                }
            }
            for slot in column[..fill].iter_mut() {
                *slot = spawn_tile(rng);
            }
            for (y, value) in column.into_iter().enumerate() {
                self.cells[y * GRID_SIZE + x] = value;
            }
        }
    }

    /// True while some pair of 8-adjacent cells holds equal values.
    pub fn has_any_move(&self) -> bool {
        let size = GRID_SIZE as i8;
        for pos in Pos::all() {
            let value = self.cells[pos.index()];
            for (dx, dy) in FORWARD_NEIGHBORS {
                let (nx, ny) = (pos.x() as i8 + dx, pos.y() as i8 + dy);
                if nx < 0 || nx >= size || ny >= size {
                    continue;
                }
                if self.cells[ny as usize * GRID_SIZE + nx as usize] == value {
                    return true;
                }
            }
        }
        false
    }

    // ========== Encoding ==========

    /// Pack the board into a u128 (5 bits of exponent per cell).
    pub fn encode(&self) -> u128 {
        self.cells
            .iter()
            .enumerate()
            .fold(0u128, |acc, (i, &value)| {
                acc | (u128::from(value.trailing_zeros()) << (i as u32 * CELL_BITS))
            })
    }

    /// Inverse of [`Board::encode`].
    pub fn decode(encoding: u128) -> Result<Board, EngineError> {
        let used_bits = CELL_COUNT as u32 * CELL_BITS;
        if encoding >> used_bits != 0 {
            return Err(EngineError::InvalidEncoding { encoding });
        }
        let mut cells = [EMPTY; CELL_COUNT];
        for (i, cell) in cells.iter_mut().enumerate() {
            let exponent = (encoding >> (i as u32 * CELL_BITS)) & CELL_MASK;
            if exponent == 0 {
                return Err(EngineError::InvalidEncoding { encoding });
            }
            *cell = 1u32 << exponent;
        }
        Ok(Board { cells })
    }
}
