use serde::{Deserialize, Serialize};

use crate::{Board, EngineError, Pos};

/// What an `extend` event did to the path.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extend {
    /// The cell joined the end of the chain.
    Appended,
    /// The pointer stepped back onto the previous cell; the last cell was dropped.
    Retracted,
    /// The pointer is still on the last cell.
    Unchanged,
    /// The cell cannot join the chain (different value, not adjacent, or
    /// already selected).
    Ignored,
}

/// The in-progress chain for one gesture.
///
/// Idle until [`Selection::begin`], active until [`Selection::end`] or
/// [`Selection::cancel`]. While active the path is non-empty, duplicate-free,
/// and every consecutive pair is adjacent and equal-valued on the board it was
/// built against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    path: Vec<Pos>,
    active: bool,
}

impl Selection {
    pub fn new() -> Selection {
        Selection::default()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn path(&self) -> &[Pos] {
        &self.path
    }

    /// Start a chain on any tile.
    pub fn begin(&mut self, board: &Board, pos: Pos) -> Result<(), EngineError> {
        if self.active {
            return Err(EngineError::AlreadySelecting);
        }
        board.value_at(pos)?;
        self.path.clear();
        self.path.push(pos);
        self.active = true;
        Ok(())
    }

    /// Feed one pointer-move event.
    ///
    /// Only an idle selection or an off-board index is an error; every other
    /// unusable cell is [`Extend::Ignored`] so noisy drags never fail.
    pub fn extend(&mut self, board: &Board, pos: Pos) -> Result<Extend, EngineError> {
        if !self.active {
            return Err(EngineError::NotSelecting);
        }
        let value = board.value_at(pos)?;
        let Some(&last) = self.path.last() else {
            return Ok(Extend::Ignored);
        };

        if pos == last {
            return Ok(Extend::Unchanged);
        }

        if self.path.len() >= 2 && pos == self.path[self.path.len() - 2] {
            self.path.pop();
            return Ok(Extend::Retracted);
        }

        if value == board.value_at(last)? && pos.is_adjacent(last) && !self.path.contains(&pos) {
            self.path.push(pos);
            Ok(Extend::Appended)
        } else {
            Ok(Extend::Ignored)
        }
    }

    /// Finish the gesture. Returns the path when it is long enough to merge;
    /// either way the selection goes back to idle with an empty path.
    pub fn end(&mut self) -> Result<Option<Vec<Pos>>, EngineError> {
        if !self.active {
            return Err(EngineError::NotSelecting);
        }
        self.active = false;
        let path = std::mem::take(&mut self.path);
        Ok((path.len() >= 2).then_some(path))
    }

    /// Drop the gesture without committing anything.
    pub fn cancel(&mut self) {
        self.active = false;
        self.path.clear();
    }
}
