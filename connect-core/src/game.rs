use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Board, EngineError, Extend, Merge, Pos, Selection};

/// What the caller gets back when a gesture ends.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// The merge, if the chain was long enough to commit.
    pub merge: Option<Merge>,
    /// Running score after this turn.
    pub score: u64,
    /// No equal neighbours remain on the board.
    pub game_over: bool,
}

/// One play session: board, running score, the live selection and the RNG
/// that feeds refills.
///
/// A UI loop owns this and drives it with `begin` / `extend` / `end`.
#[derive(Clone, Debug)]
pub struct Game {
    board: Board,
    selection: Selection,
    score: u64,
    moves: u32,
    over: bool,
    seed: u64,
    rng: StdRng,
}

impl Game {
    /// Start a game whose deals and refills are all derived from `seed`.
    pub fn new(seed: u64) -> Game {
        let mut rng = StdRng::seed_from_u64(seed);
        let board = deal(&mut rng);
        Game {
            board,
            selection: Selection::new(),
            score: 0,
            moves: 0,
            over: false,
            seed,
            rng,
        }
    }

    /// Start from a given board instead of a fresh deal. The board is used
    /// as-is, even when it has no moves.
    pub fn with_board(board: Board, seed: u64) -> Game {
        Game {
            board,
            selection: Selection::new(),
            score: 0,
            moves: 0,
            over: !board.has_any_move(),
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// New deal, score back to zero. Any live selection is dropped.
    pub fn reset(&mut self) {
        self.board = deal(&mut self.rng);
        self.selection.cancel();
        self.score = 0;
        self.moves = 0;
        self.over = false;
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[inline]
    pub fn score(&self) -> u64 {
        self.score
    }

    /// Number of committed merges this game.
    #[inline]
    pub fn moves(&self) -> u32 {
        self.moves
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.over
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn begin(&mut self, index: usize) -> Result<(), EngineError> {
        let pos = Pos::from_index(index)?;
        self.selection.begin(&self.board, pos)
    }

    pub fn extend(&mut self, index: usize) -> Result<Extend, EngineError> {
        let pos = Pos::from_index(index)?;
        self.selection.extend(&self.board, pos)
    }

    /// Release the gesture: merge when two or more tiles are selected,
    /// otherwise discard. The selection is always cleared.
    pub fn end(&mut self) -> Result<TurnOutcome, EngineError> {
        let merge = match self.selection.end()? {
            Some(path) => self.board.commit_merge(&path, &mut self.rng),
            None => None,
        };

        if let Some(merge) = merge {
            self.score += merge.total;
            self.moves += 1;
            self.over = !self.board.has_any_move();
            if self.over {
                info!(score = self.score, moves = self.moves, max_tile = self.board.max_tile(), "game over");
            }
        }

        Ok(TurnOutcome {
            merge,
            score: self.score,
            game_over: self.over,
        })
    }

    pub fn cancel(&mut self) {
        self.selection.cancel();
    }
}

/// Deal boards until one has at least one legal chain.
fn deal(rng: &mut StdRng) -> Board {
    loop {
        let board = Board::random(rng);
        if board.has_any_move() {
            return board;
        }
        debug!("dealt a board with no moves, dealing again");
    }
}
