//! Move policies and the game loop that drives them through the engine.

use clap::ValueEnum;
use connect_core::{Board, EngineError, Extend, Game, Pos};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::search::{adjacent_pairs, best_chain};

/// Salt mixed into the game seed for the policy's own RNG, so policy choices
/// do not replay the board's refill sequence.
const POLICY_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Chance that a random walk keeps going after each appended tile.
const RANDOM_CONTINUE: f64 = 0.5;

#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
pub enum PolicyKind {
    /// Highest score delta found by bounded search.
    Greedy,
    /// Uniform legal pair, extended by a random walk.
    Random,
}

#[derive(Clone, Copy, Debug)]
pub struct Policy {
    pub kind: PolicyKind,
    /// Search node budget per move (greedy only).
    pub budget: usize,
}

impl Policy {
    /// Pick a chain to play, or None when the board has no legal chain.
    pub fn choose<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Vec<Pos>> {
        match self.kind {
            PolicyKind::Greedy => best_chain(board, self.budget).map(|c| c.path),
            PolicyKind::Random => random_chain(board, rng),
        }
    }
}

fn random_chain<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<Vec<Pos>> {
    let pairs = adjacent_pairs(board);
    let &(a, b) = pairs.choose(rng)?;
    let (first, second) = if rng.random_bool(0.5) { (a, b) } else { (b, a) };
    let mut path = vec![first, second];

    let values = board.values();
    let base = values[first.index()];
    while rng.random_bool(RANDOM_CONTINUE) {
        let Some(&last) = path.last() else { break };
        let options: Vec<Pos> = last
            .neighbors()
            .filter(|n| values[n.index()] == base && !path.contains(n))
            .collect();
        let Some(&next) = options.choose(rng) else { break };
        path.push(next);
    }
    Some(path)
}

/// Summary of one finished autoplay game.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GameRecord {
    pub seed: u64,
    pub score: u64,
    pub max_tile: u32,
    pub merges: u32,
}

/// Play one seeded game to the end, or until `max_moves` merges.
///
/// Chains go through `begin` / `extend` / `end` exactly as a pointer gesture
/// would, so the engine validates every step.
pub fn play_game(seed: u64, policy: &Policy, max_moves: u32) -> Result<GameRecord, EngineError> {
    let mut game = Game::new(seed);
    let mut rng = StdRng::seed_from_u64(seed ^ POLICY_SALT);

    while !game.is_over() && game.moves() < max_moves {
        let Some(path) = policy.choose(game.board(), &mut rng) else {
            break;
        };

        game.begin(path[0].index())?;
        for pos in &path[1..] {
            let step = game.extend(pos.index())?;
            if step != Extend::Appended {
                warn!(seed, index = pos.index(), ?step, "engine rejected a chain step");
            }
        }
        let outcome = game.end()?;
        if outcome.merge.is_none() {
            // Nothing committed; the same board would yield the same chain.
            warn!(seed, "chain did not commit, stopping game");
            break;
        }
    }

    if !game.is_over() {
        debug!(seed, moves = game.moves(), "stopped at move cap");
    }

    Ok(GameRecord {
        seed,
        score: game.score(),
        max_tile: game.board().max_tile(),
        merges: game.moves(),
    })
}
