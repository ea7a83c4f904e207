//! Chain search over a single board.
//!
//! `adjacent_pairs` lists every two-tile chain. `best_chain` walks chains
//! depth-first from each start cell under a node budget and keeps the one
//! with the largest score delta.

use connect_core::{merged_value, Board, Pos, CELL_COUNT};

/// A chain found by the search, with what committing it would score.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub path: Vec<Pos>,
    /// Score delta: base value times length.
    pub total: u64,
    /// Tile left behind at the last cell.
    pub value: u64,
}

impl Candidate {
    fn from_path(board: &Board, path: &[Pos]) -> Candidate {
        let base = board.values()[path[0].index()] as u64;
        let total = base * path.len() as u64;
        Candidate {
            path: path.to_vec(),
            total,
            value: merged_value(total),
        }
    }

    /// Ordering key: bigger score first, then bigger merged tile.
    fn key(&self) -> (u64, u64) {
        (self.total, self.value)
    }
}

/// Every unordered pair of equal 8-adjacent tiles, each listed once with the
/// lower index first.
pub fn adjacent_pairs(board: &Board) -> Vec<(Pos, Pos)> {
    let values = board.values();
    let mut pairs = Vec::new();
    for a in Pos::all() {
        for b in a.neighbors() {
            if b.index() > a.index() && values[a.index()] == values[b.index()] {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

/// Depth-first search state shared across one start cell.
struct Walk<'a> {
    values: &'a [u32; CELL_COUNT],
    path: Vec<Pos>,
    used: [bool; CELL_COUNT],
    nodes: usize,
    limit: usize,
}

impl Walk<'_> {
    fn run(&mut self, board: &Board, best: &mut Option<Candidate>) {
        self.nodes += 1;
        if self.path.len() >= 2 {
            let candidate = Candidate::from_path(board, &self.path);
            if best.as_ref().map_or(true, |b| candidate.key() > b.key()) {
                *best = Some(candidate);
            }
        }

        let Some(&last) = self.path.last() else { return };
        let value = self.values[last.index()];
        for next in last.neighbors() {
            if self.nodes >= self.limit {
                return;
            }
            if self.used[next.index()] || self.values[next.index()] != value {
                continue;
            }
            self.used[next.index()] = true;
            self.path.push(next);
            self.run(board, best);
            self.path.pop();
            self.used[next.index()] = false;
        }
    }
}

/// Best chain reachable within `budget` search nodes, or None when the board
/// has no legal chain.
///
/// The budget is split evenly across start cells so an early start cell in a
/// large same-valued region cannot starve the rest of the board.
pub fn best_chain(board: &Board, budget: usize) -> Option<Candidate> {
    let values = board.values();
    let per_start = (budget / CELL_COUNT).max(2);
    let mut best = None;

    for start in Pos::all() {
        let value = values[start.index()];
        if !start.neighbors().any(|n| values[n.index()] == value) {
            continue;
        }
        let mut walk = Walk {
            values,
            path: vec![start],
            used: [false; CELL_COUNT],
            nodes: 0,
            limit: per_start,
        };
        walk.used[start.index()] = true;
        walk.run(board, &mut best);
    }
    best
}
