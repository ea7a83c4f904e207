//! SQLite-backed best scores.
//!
//! One row per player. A stored score only ever goes up: submitting a lower
//! score, or syncing a lower remote score, leaves the row alone.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS best_scores (
    player TEXT PRIMARY KEY,
    score  INTEGER NOT NULL
)";

pub struct ScoreStore {
    conn: Mutex<Connection>,
}

impl ScoreStore {
    /// Open (or create) the score database at `path`.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open(path)?)
    }

    /// Throwaway store, for tests and `--db :memory:`.
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute(SCHEMA, [])?;
        Ok(ScoreStore { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored best for `player`, 0 if none.
    pub fn best(&self, player: &str) -> Result<u64, rusqlite::Error> {
        let score: Option<i64> = self
            .conn()
            .query_row(
                "SELECT score FROM best_scores WHERE player = ?1",
                [player],
                |row| row.get(0),
            )
            .optional()?;
        Ok(score.map_or(0, |s| s.max(0) as u64))
    }

    /// Record `score` if it beats the stored best. Returns true on a new record.
    pub fn submit(&self, player: &str, score: u64) -> Result<bool, rusqlite::Error> {
        if score == 0 {
            return Ok(false);
        }
        let changed = self.conn().execute(
            "INSERT INTO best_scores (player, score) VALUES (?1, ?2)
             ON CONFLICT(player) DO UPDATE SET score = excluded.score
             WHERE excluded.score > best_scores.score",
            params![player, score.min(i64::MAX as u64) as i64],
        )?;
        Ok(changed > 0)
    }

    /// Fold in a best score reported from elsewhere (another device, a cloud
    /// copy) and return the resulting best.
    pub fn merge_remote(&self, player: &str, remote: u64) -> Result<u64, rusqlite::Error> {
        self.submit(player, remote)?;
        self.best(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_defaults_to_zero() {
        let store = ScoreStore::in_memory().unwrap();
        assert_eq!(store.best("local").unwrap(), 0);
    }

    #[test]
    fn test_submit_only_raises() {
        let store = ScoreStore::in_memory().unwrap();
        assert!(store.submit("local", 120).unwrap());
        assert!(!store.submit("local", 80).unwrap());
        assert!(!store.submit("local", 120).unwrap());
        assert_eq!(store.best("local").unwrap(), 120);
        assert!(store.submit("local", 121).unwrap());
        assert_eq!(store.best("local").unwrap(), 121);
    }

    #[test]
    fn test_zero_is_never_a_record() {
        let store = ScoreStore::in_memory().unwrap();
        assert!(!store.submit("local", 0).unwrap());
        assert_eq!(store.best("local").unwrap(), 0);
    }

    #[test]
    fn test_players_are_separate() {
        let store = ScoreStore::in_memory().unwrap();
        store.submit("a", 50).unwrap();
        store.submit("b", 10).unwrap();
        assert_eq!(store.best("a").unwrap(), 50);
        assert_eq!(store.best("b").unwrap(), 10);
    }

    #[test]
    fn test_merge_remote_takes_max() {
        let store = ScoreStore::in_memory().unwrap();
        store.submit("local", 300).unwrap();
        assert_eq!(store.merge_remote("local", 200).unwrap(), 300);
        assert_eq!(store.merge_remote("local", 450).unwrap(), 450);
    }
}
