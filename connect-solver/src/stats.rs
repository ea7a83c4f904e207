//! Autoplay statistics tracking.

use std::time::Instant;

use tracing::info;

use crate::policy::GameRecord;

/// Running totals over every game played or loaded from the results file.
#[derive(Debug, Default)]
pub struct AutoplayStats {
    pub games: u64,
    pub total_score: u64,
    pub best_score: u64,
    /// Seed of the highest-scoring game
    pub best_seed: Option<u64>,
    pub max_tile: u32,
    pub total_merges: u64,
    /// Games whose largest tile reached 2048
    pub reached_2048: u64,

    /// Games played in this run (excludes loaded records), for rate calculation
    played: u64,
    start_time: Option<Instant>,
    last_log_time: Option<Instant>,
    last_log_played: u64,
}

impl AutoplayStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            last_log_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Fold in a record from a previous run.
    pub fn record_loaded(&mut self, record: &GameRecord) {
        self.games += 1;
        self.total_score += record.score;
        self.total_merges += record.merges as u64;
        self.max_tile = self.max_tile.max(record.max_tile);
        if record.max_tile >= 2048 {
            self.reached_2048 += 1;
        }
        if self.best_seed.is_none() || record.score > self.best_score {
            self.best_score = record.score;
            self.best_seed = Some(record.seed);
        }
    }

    /// Fold in a game finished in this run.
    pub fn record(&mut self, record: &GameRecord) {
        self.record_loaded(record);
        self.played += 1;
    }

    pub fn mean_score(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        self.total_score as f64 / self.games as f64
    }

    pub fn mean_merges(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        self.total_merges as f64 / self.games as f64
    }

    /// Games per second over this run
    pub fn games_per_sec(&self) -> f64 {
        if let Some(start) = self.start_time {
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                return self.played as f64 / elapsed;
            }
        }
        0.0
    }

    /// Check if we should log progress
    pub fn should_log(&self, interval_secs: u64) -> bool {
        if let Some(last) = self.last_log_time {
            last.elapsed().as_secs() >= interval_secs
        } else {
            true
        }
    }

    /// Log progress and reset log timer
    pub fn log_progress(&mut self) {
        let now = Instant::now();
        let elapsed_total = self.start_time.map(|s| s.elapsed().as_secs()).unwrap_or(0);

        // Rate since last log
        let rate = match self.last_log_time {
            Some(last) if last.elapsed().as_secs_f64() > 0.0 => {
                (self.played - self.last_log_played) as f64 / last.elapsed().as_secs_f64()
            }
            _ => self.games_per_sec(),
        };

        info!(
            elapsed = %format!(
                "{:02}:{:02}:{:02}",
                elapsed_total / 3600,
                (elapsed_total % 3600) / 60,
                elapsed_total % 60
            ),
            games = self.games,
            mean_score = %format!("{:.1}", self.mean_score()),
            best_score = self.best_score,
            max_tile = self.max_tile,
            rate = %format!("{:.1}/s", rate),
            "progress"
        );

        self.last_log_time = Some(now);
        self.last_log_played = self.played;
    }

    /// Print final summary
    pub fn print_summary(&self) {
        println!("Games: {} ({} this run)", self.games, self.played);
        println!("Mean score: {:.1}", self.mean_score());
        match self.best_seed {
            Some(seed) => println!("Best score: {} (seed {})", self.best_score, seed),
            None => println!("Best score: -"),
        }
        println!("Max tile: {}", self.max_tile);
        println!("Mean merges per game: {:.1}", self.mean_merges());
        if self.games > 0 {
            println!(
                "Reached 2048: {} ({:.1}%)",
                self.reached_2048,
                100.0 * self.reached_2048 as f64 / self.games as f64
            );
        }
        if self.start_time.is_some() {
            println!("Average rate: {:.1} games/sec", self.games_per_sec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seed: u64, score: u64, max_tile: u32, merges: u32) -> GameRecord {
        GameRecord { seed, score, max_tile, merges }
    }

    #[test]
    fn test_empty_stats() {
        let stats = AutoplayStats::new();
        assert_eq!(stats.mean_score(), 0.0);
        assert_eq!(stats.mean_merges(), 0.0);
        assert_eq!(stats.best_seed, None);
    }

    #[test]
    fn test_totals_and_means() {
        let mut stats = AutoplayStats::new();
        stats.record(&record(0, 100, 64, 10));
        stats.record(&record(1, 300, 2048, 30));
        stats.record_loaded(&record(2, 200, 128, 20));

        assert_eq!(stats.games, 3);
        assert_eq!(stats.mean_score(), 200.0);
        assert_eq!(stats.mean_merges(), 20.0);
        assert_eq!(stats.best_score, 300);
        assert_eq!(stats.best_seed, Some(1));
        assert_eq!(stats.max_tile, 2048);
        assert_eq!(stats.reached_2048, 1);
        assert_eq!(stats.played, 2);
    }

    #[test]
    fn test_zero_score_game_still_sets_best_seed() {
        let mut stats = AutoplayStats::new();
        stats.record(&record(9, 0, 8, 0));
        assert_eq!(stats.best_seed, Some(9));
        assert_eq!(stats.best_score, 0);
    }
}
