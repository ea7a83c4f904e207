//! Material Connect autoplay
//!
//! Plays seeded games with a chosen policy and reports score statistics.
//! Finished games are kept in a results file so an interrupted run resumes
//! from the next seed.

mod policy;
mod results;
mod search;
mod stats;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::policy::{play_game, GameRecord, Policy, PolicyKind};
use crate::results::Results;
use crate::stats::AutoplayStats;

#[derive(Parser, Debug)]
#[command(name = "autoplay", about = "Play Material Connect games headlessly and report statistics")]
struct Cli {
    /// Games to play in this run
    #[arg(long, default_value_t = 1_000)]
    games: u64,

    /// First seed (ignored when the results file already has later seeds)
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = PolicyKind::Greedy)]
    policy: PolicyKind,

    /// Search nodes per move for the greedy policy
    #[arg(long, default_value_t = 20_000)]
    budget: usize,

    /// Stop a game after this many merges
    #[arg(long, default_value_t = 10_000)]
    max_moves: u32,

    /// Results file (created if missing)
    #[arg(long, default_value = "data/autoplay.bin")]
    results: PathBuf,

    /// Seconds between progress lines
    #[arg(long, default_value_t = 5)]
    log_interval: u64,

    /// Seconds between results saves
    #[arg(long, default_value_t = 60)]
    save_interval: u64,
}

fn save(path: &Path, records: &[GameRecord]) {
    let start = Instant::now();
    match Results::save(path, records) {
        Ok(count) => info!(
            count,
            secs = %format!("{:.2}", start.elapsed().as_secs_f64()),
            "saved results"
        ),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to save results"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let policy = Policy { kind: cli.policy, budget: cli.budget };

    println!("Material Connect autoplay");
    println!("=========================");
    println!("Policy: {:?} (budget {})", policy.kind, policy.budget);
    println!();

    // Stop after the current game on SIGINT
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\n\nInterrupt received, finishing current game...");
        r.store(false, Ordering::SeqCst);
    })?;

    if let Some(parent) = cli.results.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut stats = AutoplayStats::new();
    let mut results = Results::default();
    if cli.results.exists() {
        match Results::load(&cli.results) {
            Ok(loaded) => {
                info!(count = loaded.records.len(), path = %cli.results.display(), "loaded results");
                for record in &loaded.records {
                    stats.record_loaded(record);
                }
                results = loaded;
            }
            Err(e) => {
                warn!(path = %cli.results.display(), error = %e, "failed to load results, starting fresh");
            }
        }
    }

    let first_seed = results.next_seed(cli.seed);
    info!(first_seed, games = cli.games, "starting");

    let mut last_save = Instant::now();
    let mut completed = 0u64;
    for seed in (first_seed..).take(cli.games as usize) {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let record = play_game(seed, &policy, cli.max_moves)?;
        stats.record(&record);
        results.records.push(record);
        completed += 1;

        if stats.should_log(cli.log_interval) {
            stats.log_progress();
        }
        if last_save.elapsed().as_secs() >= cli.save_interval {
            save(&cli.results, &results.records);
            last_save = Instant::now();
        }
    }

    save(&cli.results, &results.records);

    println!("\n=========================");
    if completed < cli.games {
        println!("Run interrupted after {} of {} games", completed, cli.games);
    } else {
        println!("Run complete");
    }
    println!("=========================");
    stats.print_summary();

    Ok(())
}
