//! Batch game runner for balance testing.
//!
//! Runs many seeds of one scenario in parallel using rayon and collects
//! the per-game metrics plus an aggregate summary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::{BatchSummary, GameMetrics};
use crate::runner::{run_game, GameConfig, RunnerError};
use crate::scenario::Scenario;

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario file to run (None = built-in skirmish)
    pub scenario_path: Option<PathBuf>,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed for deterministic runs
    pub seed_start: u64,
    /// Per-game turn cap (None = scenario rules)
    pub max_turns: Option<u32>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario_path: None,
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_turns: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a number of games of the built-in skirmish
    #[must_use]
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Default::default()
        }
    }

    /// Set scenario file
    #[must_use]
    pub fn with_scenario(mut self, path: PathBuf) -> Self {
        self.scenario_path = Some(path);
        self
    }

    /// Set output directory
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the per-game turn cap
    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Load the configured scenario.
    ///
    /// # Errors
    /// If the scenario file cannot be read or parsed.
    pub fn scenario(&self) -> Result<Scenario, RunnerError> {
        match &self.scenario_path {
            Some(path) => Ok(Scenario::load(path)?),
            None => Ok(Scenario::skirmish()),
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Scenario name
    pub scenario: String,
    /// Individual game metrics, in seed order
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    ///
    /// # Errors
    /// On filesystem or serialization failure.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    ///
    /// # Errors
    /// On filesystem or parse failure.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total games
    pub total: u32,
    completed: AtomicU32,
    start_time: Instant,
    partial_wins: Mutex<HashMap<String, u32>>,
}

impl BatchProgress {
    /// Create new progress tracker
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            start_time: Instant::now(),
            partial_wins: Mutex::new(HashMap::new()),
        }
    }

    /// Record a completed game
    pub fn record_completion(&self, winner: Option<&str>) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if let Some(w) = winner {
            if let Ok(mut wins) = self.partial_wins.lock() {
                *wins.entry(w.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let per_game = self.start_time.elapsed().as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_game * f64::from(remaining))
    }

    /// Get current win rates
    pub fn current_win_rates(&self) -> HashMap<String, f64> {
        let completed = self.current();
        if completed == 0 {
            return HashMap::new();
        }

        self.partial_wins.lock().map_or_else(
            |_| HashMap::new(),
            |wins| {
                wins.iter()
                    .map(|(k, v)| (k.clone(), f64::from(*v) / f64::from(completed)))
                    .collect()
            },
        )
    }
}

/// Run a batch of games
///
/// A game that errors is recorded in [`BatchResults::errors`] and does not
/// stop the batch.
///
/// # Errors
/// Only if the scenario itself cannot be loaded.
#[allow(clippy::cast_precision_loss)]
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, RunnerError> {
    let start = Instant::now();
    let scenario = config.scenario()?;
    let progress = BatchProgress::new(config.game_count);

    info!(
        "Starting batch run: {} games of '{}'",
        config.game_count, scenario.name
    );

    // Configure thread pool if specified
    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<GameMetrics, BatchError>> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            let mut game = GameConfig::new(scenario.clone(), seed);
            game.max_turns = config.max_turns;

            match run_game(&game) {
                Ok(result) => {
                    progress.record_completion(result.metrics.winner.as_deref());
                    let completed = progress.current();
                    if completed % 10 == 0 {
                        debug!(
                            "Progress: {}/{} ({:.0}%, eta {}s)",
                            completed,
                            config.game_count,
                            progress.percentage(),
                            progress.eta().as_secs()
                        );
                    }
                    Ok(result.metrics)
                }
                Err(e) => {
                    warn!("Game {} failed: {}", i, e);
                    Err(BatchError {
                        game_index: i,
                        seed,
                        message: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameMetrics> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({:.1} games/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(f64::EPSILON)
    );

    Ok(BatchResults {
        config,
        scenario: scenario.name,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Verify determinism by running the same seed multiple times
///
/// Every run must end in the same state hash, turn count and winner.
///
/// # Errors
/// If any run fails.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32) -> Result<bool, RunnerError> {
    let config = GameConfig::new(scenario.clone(), seed);
    let results = (0..runs.max(1))
        .map(|_| run_game(&config).map(|r| r.metrics))
        .collect::<Result<Vec<_>, _>>()?;

    let first = &results[0];
    let consistent = results.iter().all(|r| {
        r.final_state_hash == first.final_state_hash
            && r.turns == first.turns
            && r.winner == first.winner
            && r.outcome == first.outcome
    });
    if !consistent {
        warn!(seed, runs, "Determinism check failed");
    }
    Ok(consistent)
}
