//! Headless tactics battle runner.
//!
//! Plays battles without a UI, with the AI controlling every team.
//! Designed for balance testing and CI determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Play one game of the built-in skirmish
//! cargo run -p tactics_headless -- run --seed 7
//!
//! # Play one game from a scenario file, keeping the event log
//! cargo run -p tactics_headless -- run --scenario scenarios/skirmish.ron --events
//!
//! # Run batch balance test
//! cargo run -p tactics_headless -- batch --count 1000 --output results/
//!
//! # Verify determinism
//! cargo run -p tactics_headless -- verify --seed 42 --runs 5
//! ```
//!
//! Output (stdout): JSON game metrics
//! Logs (stderr): Debug information

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tactics_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{run_game, GameConfig},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless tactics battle runner for AI testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single game and print its metrics
    Run {
        /// Scenario file to load (default: built-in skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum unit turns (default: the scenario's rules)
        #[arg(long)]
        max_turns: Option<u32>,

        /// Include the full event log in the output
        #[arg(long)]
        events: bool,
    },

    /// Run batch of games for balance testing
    Batch {
        /// Scenario file to load (default: built-in skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum unit turns per game (default: the scenario's rules)
        #[arg(long)]
        max_turns: Option<u32>,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Scenario file to load (default: built-in skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of runs to compare
        #[arg(short, long, default_value = "3")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            seed,
            max_turns,
            events,
        }) => cmd_run(scenario, seed, max_turns, events),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_turns,
        }) => cmd_batch(scenario, count, parallel, output, seed, max_turns),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(scenario, seed, runs),
        None => cmd_run(None, 0, None, false),
    }
}

/// Load a scenario file, or the built-in skirmish. Exits on failure.
fn load_scenario(path: Option<PathBuf>) -> Scenario {
    let Some(path) = path else {
        return Scenario::skirmish();
    };
    match Scenario::load(&path) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load scenario");
            eprintln!("FATAL: Cannot load scenario '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Play one game and print its metrics
fn cmd_run(scenario: Option<PathBuf>, seed: u64, max_turns: Option<u32>, events: bool) {
    let scenario = load_scenario(scenario);
    let mut config = GameConfig::new(scenario, seed);
    config.max_turns = max_turns;
    config.record_events = events;

    let result = match run_game(&config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("FATAL: Game failed: {e}");
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&result.metrics) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("FATAL: Cannot serialize metrics: {e}");
            std::process::exit(1);
        }
    }
}

/// Run batch of games for balance testing
fn cmd_batch(
    scenario: Option<PathBuf>,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    max_turns: Option<u32>,
) {
    let num_cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);

    tracing::info!(
        scenario = ?scenario,
        count,
        parallel,
        seed,
        ?max_turns,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {}",
            output.display(),
            e
        );
        std::process::exit(1);
    }

    let mut config = BatchConfig::new(count)
        .with_output(output.clone())
        .with_seed(seed);
    config.parallel_games = parallel;
    config.max_turns = max_turns;
    if let Some(path) = scenario {
        config = config.with_scenario(path);
    }

    let results = match run_batch(config) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("FATAL: Batch failed: {e}");
            std::process::exit(1);
        }
    };

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE: {}", results.scenario);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Games failed: {}", results.errors.len());
    }
    for (team, rate) in &summary.win_rates {
        eprintln!("  {team:<12} {:>5.1}%", rate * 100.0);
    }
    eprintln!(
        "Draws: {}  Fled: {}  Turn limit: {}",
        summary.draws, summary.fled, summary.turn_limits
    );
    eprintln!(
        "Turns: avg {:.1}, min {}, max {}",
        summary.avg_turns, summary.min_turns, summary.max_turns
    );
    eprintln!("Results saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, seed: u64, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    match verify_determinism(&scenario, seed, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FATAL: Game failed: {e}");
            std::process::exit(1);
        }
    }
}
