//! Headless battle runner for AI testing and CI verification.
//!
//! Plays scenarios to completion with every team under AI control, with
//! no rendering and no input. This enables:
//!
//! - **Balance testing**: run thousands of seeds and compare win rates
//! - **CI verification**: check that a seed always ends in the same state
//! - **Scenario authoring**: load RON scenario files and see how they play
//!
//! Results go to stdout as JSON; logs go to stderr.
//!
//! # Example
//!
//! ```bash
//! # Play one game of a scenario file
//! cargo run -p tactics_headless -- run --scenario scenarios/skirmish.ron --seed 7
//!
//! # Run a batch balance test
//! cargo run -p tactics_headless -- batch --count 1000 --output results/
//!
//! # Verify determinism
//! cargo run -p tactics_headless -- verify --seed 42 --runs 5
//! ```

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, GameMetrics, GameOutcome, MetricsCollector, TeamMetrics};
pub use runner::{run_game, GameConfig, GameResult, RunnerError};
pub use scenario::{Scenario, ScenarioError};
