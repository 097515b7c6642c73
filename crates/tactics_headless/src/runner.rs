//! Single-game runner.
//!
//! Builds a combat from a [`Scenario`], plays it to the end with the rule
//! AI controlling every team, and reports [`GameMetrics`].

use std::time::Instant;

use tactics_core::ai::AiController;
use tactics_core::engine::{CombatEngine, RunOutcome};
use tactics_core::error::CombatError;
use tactics_core::events::CombatResolution;
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics::{GameMetrics, GameOutcome, MetricsCollector};
use crate::scenario::{Scenario, ScenarioError};

/// Errors that stop a game from finishing.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The scenario could not be turned into a combat.
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// The engine rejected the setup or failed mid-battle.
    #[error("Combat error: {0}")]
    Combat(#[from] CombatError),
}

/// Configuration for a single game run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Random seed for determinism.
    pub seed: u64,
    /// Turn cap override; `None` uses the scenario's rules.
    pub max_turns: Option<u32>,
    /// Scenario to play.
    pub scenario: Scenario,
    /// AI tuning shared by every team.
    pub ai: AiController,
    /// Game ID for tracking.
    pub game_id: String,
    /// Keep the full event log in the metrics.
    pub record_events: bool,
}

impl GameConfig {
    /// Config for one seed of a scenario, capped by the scenario's rules.
    #[must_use]
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            seed,
            max_turns: None,
            game_id: format!("{}_{seed}", scenario.name),
            scenario,
            ai: AiController::default(),
            record_events: false,
        }
    }

    /// Override the turn cap.
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Keep the event log in the result.
    #[must_use]
    pub fn with_events(mut self) -> Self {
        self.record_events = true;
        self
    }
}

/// Result of running a game.
#[derive(Debug, Clone)]
pub struct GameResult {
    /// Collected metrics.
    pub metrics: GameMetrics,
    /// How the combat resolved; `None` if the turn cap was hit.
    pub resolution: Option<CombatResolution>,
}

/// Play one game to completion or to the turn cap.
///
/// Headless runs have no player: a unit of a human-controlled team is
/// driven by the AI when the engine stops for input.
pub fn run_game(config: &GameConfig) -> Result<GameResult, RunnerError> {
    let started = Instant::now();
    info!(
        game_id = %config.game_id,
        seed = config.seed,
        scenario = %config.scenario.name,
        "Starting game"
    );

    let combat = config.scenario.build_combat(config.seed)?;
    let max_turns = config.max_turns.unwrap_or(combat.config().max_turns);
    debug!(game_id = %config.game_id, max_turns, "Turn cap");
    let mut engine = CombatEngine::new(combat).with_ai(config.ai);

    let mut remaining = max_turns;
    let resolution = loop {
        let before = engine.combat().turn();
        let outcome = engine.run(remaining)?;
        remaining = remaining.saturating_sub(engine.combat().turn() - before);

        match outcome {
            RunOutcome::Finished(resolution) => break Some(resolution),
            RunOutcome::TurnLimit { .. } => break None,
            RunOutcome::AwaitingInput(unit) => {
                debug!(unit = %unit, "No controller attached, AI acts instead");
                engine.play_ai_turn()?;
            }
        }
    };

    let outcome = resolution
        .as_ref()
        .map_or(GameOutcome::TurnLimit, GameOutcome::from_resolution);
    let combat = engine.combat();
    let mut metrics = MetricsCollector::new(combat).collect(
        config.game_id.clone(),
        &config.scenario.name,
        config.seed,
        outcome,
    );
    if config.record_events {
        metrics.events = combat.uncommitted_events().to_vec();
    }

    info!(
        game_id = %config.game_id,
        turns = metrics.turns,
        winner = ?metrics.winner,
        ?outcome,
        elapsed = ?started.elapsed(),
        "Game finished"
    );
    Ok(GameResult { metrics, resolution })
}
