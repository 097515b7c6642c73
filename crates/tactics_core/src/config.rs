//! Combat rules configuration.
//!
//! Every field has a default, so a RON file only needs the values it changes:
//!
//! ```ron
//! (allow_flee: false, path_heuristic: Diagonal, seed: 7)
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pathfinding::PathHeuristic;
use crate::unit::TurnStartRules;

/// Tunable combat rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Whether Flee commands are accepted.
    pub allow_flee: bool,
    /// Readiness a gauge must reach before its unit acts.
    pub atb_threshold: u32,
    /// Executed commands kept by the invoker.
    pub command_history_capacity: usize,
    /// Pathfinding strategy used for movement.
    pub path_heuristic: PathHeuristic,
    /// Seed for hit and flee rolls.
    pub seed: u64,
    /// Turn cap used by automated runs.
    pub max_turns: u32,
    /// Percentage of max MP regained at turn start.
    pub mp_regen_percent: u32,
    /// Percentage of max Stamina regained at turn start.
    pub stamina_regen_percent: u32,
    /// Percentage of max HP lost or gained on Hazard and Heal terrain.
    pub terrain_effect_percent: u32,
    /// Actions granted per turn.
    pub actions_per_turn: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            allow_flee: true,
            atb_threshold: 100,
            command_history_capacity: 64,
            path_heuristic: PathHeuristic::Manhattan,
            seed: 0,
            max_turns: 500,
            mp_regen_percent: 10,
            stamina_regen_percent: 20,
            terrain_effect_percent: 10,
            actions_per_turn: 1,
        }
    }
}

impl CombatConfig {
    /// Parse and validate a RON document.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_ron(&text)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.atb_threshold == 0 {
            return Err(ConfigError::Invalid("atb_threshold must be positive".into()));
        }
        if self.command_history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "command_history_capacity must be positive".into(),
            ));
        }
        if self.actions_per_turn == 0 {
            return Err(ConfigError::Invalid("actions_per_turn must be positive".into()));
        }
        for (name, value) in [
            ("mp_regen_percent", self.mp_regen_percent),
            ("stamina_regen_percent", self.stamina_regen_percent),
            ("terrain_effect_percent", self.terrain_effect_percent),
        ] {
            if value > 100 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at most 100, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Builder: set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder: set the pathfinding heuristic.
    #[must_use]
    pub fn with_heuristic(mut self, heuristic: PathHeuristic) -> Self {
        self.path_heuristic = heuristic;
        self
    }

    /// Turn-start rules derived from this config.
    #[must_use]
    pub const fn turn_start_rules(&self) -> TurnStartRules {
        TurnStartRules {
            mp_regen_percent: self.mp_regen_percent,
            stamina_regen_percent: self.stamina_regen_percent,
            actions_per_turn: self.actions_per_turn,
        }
    }
}
