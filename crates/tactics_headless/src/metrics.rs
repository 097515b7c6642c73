//! Battle metrics for balance analysis.
//!
//! Everything here is derived from a finished combat's event log, so a
//! metrics record can be rebuilt from a replayed battle.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tactics_core::combat::Combat;
use tactics_core::events::{CombatEvent, CombatResolution, DomainEvent};
use tactics_core::ids::{TeamId, UnitId};

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    /// One team remained.
    Victory,
    /// Nobody remained.
    Draw,
    /// A team fled.
    Fled,
    /// The combat was cancelled.
    Cancelled,
    /// The turn cap was reached first.
    TurnLimit,
}

impl GameOutcome {
    /// Outcome of a finished combat.
    #[must_use]
    pub const fn from_resolution(resolution: &CombatResolution) -> Self {
        match resolution {
            CombatResolution::Victory(_) => Self::Victory,
            CombatResolution::Draw => Self::Draw,
            CombatResolution::Fled(_) => Self::Fled,
            CombatResolution::Cancelled => Self::Cancelled,
        }
    }
}

/// Complete metrics for a single game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Unit turns played.
    pub turns: u32,
    /// Winning team (None = no winner).
    pub winner: Option<String>,
    /// How the game ended.
    pub outcome: GameOutcome,
    /// Per-team metrics.
    pub teams: BTreeMap<String, TeamMetrics>,
    /// Final combat state hash (for determinism validation).
    pub final_state_hash: u64,
    /// Full event log, when requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<DomainEvent>,
}

/// Metrics for one team in a game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Units fielded.
    pub units_total: u32,
    /// Units still standing at the end.
    pub units_alive: u32,
    /// HP left across living units.
    pub hp_remaining: u32,
    /// Damage dealt by this team's units.
    pub damage_dealt: u64,
    /// Damage taken from any source.
    pub damage_taken: u64,
    /// Healing done by this team's units.
    pub healing_done: u64,
    /// Enemy units whose last damage came from this team.
    pub eliminations: u32,
    /// Skills activated.
    pub skills_used: u32,
    /// Items consumed.
    pub items_used: u32,
    /// Moves made.
    pub moves: u32,
}

/// Builds [`GameMetrics`] from a combat.
#[derive(Debug)]
pub struct MetricsCollector<'a> {
    combat: &'a Combat,
    owners: HashMap<&'a UnitId, &'a TeamId>,
}

impl<'a> MetricsCollector<'a> {
    /// Index unit ownership for a combat.
    #[must_use]
    pub fn new(combat: &'a Combat) -> Self {
        let owners = combat.units().map(|u| (u.id(), u.team_id())).collect();
        Self { combat, owners }
    }

    fn team_of(&self, unit: &UnitId) -> Option<String> {
        self.owners.get(unit).map(|t| t.to_string())
    }

    /// Summarize the combat's recorded events and final state.
    #[must_use]
    pub fn collect(
        &self,
        game_id: String,
        scenario: &str,
        seed: u64,
        outcome: GameOutcome,
    ) -> GameMetrics {
        let mut teams: BTreeMap<String, TeamMetrics> = BTreeMap::new();
        for team in self.combat.teams() {
            let living: Vec<_> = team.living_units().collect();
            teams.insert(
                team.id().to_string(),
                TeamMetrics {
                    units_total: u32::try_from(team.len()).unwrap_or(u32::MAX),
                    units_alive: u32::try_from(living.len()).unwrap_or(u32::MAX),
                    hp_remaining: living.iter().map(|u| u.hp()).sum(),
                    ..TeamMetrics::default()
                },
            );
        }

        // Last team to damage each unit; periodic damage clears it.
        let mut last_hit: HashMap<&UnitId, String> = HashMap::new();
        for recorded in self.combat.uncommitted_events() {
            match &recorded.event {
                CombatEvent::DamageDealt { source, target, amount, .. } => {
                    match source.as_ref().and_then(|s| self.team_of(s)) {
                        Some(team) => {
                            let dealt = &mut teams.entry(team.clone()).or_default().damage_dealt;
                            *dealt += u64::from(*amount);
                            last_hit.insert(target, team);
                        }
                        None => {
                            last_hit.remove(target);
                        }
                    }
                    if let Some(team) = self.team_of(target) {
                        teams.entry(team).or_default().damage_taken += u64::from(*amount);
                    }
                }
                CombatEvent::HealApplied { source: Some(source), amount, .. } => {
                    if let Some(team) = self.team_of(source) {
                        teams.entry(team).or_default().healing_done += u64::from(*amount);
                    }
                }
                CombatEvent::UnitEliminated { unit } => {
                    let victim = self.team_of(unit);
                    let credited = last_hit.remove(unit).filter(|t| victim.as_ref() != Some(t));
                    if let Some(team) = credited {
                        teams.entry(team).or_default().eliminations += 1;
                    }
                }
                CombatEvent::SkillUsed { actor, .. } => {
                    if let Some(team) = self.team_of(actor) {
                        teams.entry(team).or_default().skills_used += 1;
                    }
                }
                CombatEvent::ItemUsed { actor, .. } => {
                    if let Some(team) = self.team_of(actor) {
                        teams.entry(team).or_default().items_used += 1;
                    }
                }
                CombatEvent::UnitMoved { unit, .. } => {
                    if let Some(team) = self.team_of(unit) {
                        teams.entry(team).or_default().moves += 1;
                    }
                }
                _ => {}
            }
        }

        GameMetrics {
            game_id,
            scenario: scenario.to_string(),
            seed,
            turns: self.combat.turn(),
            winner: self.combat.winner().map(ToString::to_string),
            outcome,
            teams,
            final_state_hash: self.combat.state_hash(),
            events: Vec::new(),
        }
    }
}

/// Aggregate statistics across a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games summarized.
    pub total_games: u32,
    /// Wins per team.
    pub wins: BTreeMap<String, u32>,
    /// Win rate per team, 0.0-1.0.
    pub win_rates: BTreeMap<String, f64>,
    /// Games with no survivors.
    pub draws: u32,
    /// Games ended by a flee.
    pub fled: u32,
    /// Games that hit the turn cap.
    pub turn_limits: u32,
    /// Mean unit turns per game.
    pub avg_turns: f64,
    /// Shortest game in turns.
    pub min_turns: u32,
    /// Longest game in turns.
    pub max_turns: u32,
}

impl BatchSummary {
    /// Summarize a set of games.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        let mut summary = Self {
            total_games: u32::try_from(games.len()).unwrap_or(u32::MAX),
            min_turns: games.iter().map(|g| g.turns).min().unwrap_or(0),
            max_turns: games.iter().map(|g| g.turns).max().unwrap_or(0),
            ..Self::default()
        };
        if games.is_empty() {
            return summary;
        }

        for game in games {
            match game.outcome {
                GameOutcome::Victory => {
                    if let Some(winner) = &game.winner {
                        *summary.wins.entry(winner.clone()).or_insert(0) += 1;
                    }
                }
                GameOutcome::Draw => summary.draws += 1,
                GameOutcome::Fled => summary.fled += 1,
                GameOutcome::TurnLimit => summary.turn_limits += 1,
                GameOutcome::Cancelled => {}
            }
        }

        let total = games.len() as f64;
        summary.win_rates = summary
            .wins
            .iter()
            .map(|(team, wins)| (team.clone(), f64::from(*wins) / total))
            .collect();
        summary.avg_turns = games.iter().map(|g| f64::from(g.turns)).sum::<f64>() / total;
        summary
    }
}
