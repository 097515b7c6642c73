//! The combat aggregate.
//!
//! [`Combat`] owns every team, the grid, inventories, the random source and
//! the event log. Commands are the only code that mutates units during a
//! turn; the aggregate exposes the lookups and bookkeeping they need plus
//! setup validation and victory evaluation.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CombatConfig;
use crate::damage::DamageStrategy;
use crate::error::{CombatError, Result, SetupError};
use crate::events::{CombatEvent, CombatResolution, DomainEvent, EventLog};
use crate::grid::{Grid, Position, TerrainType};
use crate::ids::{CombatId, ItemId, TeamId, UnitId};
use crate::inventory::{Bag, ItemCatalog, ItemDef};
use crate::math::percent_of;
use crate::pathfinding::{PathStrategy, Pathfinder};
use crate::rng::CombatRng;
use crate::skill::Skill;
use crate::team::Team;
use crate::unit::{TurnStartReport, Unit};

/// Lifecycle of a combat, independent of the turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombatStatus {
    /// Built but not started.
    #[default]
    Waiting,
    /// Turns are being played.
    InProgress,
    /// Temporarily halted.
    Paused,
    /// Ended with a resolution.
    Finished,
    /// Abandoned.
    Cancelled,
}

impl CombatStatus {
    /// Returns true if `to` is a legal lifecycle step from this status.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Waiting, Self::InProgress)
                | (Self::InProgress, Self::Paused)
                | (Self::Paused, Self::InProgress)
                | (Self::InProgress | Self::Paused, Self::Finished)
                | (Self::Waiting | Self::InProgress | Self::Paused, Self::Cancelled)
        )
    }

    /// Returns true once the combat can no longer change.
    #[must_use]
    pub const fn is_over(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// Victory evaluation from one team's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VictoryOutcome {
    /// More than one team is still fighting.
    Continue,
    /// The perspective team is the only one left.
    Victory,
    /// The perspective team is not the one left, or nobody is.
    Defeat,
    /// A team fled.
    Fled,
}

/// Result of a unit's turn-start processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnStart {
    /// Unit whose turn began.
    pub unit: UnitId,
    /// Status and regeneration report.
    pub report: TurnStartReport,
    /// HP lost to Hazard terrain.
    pub terrain_damage: u32,
    /// HP regained from Heal terrain.
    pub terrain_heal: u32,
    /// The unit cannot act this turn.
    pub stunned: bool,
}

/// Pre-mutation copy of everything a command can change.
#[derive(Debug, Clone)]
pub struct CombatSnapshot {
    teams: BTreeMap<TeamId, Team>,
    fled: BTreeSet<TeamId>,
    rng: CombatRng,
}

#[derive(Serialize)]
struct HashView<'a> {
    turn: u32,
    teams: &'a BTreeMap<TeamId, Team>,
    fled: &'a BTreeSet<TeamId>,
    inventories: &'a BTreeMap<TeamId, Bag>,
    rolls: u64,
}

/// The match aggregate.
#[derive(Debug, Clone)]
pub struct Combat {
    id: CombatId,
    status: CombatStatus,
    teams: BTreeMap<TeamId, Team>,
    grid: Grid,
    turn: u32,
    damage_strategy: Option<DamageStrategy>,
    fled: BTreeSet<TeamId>,
    inventories: BTreeMap<TeamId, Bag>,
    items: ItemCatalog,
    pathfinder: Pathfinder,
    rng: CombatRng,
    events: EventLog,
    config: CombatConfig,
}

impl Combat {
    /// Create a combat with default rules.
    #[must_use]
    pub fn new(id: impl Into<CombatId>, grid: Grid) -> Self {
        Self::with_config(id, grid, CombatConfig::default())
    }

    /// Create a combat with explicit rules.
    #[must_use]
    pub fn with_config(id: impl Into<CombatId>, grid: Grid, config: CombatConfig) -> Self {
        Self {
            id: id.into(),
            status: CombatStatus::Waiting,
            teams: BTreeMap::new(),
            grid,
            turn: 0,
            damage_strategy: None,
            fled: BTreeSet::new(),
            inventories: BTreeMap::new(),
            items: ItemCatalog::new(),
            pathfinder: Pathfinder::with_heuristic(config.path_heuristic),
            rng: CombatRng::new(config.seed),
            events: EventLog::new(),
            config,
        }
    }

    /// Add a team, builder style.
    #[must_use]
    pub fn with_team(mut self, team: Team) -> Self {
        self.add_team(team);
        self
    }

    /// Add a team. A team with the same id is replaced.
    pub fn add_team(&mut self, team: Team) {
        self.teams.insert(team.id().clone(), team);
    }

    /// Give a team an inventory, builder style.
    #[must_use]
    pub fn with_inventory(mut self, team: impl Into<TeamId>, bag: Bag) -> Self {
        self.inventories.insert(team.into(), bag);
        self
    }

    /// Set the item catalog, builder style.
    #[must_use]
    pub fn with_items(mut self, items: ItemCatalog) -> Self {
        self.items = items;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Combat id.
    #[must_use]
    pub const fn id(&self) -> &CombatId {
        &self.id
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> CombatStatus {
        self.status
    }

    /// Rules in force.
    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Battlefield.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Battlefield, mutably (setup only).
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Turns started so far.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// All teams in id order.
    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    /// Look up a team.
    #[must_use]
    pub fn team(&self, id: &TeamId) -> Option<&Team> {
        self.teams.get(id)
    }

    /// Every unit, grouped by team in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.teams.values().flat_map(Team::units)
    }

    /// Look up a unit anywhere in the combat.
    #[must_use]
    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.teams.values().find_map(|t| t.unit(id))
    }

    /// Look up a unit mutably.
    pub fn unit_mut(&mut self, id: &UnitId) -> Option<&mut Unit> {
        self.teams.values_mut().find_map(|t| t.unit_mut(id))
    }

    /// Look up a unit, failing with [`CombatError::UnknownUnit`].
    pub fn require_unit(&self, id: &UnitId) -> Result<&Unit> {
        self.unit(id).ok_or_else(|| CombatError::UnknownUnit(id.clone()))
    }

    /// Look up a unit mutably, failing with [`CombatError::UnknownUnit`].
    pub fn require_unit_mut(&mut self, id: &UnitId) -> Result<&mut Unit> {
        self.unit_mut(id).ok_or_else(|| CombatError::UnknownUnit(id.clone()))
    }

    /// Living unit standing on a cell.
    #[must_use]
    pub fn unit_at(&self, pos: Position) -> Option<&Unit> {
        self.units()
            .find(|u| u.is_alive() && u.position() == Some(pos))
    }

    /// Cells held by living units, optionally ignoring one unit.
    #[must_use]
    pub fn occupied_positions(&self, except: Option<&UnitId>) -> HashSet<Position> {
        self.units()
            .filter(|u| u.is_alive() && Some(u.id()) != except)
            .filter_map(Unit::position)
            .collect()
    }

    /// Returns true if the two units are on different teams.
    #[must_use]
    pub fn are_enemies(&self, a: &Unit, b: &Unit) -> bool {
        a.team_id() != b.team_id()
    }

    // ------------------------------------------------------------------
    // Strategies
    // ------------------------------------------------------------------

    /// Per-combat damage override, if any.
    #[must_use]
    pub const fn damage_strategy(&self) -> Option<DamageStrategy> {
        self.damage_strategy
    }

    /// Swap the damage override (arena rules). `None` restores per-category
    /// selection.
    pub fn set_damage_strategy(&mut self, strategy: Option<DamageStrategy>) {
        debug!(combat = %self.id, ?strategy, "Damage strategy changed");
        self.damage_strategy = strategy;
    }

    /// Strategy used for a skill: the override for damaging skills, else the
    /// category default. `None` for skills that deal no damage.
    #[must_use]
    pub fn strategy_for(&self, skill: &Skill) -> Option<DamageStrategy> {
        if !skill.category.is_damaging() {
            return None;
        }
        self.damage_strategy
            .or_else(|| DamageStrategy::for_category(skill.category))
    }

    /// Movement pathfinder.
    #[must_use]
    pub const fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    /// Swap the pathfinding strategy.
    pub fn set_path_strategy(&mut self, strategy: Arc<dyn PathStrategy>) {
        debug!(combat = %self.id, strategy = strategy.name(), "Path strategy changed");
        self.pathfinder.set_strategy(strategy);
    }

    /// Random source for hit and flee rolls.
    pub fn rng_mut(&mut self) -> &mut CombatRng {
        &mut self.rng
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    /// Item definition from the catalog.
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&ItemDef> {
        self.items.get(id)
    }

    /// Item catalog.
    #[must_use]
    pub const fn items(&self) -> &ItemCatalog {
        &self.items
    }

    /// A team's inventory, if it has one.
    #[must_use]
    pub fn inventory(&self, team: &TeamId) -> Option<&Bag> {
        self.inventories.get(team)
    }

    /// A team's inventory, created empty on first use.
    pub fn inventory_mut(&mut self, team: &TeamId) -> &mut Bag {
        self.inventories.entry(team.clone()).or_default()
    }

    // ------------------------------------------------------------------
    // Flee flags
    // ------------------------------------------------------------------

    /// Returns true if the team fled.
    #[must_use]
    pub fn has_fled(&self, team: &TeamId) -> bool {
        self.fled.contains(team)
    }

    /// Teams that fled.
    pub fn fled_teams(&self) -> impl Iterator<Item = &TeamId> {
        self.fled.iter()
    }

    /// Flag a team as fled. Returns false if it already was.
    pub fn mark_fled(&mut self, team: &TeamId) -> bool {
        self.fled.insert(team.clone())
    }

    // ------------------------------------------------------------------
    // Snapshots and hashing
    // ------------------------------------------------------------------

    /// Copy everything a command may mutate.
    #[must_use]
    pub fn snapshot(&self) -> CombatSnapshot {
        CombatSnapshot {
            teams: self.teams.clone(),
            fled: self.fled.clone(),
            rng: self.rng.clone(),
        }
    }

    /// Put back a snapshot taken with [`Combat::snapshot`].
    pub fn restore(&mut self, snapshot: CombatSnapshot) {
        self.teams = snapshot.teams;
        self.fled = snapshot.fled;
        self.rng = snapshot.rng;
    }

    /// Hash of the mutable battle state.
    ///
    /// Covers units, fled flags, inventories, the turn counter and the number
    /// of random rolls drawn. Event timestamps are not included.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let view = HashView {
            turn: self.turn,
            teams: &self.teams,
            fled: &self.fled,
            inventories: &self.inventories,
            rolls: self.rng.rolls(),
        };
        let mut hasher = DefaultHasher::new();
        match bincode::serialize(&view) {
            Ok(bytes) => bytes.hash(&mut hasher),
            // Serializing plain data into memory does not fail; fall back to
            // the structural hash regardless.
            Err(_) => {
                self.turn.hash(&mut hasher);
                self.teams.hash(&mut hasher);
                self.fled.hash(&mut hasher);
                self.inventories.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Append a domain event.
    pub fn record(&mut self, event: CombatEvent) {
        let recorded = self.events.record(&self.id, event);
        debug!(
            combat = %recorded.aggregate_id,
            version = recorded.version,
            event = recorded.event.name(),
            "Event recorded"
        );
    }

    /// Aggregate version (events ever recorded).
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.events.version()
    }

    /// Events recorded since the last commit.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[DomainEvent] {
        self.events.uncommitted()
    }

    /// Mark pending events as persisted, returning them.
    pub fn mark_events_committed(&mut self) -> Vec<DomainEvent> {
        self.events.mark_committed()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn set_status(&mut self, to: CombatStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(CombatError::InvalidState(format!(
                "cannot move combat from {:?} to {:?}",
                self.status, to
            )));
        }
        debug!(combat = %self.id, from = ?self.status, ?to, "Combat status changed");
        self.status = to;
        Ok(())
    }

    /// Waiting → InProgress.
    pub fn start(&mut self) -> Result<()> {
        if self.status != CombatStatus::Waiting {
            return Err(CombatError::InvalidState(format!(
                "combat already started ({:?})",
                self.status
            )));
        }
        self.set_status(CombatStatus::InProgress)?;
        let teams = self.teams.keys().cloned().collect();
        self.record(CombatEvent::CombatStarted { teams });
        info!(combat = %self.id, teams = self.teams.len(), "Combat started");
        Ok(())
    }

    /// InProgress → Paused.
    pub fn pause(&mut self) -> Result<()> {
        self.set_status(CombatStatus::Paused)
    }

    /// Paused → InProgress.
    pub fn resume(&mut self) -> Result<()> {
        self.set_status(CombatStatus::InProgress)
    }

    /// Abandon the combat.
    pub fn cancel(&mut self) -> Result<()> {
        self.set_status(CombatStatus::Cancelled)?;
        self.record(CombatEvent::CombatEnded {
            resolution: CombatResolution::Cancelled,
            turns: self.turn,
        });
        info!(combat = %self.id, "Combat cancelled");
        Ok(())
    }

    /// Close the combat with its current resolution.
    pub fn finish(&mut self) -> Result<CombatResolution> {
        self.set_status(CombatStatus::Finished)?;
        let resolution = self.resolution();
        self.record(CombatEvent::CombatEnded {
            resolution: resolution.clone(),
            turns: self.turn,
        });
        info!(combat = %self.id, ?resolution, turns = self.turn, "Combat finished");
        Ok(resolution)
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Check the combat can be played.
    pub fn validate_setup(&self) -> std::result::Result<(), SetupError> {
        if !self.grid.has_valid_dimensions() {
            return Err(SetupError::InvalidGrid {
                width: self.grid.width(),
                height: self.grid.height(),
            });
        }
        if self.teams.len() < 2 {
            return Err(SetupError::TooFewTeams(self.teams.len()));
        }

        let mut owners: BTreeMap<&UnitId, &TeamId> = BTreeMap::new();
        let mut cells: BTreeMap<Position, &UnitId> = BTreeMap::new();

        for team in self.teams.values() {
            if team.is_empty() {
                return Err(SetupError::EmptyTeam(team.id().clone()));
            }
            for unit in team.units() {
                if owners.insert(unit.id(), team.id()).is_some() {
                    return Err(SetupError::DuplicateUnit(unit.id().clone()));
                }
                if unit.team_id() != team.id() {
                    return Err(SetupError::MembershipMismatch {
                        unit: unit.id().clone(),
                        claimed: unit.team_id().clone(),
                        owner: team.id().clone(),
                    });
                }
                let Some(position) = unit.position() else {
                    return Err(SetupError::MissingPosition(unit.id().clone()));
                };
                if !self.grid.is_passable(position) {
                    return Err(SetupError::InvalidPlacement {
                        unit: unit.id().clone(),
                        position,
                    });
                }
                if let Some(first) = cells.insert(position, unit.id()) {
                    return Err(SetupError::OverlappingUnits {
                        first: first.clone(),
                        second: unit.id().clone(),
                        position,
                    });
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Turn start
    // ------------------------------------------------------------------

    /// Run a unit's turn-start hooks: status ticks, regeneration, cooldowns
    /// and terrain effects. Bumps the turn counter.
    ///
    /// A unit is stunned if it could not act before its statuses ticked, or
    /// if periodic effects eliminated it.
    pub fn begin_unit_turn(&mut self, id: &UnitId) -> Result<TurnStart> {
        let rules = self.config.turn_start_rules();
        let terrain_percent = self.config.terrain_effect_percent;
        let grid = &self.grid;
        let unit = self
            .teams
            .values_mut()
            .find_map(|t| t.unit_mut(id))
            .ok_or_else(|| CombatError::UnknownUnit(id.clone()))?;

        let was_alive = unit.is_alive();
        let blocked = !unit.can_act();
        let report = unit.new_turn(&rules);

        let mut terrain_damage = 0;
        let mut terrain_heal = 0;
        if unit.is_alive() {
            let amount = percent_of(unit.max_hp(), terrain_percent).max(1);
            match unit.position().and_then(|p| grid.terrain(p)) {
                Some(TerrainType::Hazard) => terrain_damage = unit.lose_hp(amount),
                Some(TerrainType::Heal) => terrain_heal = unit.receive_heal(amount),
                _ => {}
            }
        }
        let eliminated = unit.is_eliminated();

        self.turn += 1;

        let damage = report.periodic_damage + terrain_damage;
        if damage > 0 {
            self.record(CombatEvent::DamageDealt {
                source: None,
                target: id.clone(),
                amount: damage,
                absorbed: 0,
            });
        }
        let heal = report.periodic_heal + terrain_heal;
        if heal > 0 {
            self.record(CombatEvent::HealApplied {
                source: None,
                target: id.clone(),
                amount: heal,
            });
        }
        if was_alive && eliminated {
            self.record(CombatEvent::UnitEliminated { unit: id.clone() });
        }

        debug!(unit = %id, turn = self.turn, blocked, eliminated, "Turn started");
        Ok(TurnStart {
            unit: id.clone(),
            report,
            terrain_damage,
            terrain_heal,
            stunned: blocked || eliminated,
        })
    }

    // ------------------------------------------------------------------
    // Victory
    // ------------------------------------------------------------------

    /// Teams still fighting: not fled and with at least one living unit.
    pub fn active_teams(&self) -> impl Iterator<Item = &TeamId> {
        self.teams
            .values()
            .filter(|t| !self.fled.contains(t.id()) && t.has_living_units())
            .map(Team::id)
    }

    /// Victory conditions as seen by `perspective`.
    ///
    /// Any fled team ends the combat with [`VictoryOutcome::Fled`]. Otherwise
    /// the combat continues while more than one team is active; the last
    /// active team wins and everyone else (or everyone, if nobody is left)
    /// loses.
    #[must_use]
    pub fn verify_victory_conditions(&self, perspective: &TeamId) -> VictoryOutcome {
        if !self.fled.is_empty() {
            return VictoryOutcome::Fled;
        }
        let active: Vec<&TeamId> = self.active_teams().collect();
        match active.as_slice() {
            [only] if *only == perspective => VictoryOutcome::Victory,
            [_] | [] => VictoryOutcome::Defeat,
            _ => VictoryOutcome::Continue,
        }
    }

    /// Returns true once a victory condition holds.
    #[must_use]
    pub fn is_decided(&self) -> bool {
        !self.fled.is_empty() || self.active_teams().nth(1).is_none()
    }

    /// The last team standing, if exactly one remains and nobody fled.
    #[must_use]
    pub fn winner(&self) -> Option<&TeamId> {
        if !self.fled.is_empty() {
            return None;
        }
        let mut active = self.active_teams();
        match (active.next(), active.next()) {
            (Some(team), None) => Some(team),
            _ => None,
        }
    }

    /// Resolution implied by the current state.
    #[must_use]
    pub fn resolution(&self) -> CombatResolution {
        if self.status == CombatStatus::Cancelled {
            return CombatResolution::Cancelled;
        }
        if !self.fled.is_empty() {
            return CombatResolution::Fled(self.fled.iter().cloned().collect());
        }
        match self.winner() {
            Some(team) => CombatResolution::Victory(team.clone()),
            None => CombatResolution::Draw,
        }
    }

    /// Check structural invariants. Compiled only with `debug-validation`.
    #[cfg(feature = "debug-validation")]
    pub fn assert_invariants(&self) {
        for unit in self.units() {
            let stats = unit.stats();
            let base = unit.base_stats();
            assert!(stats.hp <= base.hp, "{} HP above max", unit.id());
            assert!(stats.mp <= base.mp, "{} MP above max", unit.id());
            assert!(stats.stamina <= base.stamina, "{} stamina above max", unit.id());
            assert!(stats.hit_chance <= 100, "{} hit chance above 100", unit.id());
            assert_eq!(
                unit.is_eliminated(),
                stats.hp == 0,
                "{} elimination flag out of sync",
                unit.id()
            );
        }
        let occupied: Vec<Position> = self
            .units()
            .filter(|u| u.is_alive())
            .filter_map(Unit::position)
            .collect();
        let unique: HashSet<&Position> = occupied.iter().collect();
        assert_eq!(unique.len(), occupied.len(), "two living units share a cell");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Stats;
    use crate::status::{Status, StatusType};

    fn p(x: u32, y: u32) -> Position {
        Position::new(x, y)
    }

    fn unit(id: &str, team: &str, pos: Position) -> Unit {
        Unit::new(UnitId::new(id), id, TeamId::new(team), Stats::default()).with_position(pos)
    }

    fn skirmish() -> Combat {
        Combat::new("c1", Grid::new(10, 10))
            .with_team(
                Team::new(TeamId::new("red"), "Red", "red", false)
                    .with_unit(unit("r1", "red", p(0, 0)))
                    .with_unit(unit("r2", "red", p(1, 0))),
            )
            .with_team(
                Team::new(TeamId::new("blue"), "Blue", "blue", true)
                    .with_unit(unit("b1", "blue", p(9, 9))),
            )
    }

    #[test]
    fn test_valid_setup() {
        assert_eq!(skirmish().validate_setup(), Ok(()));
    }

    #[test]
    fn test_setup_errors() {
        let lonely = Combat::new("c", Grid::new(5, 5)).with_team(
            Team::new(TeamId::new("red"), "Red", "red", false)
                .with_unit(unit("r1", "red", p(0, 0))),
        );
        assert_eq!(lonely.validate_setup(), Err(SetupError::TooFewTeams(1)));

        let empty = skirmish().with_team(Team::new(TeamId::new("green"), "Green", "green", true));
        assert_eq!(empty.validate_setup(), Err(SetupError::EmptyTeam(TeamId::new("green"))));

        let unplaced = skirmish().with_team(
            Team::new(TeamId::new("green"), "Green", "green", true)
                .with_unit(Unit::new(
                    UnitId::new("g1"),
                    "G",
                    TeamId::new("green"),
                    Stats::default(),
                )),
        );
        assert_eq!(unplaced.validate_setup(), Err(SetupError::MissingPosition(UnitId::new("g1"))));

        let flat = Combat::new("c", Grid::new(0, 4))
            .with_team(
                Team::new(TeamId::new("a"), "A", "a", false).with_unit(unit("a1", "a", p(0, 0))),
            )
            .with_team(
                Team::new(TeamId::new("b"), "B", "b", false).with_unit(unit("b1", "b", p(0, 1))),
            );
        assert!(matches!(flat.validate_setup(), Err(SetupError::InvalidGrid { .. })));

        let stacked = skirmish().with_team(
            Team::new(TeamId::new("green"), "Green", "green", true)
                .with_unit(unit("g1", "green", p(0, 0))),
        );
        assert!(matches!(stacked.validate_setup(), Err(SetupError::OverlappingUnits { .. })));

        let mismatched = skirmish().with_team(
            Team::new(TeamId::new("green"), "Green", "green", true)
                .with_unit(unit("g1", "red", p(5, 5))),
        );
        assert!(matches!(mismatched.validate_setup(), Err(SetupError::MembershipMismatch { .. })));
    }

    #[test]
    fn test_victory_from_both_sides() {
        let mut combat = skirmish();
        let red = TeamId::new("red");
        let blue = TeamId::new("blue");
        assert_eq!(combat.verify_victory_conditions(&red), VictoryOutcome::Continue);
        assert!(!combat.is_decided());

        combat.unit_mut(&UnitId::new("b1")).unwrap().receive_damage(1000);
        assert_eq!(combat.verify_victory_conditions(&red), VictoryOutcome::Victory);
        assert_eq!(combat.verify_victory_conditions(&blue), VictoryOutcome::Defeat);
        assert_eq!(combat.winner(), Some(&red));
        assert_eq!(combat.resolution(), CombatResolution::Victory(red));
    }

    #[test]
    fn test_nobody_left_is_defeat_for_all() {
        let mut combat = skirmish();
        for id in ["r1", "r2", "b1"] {
            combat.unit_mut(&UnitId::new(id)).unwrap().receive_damage(1000);
        }
        assert_eq!(combat.verify_victory_conditions(&TeamId::new("red")), VictoryOutcome::Defeat);
        assert_eq!(combat.verify_victory_conditions(&TeamId::new("blue")), VictoryOutcome::Defeat);
        assert_eq!(combat.resolution(), CombatResolution::Draw);
    }

    #[test]
    fn test_fled_takes_precedence() {
        let mut combat = skirmish();
        combat.unit_mut(&UnitId::new("b1")).unwrap().receive_damage(1000);
        combat.mark_fled(&TeamId::new("red"));
        assert_eq!(combat.verify_victory_conditions(&TeamId::new("red")), VictoryOutcome::Fled);
        assert_eq!(combat.winner(), None);
    }

    #[test]
    fn test_lifecycle() {
        let mut combat = skirmish();
        assert!(combat.pause().is_err());
        combat.start().unwrap();
        combat.pause().unwrap();
        assert_eq!(combat.status(), CombatStatus::Paused);
        assert!(combat.start().is_err());
        combat.resume().unwrap();
        combat.cancel().unwrap();
        assert!(combat.status().is_over());
        assert!(combat.resume().is_err());
        assert_eq!(combat.resolution(), CombatResolution::Cancelled);
    }

    #[test]
    fn test_events_and_version() {
        let mut combat = skirmish();
        combat.start().unwrap();
        assert_eq!(combat.version(), 1);
        assert!(matches!(
            combat.uncommitted_events()[0].event,
            CombatEvent::CombatStarted { .. }
        ));
        let committed = combat.mark_events_committed();
        assert_eq!(committed.len(), 1);
        assert!(combat.uncommitted_events().is_empty());
        assert_eq!(combat.version(), 1);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut combat = skirmish();
        let before = combat.state_hash();
        let snapshot = combat.snapshot();

        combat.unit_mut(&UnitId::new("r1")).unwrap().receive_damage(30);
        combat.mark_fled(&TeamId::new("blue"));
        combat.rng_mut().roll_d100();
        assert_ne!(combat.state_hash(), before);

        combat.restore(snapshot);
        assert_eq!(combat.state_hash(), before);
    }

    #[test]
    fn test_terrain_effects_at_turn_start() {
        let mut combat = skirmish();
        combat.grid_mut().set_terrain(p(0, 0), TerrainType::Hazard);
        combat.grid_mut().set_terrain(p(1, 0), TerrainType::Heal);
        combat.unit_mut(&UnitId::new("r2")).unwrap().receive_damage(50);

        let start = combat.begin_unit_turn(&UnitId::new("r1")).unwrap();
        assert_eq!(start.terrain_damage, 10);
        assert_eq!(combat.unit(&UnitId::new("r1")).unwrap().hp(), 90);

        let start = combat.begin_unit_turn(&UnitId::new("r2")).unwrap();
        assert_eq!(start.terrain_heal, 10);
        assert_eq!(combat.unit(&UnitId::new("r2")).unwrap().hp(), 60);
        assert_eq!(combat.turn(), 2);
    }

    #[test]
    fn test_stun_skips_exactly_one_turn() {
        let mut combat = skirmish();
        let id = UnitId::new("r1");
        combat.unit_mut(&id).unwrap().add_status(Status::new(StatusType::Stun, 1, 0));

        assert!(combat.begin_unit_turn(&id).unwrap().stunned);
        assert!(!combat.begin_unit_turn(&id).unwrap().stunned);
    }

    #[test]
    fn test_strategy_override_only_for_damaging_skills() {
        use crate::damage::FixedDamage;
        use crate::skill::{SkillCategory, TargetFilter};

        let mut combat = skirmish();
        let heal = Skill::new("heal", "Heal", SkillCategory::Heal, 2, TargetFilter::Allies);
        let strike = Skill::basic_attack(1);
        assert_eq!(combat.strategy_for(&strike), Some(DamageStrategy::Physical));
        assert_eq!(combat.strategy_for(&heal), None);

        let arena = DamageStrategy::Fixed(FixedDamage { value: 7 });
        combat.set_damage_strategy(Some(arena));
        assert_eq!(combat.strategy_for(&strike), Some(arena));
        assert_eq!(combat.strategy_for(&heal), None);
    }
}
