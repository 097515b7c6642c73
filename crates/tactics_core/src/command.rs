//! Commands: the only way unit state changes during a turn.
//!
//! A [`Command`] wraps an [`Action`] with the snapshot taken when it
//! executes. The contract is `validate` (no mutation), `execute` (mutates,
//! restoring the snapshot itself if it fails part way) and `rollback`
//! (restores the snapshot after a successful execution).
//!
//! Rollback restores every unit, the fled flags and the random source, and
//! returns a consumed item to its team inventory.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::area::affected_cells;
use crate::combat::{Combat, CombatSnapshot};
use crate::damage::{heal_amount, DamageCalculator};
use crate::error::{CombatError, Result, ValidationError};
use crate::grid::Position;
use crate::ids::{ItemId, SkillId, TeamId, UnitId};
use crate::inventory::{InventoryProvider, ItemEffect};
use crate::math::percent_of;
use crate::skill::{Skill, SkillCategory, TargetFilter};
use crate::status::StatusType;
use crate::unit::Unit;
use crate::validation::ValidationChain;

/// Lowest flee chance, in percent.
pub const MIN_FLEE_CHANCE: u32 = 10;
/// Highest flee chance, in percent.
pub const MAX_FLEE_CHANCE: u32 = 95;
/// Flee chance against an evenly matched enemy, in percent.
pub const BASE_FLEE_CHANCE: i64 = 50;

/// What a command does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Walk to a cell.
    Move {
        /// Acting unit.
        actor: UnitId,
        /// Destination cell.
        destination: Position,
    },
    /// Basic weapon attack.
    Attack {
        /// Acting unit.
        actor: UnitId,
        /// Attacked unit.
        target: UnitId,
    },
    /// Activate a learned skill.
    UseSkill {
        /// Caster.
        actor: UnitId,
        /// Skill id.
        skill: SkillId,
        /// Primary targets. May be empty for self-only skills.
        targets: Vec<UnitId>,
    },
    /// Consume an item from the team inventory.
    UseItem {
        /// User.
        actor: UnitId,
        /// Item id.
        item: ItemId,
        /// Target unit.
        target: UnitId,
    },
    /// Attempt to leave the battle.
    Flee {
        /// Acting unit.
        actor: UnitId,
    },
    /// Pass the turn.
    Wait {
        /// Acting unit.
        actor: UnitId,
    },
}

impl Action {
    /// Acting unit.
    #[must_use]
    pub const fn actor(&self) -> &UnitId {
        match self {
            Self::Move { actor, .. }
            | Self::Attack { actor, .. }
            | Self::UseSkill { actor, .. }
            | Self::UseItem { actor, .. }
            | Self::Flee { actor }
            | Self::Wait { actor } => actor,
        }
    }

    /// Short name for logs and events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::UseSkill { .. } => "use_skill",
            Self::UseItem { .. } => "use_item",
            Self::Flee { .. } => "flee",
            Self::Wait { .. } => "wait",
        }
    }
}

/// A typed effect produced by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// HP removed from a unit.
    Damage {
        /// Damaged unit.
        target: UnitId,
        /// HP removed.
        amount: u32,
        /// Damage soaked by a shield.
        absorbed: u32,
        /// The hit eliminated the target.
        eliminated: bool,
    },
    /// HP restored.
    Heal {
        /// Healed unit.
        target: UnitId,
        /// HP restored.
        amount: u32,
    },
    /// MP restored.
    RestoreMp {
        /// Unit.
        target: UnitId,
        /// MP restored.
        amount: u32,
    },
    /// A status was applied or refreshed.
    Status {
        /// Affected unit.
        target: UnitId,
        /// Status type.
        status: StatusType,
        /// Duration after application.
        duration: u32,
    },
    /// Statuses were removed.
    Cleansed {
        /// Affected unit.
        target: UnitId,
        /// Removed statuses.
        statuses: Vec<StatusType>,
    },
    /// An eliminated unit came back.
    Revived {
        /// Revived unit.
        target: UnitId,
        /// HP after revival.
        hp: u32,
    },
    /// A unit moved.
    Moved {
        /// Moving unit.
        unit: UnitId,
        /// Start cell.
        from: Position,
        /// End cell.
        to: Position,
        /// Movement points spent.
        cost: u32,
    },
    /// A skill was activated on these units.
    SkillActivated {
        /// Skill id.
        skill: SkillId,
        /// Units inside the area of effect.
        targets: Vec<UnitId>,
    },
    /// An item was consumed.
    ItemConsumed {
        /// Item id.
        item: ItemId,
        /// Target unit.
        target: UnitId,
    },
    /// An attack missed.
    Missed {
        /// Intended target.
        target: UnitId,
    },
    /// A team fled.
    Fled {
        /// Fleeing team.
        team: TeamId,
    },
    /// A flee attempt failed.
    FleeFailed {
        /// Chance that was rolled against, in percent.
        chance: u32,
    },
    /// The actor passed.
    Waited,
}

/// Resources a command spent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Costs {
    /// MP spent.
    pub mp: u32,
    /// Stamina spent.
    pub stamina: u32,
    /// Movement points spent.
    pub movement: u32,
    /// Actions spent.
    pub actions: u32,
    /// Items consumed.
    pub items: u32,
}

/// Structured outcome of a successful execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// True if the command did what it was asked to (a missed attack or a
    /// failed flee roll still executed successfully).
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Effects in the order they happened.
    pub effects: Vec<Effect>,
    /// Resources spent.
    pub costs: Costs,
}

impl CommandResult {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            effects: Vec::new(),
            costs: Costs::default(),
        }
    }

    /// Outcome of passing the turn.
    #[must_use]
    pub fn waited(actor: &UnitId) -> Self {
        let mut result = Self::new(format!("{actor} waits"));
        result.effects.push(Effect::Waited);
        result
    }
}

/// An action plus the state needed to undo it.
#[derive(Debug, Clone)]
pub struct Command {
    action: Action,
    snapshot: Option<CombatSnapshot>,
    consumed_item: Option<(TeamId, ItemId)>,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.action.name(), self.action.actor())
    }
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        Self::new(action)
    }
}

impl Command {
    /// Wrap an action.
    #[must_use]
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            snapshot: None,
            consumed_item: None,
        }
    }

    /// Move `actor` to `destination`.
    #[must_use]
    pub fn move_to(actor: impl Into<UnitId>, destination: Position) -> Self {
        Self::new(Action::Move {
            actor: actor.into(),
            destination,
        })
    }

    /// Basic attack.
    #[must_use]
    pub fn attack(actor: impl Into<UnitId>, target: impl Into<UnitId>) -> Self {
        Self::new(Action::Attack {
            actor: actor.into(),
            target: target.into(),
        })
    }

    /// Use a skill on one or more targets.
    #[must_use]
    pub fn use_skill(
        actor: impl Into<UnitId>,
        skill: impl Into<SkillId>,
        targets: Vec<UnitId>,
    ) -> Self {
        Self::new(Action::UseSkill {
            actor: actor.into(),
            skill: skill.into(),
            targets,
        })
    }

    /// Use an item on a target.
    #[must_use]
    pub fn use_item(
        actor: impl Into<UnitId>,
        item: impl Into<ItemId>,
        target: impl Into<UnitId>,
    ) -> Self {
        Self::new(Action::UseItem {
            actor: actor.into(),
            item: item.into(),
            target: target.into(),
        })
    }

    /// Attempt to flee.
    #[must_use]
    pub fn flee(actor: impl Into<UnitId>) -> Self {
        Self::new(Action::Flee { actor: actor.into() })
    }

    /// Pass the turn.
    #[must_use]
    pub fn wait(actor: impl Into<UnitId>) -> Self {
        Self::new(Action::Wait { actor: actor.into() })
    }

    /// The wrapped action.
    #[must_use]
    pub const fn action(&self) -> &Action {
        &self.action
    }

    /// Acting unit.
    #[must_use]
    pub const fn actor(&self) -> &UnitId {
        self.action.actor()
    }

    /// Returns true if this is a Wait.
    #[must_use]
    pub const fn is_wait(&self) -> bool {
        matches!(self.action, Action::Wait { .. })
    }

    /// Returns true once executed and not yet rolled back.
    #[must_use]
    pub const fn is_executed(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Run the standard validation chain. Never mutates.
    pub fn validate(&self, combat: &Combat) -> std::result::Result<(), ValidationError> {
        ValidationChain::standard().validate(combat, &self.action)
    }

    /// Validate, then apply the action.
    ///
    /// On any failure after mutation started, the pre-execution snapshot is
    /// restored before the error is returned.
    pub fn execute(&mut self, combat: &mut Combat) -> Result<CommandResult> {
        if let Err(err) = self.validate(combat) {
            debug!(command = %self, %err, "Command rejected");
            return Err(err.into());
        }

        let snapshot = combat.snapshot();
        self.consumed_item = None;

        match self.apply(combat) {
            Ok(result) => {
                self.snapshot = Some(snapshot);
                #[cfg(feature = "debug-validation")]
                combat.assert_invariants();
                info!(command = %self, message = %result.message, "Command executed");
                Ok(result)
            }
            Err(err) => {
                warn!(command = %self, %err, "Command failed, restoring snapshot");
                combat.restore(snapshot);
                self.return_item(combat);
                Err(CombatError::ExecutionFailed(err.to_string()))
            }
        }
    }

    /// Undo a successful execution.
    pub fn rollback(&mut self, combat: &mut Combat) -> Result<()> {
        let Some(snapshot) = self.snapshot.take() else {
            return Err(CombatError::InvalidState(format!("{self} was never executed")));
        };
        combat.restore(snapshot);
        self.return_item(combat);
        info!(command = %self, "Command rolled back");
        Ok(())
    }

    fn return_item(&mut self, combat: &mut Combat) {
        if let Some((team, item)) = self.consumed_item.take() {
            combat.inventory_mut(&team).add(&item, 1);
        }
    }

    fn apply(&mut self, combat: &mut Combat) -> Result<CommandResult> {
        match self.action.clone() {
            Action::Move { actor, destination } => execute_move(combat, &actor, destination),
            Action::Attack { actor, target } => execute_attack(combat, &actor, &target),
            Action::UseSkill { actor, skill, targets } => {
                execute_skill(combat, &actor, &skill, &targets)
            }
            Action::UseItem { actor, item, target } => {
                let team = combat.require_unit(&actor)?.team_id().clone();
                combat.inventory_mut(&team).consume(&item, 1)?;
                self.consumed_item = Some((team, item.clone()));
                execute_item(combat, &actor, &item, &target)
            }
            Action::Flee { actor } => execute_flee(combat, &actor),
            Action::Wait { actor } => Ok(CommandResult::waited(&actor)),
        }
    }
}

fn position_of(unit: &Unit) -> Result<Position> {
    unit.position()
        .ok_or_else(|| CombatError::InvalidState(format!("unit {} has no position", unit.id())))
}

fn execute_move(
    combat: &mut Combat,
    actor: &UnitId,
    destination: Position,
) -> Result<CommandResult> {
    let unit = combat.require_unit(actor)?;
    let from = position_of(unit)?;
    let budget = unit.movement_remaining();
    let occupied = combat.occupied_positions(Some(actor));
    let path = combat
        .pathfinder()
        .path_within_budget(combat.grid(), from, destination, budget, &occupied)?;

    let unit = combat.require_unit_mut(actor)?;
    unit.set_position(destination);
    unit.spend_movement(path.cost);

    let mut result = CommandResult::new(format!("{actor} moves from {from} to {destination}"));
    result.costs.movement = path.cost;
    result.effects.push(Effect::Moved {
        unit: actor.clone(),
        from,
        to: destination,
        cost: path.cost,
    });
    Ok(result)
}

fn execute_attack(combat: &mut Combat, actor: &UnitId, target: &UnitId) -> Result<CommandResult> {
    let attacker = combat.require_unit(actor)?;
    let hit_chance = attacker.stats().hit_chance;
    let skill = Skill::basic_attack(attacker.weapon_range());

    combat.require_unit_mut(actor)?.spend_action();
    let mut result = CommandResult::new(String::new());
    result.costs.actions = 1;

    if !combat.rng_mut().chance(hit_chance) {
        result.message = format!("{actor} attacks {target} and misses");
        result.effects.push(Effect::Missed { target: target.clone() });
        return Ok(result);
    }

    let damage = match combat.strategy_for(&skill) {
        Some(strategy) => strategy.calculate(
            combat.require_unit(actor)?,
            combat.require_unit(target)?,
            &skill,
        ),
        None => 0,
    };
    let receipt = combat.require_unit_mut(target)?.receive_damage(damage);
    result.message = format!("{actor} attacks {target} for {} damage", receipt.dealt);
    result.effects.push(Effect::Damage {
        target: target.clone(),
        amount: receipt.dealt,
        absorbed: receipt.absorbed,
        eliminated: receipt.eliminated,
    });
    Ok(result)
}

/// Units a skill touches: every living unit in the area around each primary
/// target that passes the skill's target filter. Order follows the primary
/// targets, then area cell order.
pub fn skill_area_units(
    combat: &Combat,
    caster: &Unit,
    skill: &Skill,
    targets: &[UnitId],
) -> Vec<UnitId> {
    let mut affected: Vec<UnitId> = Vec::new();
    let Some(origin) = caster.position() else {
        return affected;
    };

    let self_cast = targets.is_empty() && skill.target_filter == TargetFilter::SelfOnly;
    let primaries: Vec<&UnitId> = if self_cast {
        vec![caster.id()]
    } else {
        targets.iter().collect()
    };

    for primary in primaries {
        let Some(center) = combat.unit(primary).and_then(Unit::position) else {
            continue;
        };
        for cell in affected_cells(skill.area, origin, center, combat.grid()) {
            let Some(unit) = combat.unit_at(cell) else {
                continue;
            };
            let matches = match skill.target_filter {
                TargetFilter::Enemies => unit.team_id() != caster.team_id(),
                TargetFilter::Allies => unit.team_id() == caster.team_id(),
                TargetFilter::SelfOnly => unit.id() == caster.id(),
                TargetFilter::All => true,
            };
            if matches && !affected.contains(unit.id()) {
                affected.push(unit.id().clone());
            }
        }
    }
    affected
}

fn execute_skill(
    combat: &mut Combat,
    actor: &UnitId,
    skill_id: &SkillId,
    targets: &[UnitId],
) -> Result<CommandResult> {
    let caster = combat.require_unit(actor)?;
    let skill = caster
        .skill(skill_id)
        .cloned()
        .ok_or_else(|| CombatError::Validation(ValidationError::UnknownSkill(skill_id.clone())))?;
    let affected = skill_area_units(combat, caster, &skill, targets);

    {
        let caster = combat.require_unit_mut(actor)?;
        caster.consume_mp(skill.mp_cost)?;
        caster.consume_stamina(skill.stamina_cost)?;
        caster.spend_action();
        if let Some(owned) = caster.skill_mut(skill_id) {
            owned.trigger_cooldown();
        }
    }

    let mut result = CommandResult::new(format!("{actor} uses {}", skill.name));
    result.costs = Costs {
        mp: skill.mp_cost,
        stamina: skill.stamina_cost,
        actions: 1,
        ..Costs::default()
    };
    result.effects.push(Effect::SkillActivated {
        skill: skill.id.clone(),
        targets: affected.clone(),
    });

    let strategy = combat.strategy_for(&skill);
    let heal = heal_amount(combat.require_unit(actor)?, &skill);

    for target in &affected {
        match skill.category {
            SkillCategory::Attack | SkillCategory::Magic => {
                let damage = match strategy {
                    Some(strategy) => strategy.calculate(
                        combat.require_unit(actor)?,
                        combat.require_unit(target)?,
                        &skill,
                    ),
                    None => 0,
                };
                let receipt = combat.require_unit_mut(target)?.receive_damage(damage);
                result.effects.push(Effect::Damage {
                    target: target.clone(),
                    amount: receipt.dealt,
                    absorbed: receipt.absorbed,
                    eliminated: receipt.eliminated,
                });
            }
            SkillCategory::Heal => {
                let amount = combat.require_unit_mut(target)?.receive_heal(heal);
                result.effects.push(Effect::Heal {
                    target: target.clone(),
                    amount,
                });
            }
            SkillCategory::Utility => {
                let statuses = combat.require_unit_mut(target)?.cleanse();
                if !statuses.is_empty() {
                    result.effects.push(Effect::Cleansed {
                        target: target.clone(),
                        statuses,
                    });
                }
            }
            SkillCategory::Buff | SkillCategory::Debuff => {}
        }

        if let Some(template) = &skill.applies {
            let unit = combat.require_unit_mut(target)?;
            if unit.add_status(template.clone()).is_some() {
                let duration = unit
                    .statuses()
                    .get(template.kind)
                    .map_or(template.duration, |s| s.duration);
                result.effects.push(Effect::Status {
                    target: target.clone(),
                    status: template.kind,
                    duration,
                });
            }
        }
    }

    Ok(result)
}

fn execute_item(
    combat: &mut Combat,
    actor: &UnitId,
    item_id: &ItemId,
    target: &UnitId,
) -> Result<CommandResult> {
    let def = combat
        .item(item_id)
        .cloned()
        .ok_or_else(|| CombatError::Validation(ValidationError::UnknownItem(item_id.clone())))?;

    combat.require_unit_mut(actor)?.spend_action();
    let mut result = CommandResult::new(format!("{actor} uses {} on {target}", def.name));
    result.costs.actions = 1;
    result.costs.items = 1;
    result.effects.push(Effect::ItemConsumed {
        item: item_id.clone(),
        target: target.clone(),
    });

    if matches!(def.effect, ItemEffect::Revive(_)) {
        let cell = combat.require_unit(target)?.position();
        if cell.is_some_and(|p| combat.occupied_positions(Some(target)).contains(&p)) {
            return Err(CombatError::ExecutionFailed(format!("cell of {target} is occupied")));
        }
    }

    let unit = combat.require_unit_mut(target)?;
    match def.effect {
        ItemEffect::RestoreHp(amount) => {
            let amount = unit.receive_heal(amount);
            result.effects.push(Effect::Heal {
                target: target.clone(),
                amount,
            });
        }
        ItemEffect::RestoreMp(amount) => {
            let amount = unit.restore_mp(amount);
            result.effects.push(Effect::RestoreMp {
                target: target.clone(),
                amount,
            });
        }
        ItemEffect::Revive(percent) => {
            let hp = percent_of(unit.max_hp(), percent).max(1);
            if !unit.revive(hp) {
                return Err(CombatError::ExecutionFailed(format!("{target} is not eliminated")));
            }
            result.effects.push(Effect::Revived {
                target: target.clone(),
                hp: unit.hp(),
            });
        }
        ItemEffect::Bomb(damage) => {
            let receipt = unit.receive_damage(damage);
            result.effects.push(Effect::Damage {
                target: target.clone(),
                amount: receipt.dealt,
                absorbed: receipt.absorbed,
                eliminated: receipt.eliminated,
            });
        }
        ItemEffect::Cure(status) => {
            if unit.remove_status(status).is_some() {
                result.effects.push(Effect::Cleansed {
                    target: target.clone(),
                    statuses: vec![status],
                });
            }
        }
    }
    Ok(result)
}

/// Flee success chance in percent:
/// `clamp(50 + (actor SPD - mean living enemy SPD) / 10, 10, 95)`.
///
/// With no living enemies the actor's own SPD stands in for the mean.
#[must_use]
pub fn flee_chance(combat: &Combat, actor: &Unit) -> u32 {
    let spd = i64::from(actor.stats().spd);
    let (total, count) = combat
        .units()
        .filter(|u| u.is_alive() && u.team_id() != actor.team_id())
        .fold((0i64, 0i64), |(total, count), u| (total + i64::from(u.stats().spd), count + 1));
    let mean = if count == 0 { spd } else { total / count };
    let chance = (BASE_FLEE_CHANCE + (spd - mean) / 10)
        .clamp(i64::from(MIN_FLEE_CHANCE), i64::from(MAX_FLEE_CHANCE));
    u32::try_from(chance).unwrap_or(MIN_FLEE_CHANCE)
}

fn execute_flee(combat: &mut Combat, actor: &UnitId) -> Result<CommandResult> {
    let unit = combat.require_unit(actor)?;
    let team = unit.team_id().clone();
    let chance = flee_chance(combat, unit);

    combat.require_unit_mut(actor)?.spend_action();
    let escaped = combat.rng_mut().chance(chance);
    debug!(unit = %actor, chance, escaped, "Flee roll");

    let mut result = CommandResult::new(String::new());
    result.costs.actions = 1;
    if escaped {
        combat.mark_fled(&team);
        result.message = format!("{actor} flees; team {team} leaves the battle");
        result.effects.push(Effect::Fled { team });
    } else {
        result.message = format!("{actor} fails to flee ({chance}% chance)");
        result.effects.push(Effect::FleeFailed { chance });
    }
    Ok(result)
}
