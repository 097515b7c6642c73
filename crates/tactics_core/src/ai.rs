//! Deterministic command selection for AI-controlled units.
//!
//! Priorities, first match wins:
//! 1. heal the most hurt ally below the heal threshold with a usable heal skill
//! 2. hit the weakest enemy in range with the hardest-hitting usable option
//! 3. step toward the nearest enemy
//! 4. wait
//!
//! Every candidate goes through the validation chain before it is chosen, so
//! the controller never proposes a command the engine would reject.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combat::Combat;
use crate::command::Command;
use crate::damage::DamageCalculator;
use crate::ids::UnitId;
use crate::skill::{Skill, SkillCategory};
use crate::unit::Unit;

/// Rule-based AI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiController {
    /// Allies below this percentage of max HP are healed first.
    pub heal_threshold_percent: u32,
}

impl Default for AiController {
    fn default() -> Self {
        Self {
            heal_threshold_percent: 50,
        }
    }
}

/// Orders units by remaining HP fraction, lowest first, then by id.
fn by_hp_fraction(a: &Unit, b: &Unit) -> Ordering {
    let left = u64::from(a.hp()) * u64::from(b.max_hp().max(1));
    let right = u64::from(b.hp()) * u64::from(a.max_hp().max(1));
    left.cmp(&right).then_with(|| a.id().cmp(b.id()))
}

impl AiController {
    /// Pick a command for `unit`. Falls back to Wait.
    #[must_use]
    pub fn decide(&self, combat: &Combat, unit: &UnitId) -> Command {
        let Some(actor) = combat.unit(unit) else {
            return Command::wait(unit.clone());
        };

        let command = self
            .heal_ally(combat, actor)
            .or_else(|| Self::attack_weakest(combat, actor))
            .or_else(|| Self::advance(combat, actor))
            .unwrap_or_else(|| Command::wait(unit.clone()));
        debug!(unit = %unit, command = %command, "AI decided");
        command
    }

    fn heal_ally(&self, combat: &Combat, actor: &Unit) -> Option<Command> {
        let heals: Vec<&Skill> = actor
            .skills()
            .iter()
            .filter(|s| s.category == SkillCategory::Heal)
            .collect();
        if heals.is_empty() {
            return None;
        }

        let mut hurt: Vec<&Unit> = combat
            .team(actor.team_id())?
            .living_units()
            .filter(|u| {
                u64::from(u.hp()) * 100
                    < u64::from(u.max_hp()) * u64::from(self.heal_threshold_percent)
            })
            .collect();
        hurt.sort_by(|a, b| by_hp_fraction(a, b));

        hurt.into_iter().find_map(|ally| {
            heals.iter().find_map(|skill| {
                let targets = vec![ally.id().clone()];
                let command = Command::use_skill(actor.id().clone(), skill.id.clone(), targets);
                command.validate(combat).is_ok().then_some(command)
            })
        })
    }

    fn attack_weakest(combat: &Combat, actor: &Unit) -> Option<Command> {
        let mut enemies: Vec<&Unit> = combat
            .units()
            .filter(|u| u.is_alive() && u.team_id() != actor.team_id())
            .collect();
        enemies.sort_by(|a, b| a.hp().cmp(&b.hp()).then_with(|| a.id().cmp(b.id())));

        let basic = Skill::basic_attack(actor.weapon_range());
        enemies.into_iter().find_map(|enemy| {
            let mut best: Option<(u32, Command)> = None;
            let mut consider = |damage: u32, command: Command| {
                let better = match &best {
                    Some((top, _)) => damage > *top,
                    None => true,
                };
                if better && command.validate(combat).is_ok() {
                    best = Some((damage, command));
                }
            };

            consider(
                Self::expected_damage(combat, actor, enemy, &basic),
                Command::attack(actor.id().clone(), enemy.id().clone()),
            );
            for skill in actor.skills().iter().filter(|s| s.category.is_damaging()) {
                consider(
                    Self::expected_damage(combat, actor, enemy, skill),
                    Command::use_skill(
                        actor.id().clone(),
                        skill.id.clone(),
                        vec![enemy.id().clone()],
                    ),
                );
            }
            best.map(|(_, command)| command)
        })
    }

    fn expected_damage(combat: &Combat, actor: &Unit, enemy: &Unit, skill: &Skill) -> u32 {
        combat
            .strategy_for(skill)
            .map_or(0, |strategy| strategy.calculate(actor, enemy, skill))
    }

    fn advance(combat: &Combat, actor: &Unit) -> Option<Command> {
        if !actor.can_move() || actor.movement_remaining() == 0 {
            return None;
        }
        let from = actor.position()?;
        let target = combat
            .units()
            .filter(|u| u.is_alive() && u.team_id() != actor.team_id())
            .filter_map(|u| u.position().map(|p| (from.manhattan(p), u.id(), p)))
            .min()
            .map(|(_, _, p)| p)?;

        let occupied = combat.occupied_positions(Some(actor.id()));
        let reachable = combat
            .pathfinder()
            .reachable_cells(combat.grid(), from, actor.movement_remaining(), &occupied);

        let (cell, _) = reachable
            .into_iter()
            .min_by_key(|(cell, cost)| (cell.manhattan(target), *cost, cell.y, cell.x))?;
        if cell.manhattan(target) >= from.manhattan(target) {
            return None;
        }

        let command = Command::move_to(actor.id().clone(), cell);
        command.validate(combat).is_ok().then_some(command)
    }
}
