//! Combatant units: stats, resources, statuses and per-turn budgets.
//!
//! Units are never removed from a combat. Elimination is a flag that stays
//! set until [`Unit::revive`].

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ResourceError;
use crate::grid::Position;
use crate::ids::{SkillId, TeamId, UnitId};
use crate::math::percent_of;
use crate::skill::Skill;
use crate::stats::{StatModifier, Stats};
use crate::status::{Status, StatusApplication, StatusManager, StatusTick, StatusType};

/// Rules applied when a unit starts its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStartRules {
    /// Percentage of max MP regained.
    pub mp_regen_percent: u32,
    /// Percentage of max Stamina regained.
    pub stamina_regen_percent: u32,
    /// Actions granted per turn.
    pub actions_per_turn: u32,
}

impl Default for TurnStartRules {
    fn default() -> Self {
        Self {
            mp_regen_percent: 10,
            stamina_regen_percent: 20,
            actions_per_turn: 1,
        }
    }
}

/// What happened during a unit's turn-start hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnStartReport {
    /// HP lost to periodic effects.
    pub periodic_damage: u32,
    /// HP regained from periodic effects.
    pub periodic_heal: u32,
    /// Statuses that expired.
    pub expired: Vec<StatusType>,
    /// MP regenerated.
    pub mp_regained: u32,
    /// Stamina regenerated.
    pub stamina_regained: u32,
    /// True if periodic damage eliminated the unit.
    pub eliminated: bool,
}

/// Outcome of [`Unit::receive_damage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageReceipt {
    /// Damage soaked by a shield.
    pub absorbed: u32,
    /// HP actually removed.
    pub dealt: u32,
    /// True if this hit eliminated the unit.
    pub eliminated: bool,
}

/// A combatant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    name: String,
    team_id: TeamId,
    base: Stats,
    current: Stats,
    position: Option<Position>,
    skills: Vec<Skill>,
    statuses: StatusManager,
    modifiers: Vec<StatModifier>,
    eliminated: bool,
    actions_remaining: u32,
    movement_remaining: u32,
    weapon_range: u32,
}

impl Unit {
    /// Create a unit at full resources with a melee weapon and no position.
    #[must_use]
    pub fn new(id: UnitId, name: impl Into<String>, team_id: TeamId, base: Stats) -> Self {
        let base = Stats {
            hit_chance: base.hit_chance.min(100),
            ..base
        };
        Self {
            id,
            name: name.into(),
            team_id,
            base,
            current: base,
            position: None,
            skills: Vec::new(),
            statuses: StatusManager::new(),
            modifiers: Vec::new(),
            eliminated: base.hp == 0,
            actions_remaining: 1,
            movement_remaining: base.mov,
            weapon_range: 1,
        }
    }

    /// Place the unit.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Learn a skill. The unit keeps its own copy with a fresh cooldown.
    #[must_use]
    pub fn with_skill(mut self, skill: &Skill) -> Self {
        self.learn_skill(skill);
        self
    }

    /// Set the basic attack range (1 = melee).
    #[must_use]
    pub fn with_weapon_range(mut self, range: u32) -> Self {
        self.weapon_range = range.max(1);
        self
    }

    /// Learn a skill, replacing any previous copy with the same id.
    pub fn learn_skill(&mut self, skill: &Skill) {
        let mut owned = skill.clone();
        owned.cooldown = 0;
        self.skills.retain(|s| s.id != owned.id);
        self.skills.push(owned);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Unit id.
    #[must_use]
    pub const fn id(&self) -> &UnitId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning team.
    #[must_use]
    pub const fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    /// Immutable base stats.
    #[must_use]
    pub const fn base_stats(&self) -> &Stats {
        &self.base
    }

    /// Current stats (base + modifiers, live resource pools).
    #[must_use]
    pub const fn stats(&self) -> &Stats {
        &self.current
    }

    /// Current cell, if placed.
    #[must_use]
    pub const fn position(&self) -> Option<Position> {
        self.position
    }

    /// Move the unit to a cell.
    pub fn set_position(&mut self, position: Position) {
        self.position = Some(position);
    }

    /// Learned skills.
    #[must_use]
    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    /// Look up a learned skill.
    #[must_use]
    pub fn skill(&self, id: &SkillId) -> Option<&Skill> {
        self.skills.iter().find(|s| &s.id == id)
    }

    /// Mutable access to a learned skill.
    pub fn skill_mut(&mut self, id: &SkillId) -> Option<&mut Skill> {
        self.skills.iter_mut().find(|s| &s.id == id)
    }

    /// Active statuses.
    #[must_use]
    pub const fn statuses(&self) -> &StatusManager {
        &self.statuses
    }

    /// Returns true if the unit has been eliminated.
    #[must_use]
    pub const fn is_eliminated(&self) -> bool {
        self.eliminated
    }

    /// Returns true if the unit is still in the fight.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.eliminated
    }

    /// Current HP.
    #[must_use]
    pub const fn hp(&self) -> u32 {
        self.current.hp
    }

    /// Maximum HP.
    #[must_use]
    pub const fn max_hp(&self) -> u32 {
        self.base.hp
    }

    /// Current MP.
    #[must_use]
    pub const fn mp(&self) -> u32 {
        self.current.mp
    }

    /// Current Stamina.
    #[must_use]
    pub const fn stamina(&self) -> u32 {
        self.current.stamina
    }

    /// Basic attack range.
    #[must_use]
    pub const fn weapon_range(&self) -> u32 {
        self.weapon_range
    }

    /// Actions left this turn.
    #[must_use]
    pub const fn actions_remaining(&self) -> u32 {
        self.actions_remaining
    }

    /// Movement points left this turn.
    #[must_use]
    pub const fn movement_remaining(&self) -> u32 {
        self.movement_remaining
    }

    // ------------------------------------------------------------------
    // Capability checks
    // ------------------------------------------------------------------

    /// Returns true if the unit may take an action.
    #[must_use]
    pub fn can_act(&self) -> bool {
        !self.eliminated && !self.statuses.blocks_actions()
    }

    /// Returns true if the unit may move.
    #[must_use]
    pub fn can_move(&self) -> bool {
        !self.eliminated && !self.statuses.blocks_movement()
    }

    /// Returns true if the unit may use skills.
    #[must_use]
    pub fn can_use_skills(&self) -> bool {
        !self.eliminated && !self.statuses.blocks_skills()
    }

    // ------------------------------------------------------------------
    // HP
    // ------------------------------------------------------------------

    /// Take damage. Shields soak first, then HP floors at 0. Damage wakes a
    /// sleeping unit. No effect on an eliminated unit.
    pub fn receive_damage(&mut self, amount: u32) -> DamageReceipt {
        if self.eliminated {
            return DamageReceipt::default();
        }

        let through = self.statuses.absorb(amount);
        let absorbed = amount - through;
        let dealt = through.min(self.current.hp);
        self.current.hp -= dealt;

        if dealt > 0 && self.statuses.remove(StatusType::Sleep).is_some() {
            self.recompute();
        }

        let eliminated = self.check_elimination();
        trace!(unit = %self.id, absorbed, dealt, hp = self.current.hp, "Damage received");
        DamageReceipt {
            absorbed,
            dealt,
            eliminated,
        }
    }

    /// Lose HP directly, bypassing shields (periodic effects, terrain).
    /// Returns the HP removed.
    pub fn lose_hp(&mut self, amount: u32) -> u32 {
        if self.eliminated {
            return 0;
        }
        let dealt = amount.min(self.current.hp);
        self.current.hp -= dealt;
        self.check_elimination();
        dealt
    }

    /// Restore HP up to the base maximum. Returns the HP actually restored.
    /// No effect on an eliminated unit.
    pub fn receive_heal(&mut self, amount: u32) -> u32 {
        if self.eliminated {
            return 0;
        }
        let healed = amount.min(self.base.hp - self.current.hp);
        self.current.hp += healed;
        healed
    }

    /// Bring an eliminated unit back with `hp` (clamped to 1..=max).
    /// Returns false if the unit was not eliminated.
    pub fn revive(&mut self, hp: u32) -> bool {
        if !self.eliminated {
            return false;
        }
        self.eliminated = false;
        self.current.hp = hp.clamp(1, self.base.hp.max(1));
        debug!(unit = %self.id, hp = self.current.hp, "Unit revived");
        true
    }

    fn check_elimination(&mut self) -> bool {
        if self.current.hp == 0 && !self.eliminated {
            self.eliminated = true;
            self.statuses.clear();
            self.recompute();
            debug!(unit = %self.id, "Unit eliminated");
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // MP / Stamina
    // ------------------------------------------------------------------

    /// Spend MP. Fails without change if the unit has too little.
    pub fn consume_mp(&mut self, amount: u32) -> Result<(), ResourceError> {
        if amount > self.current.mp {
            return Err(ResourceError::InsufficientMp {
                required: amount,
                available: self.current.mp,
            });
        }
        self.current.mp -= amount;
        Ok(())
    }

    /// Spend Stamina. Fails without change if the unit has too little.
    pub fn consume_stamina(&mut self, amount: u32) -> Result<(), ResourceError> {
        if amount > self.current.stamina {
            return Err(ResourceError::InsufficientStamina {
                required: amount,
                available: self.current.stamina,
            });
        }
        self.current.stamina -= amount;
        Ok(())
    }

    /// Restore MP up to the maximum. Returns the amount restored.
    pub fn restore_mp(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.base.mp - self.current.mp);
        self.current.mp += restored;
        restored
    }

    /// Restore Stamina up to the maximum. Returns the amount restored.
    pub fn restore_stamina(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.base.stamina - self.current.stamina);
        self.current.stamina += restored;
        restored
    }

    // ------------------------------------------------------------------
    // Budgets
    // ------------------------------------------------------------------

    /// Spend one action.
    pub fn spend_action(&mut self) {
        self.actions_remaining = self.actions_remaining.saturating_sub(1);
    }

    /// Spend movement points.
    pub fn spend_movement(&mut self, cost: u32) {
        self.movement_remaining = self.movement_remaining.saturating_sub(cost);
    }

    // ------------------------------------------------------------------
    // Modifiers and statuses
    // ------------------------------------------------------------------

    fn recompute(&mut self) {
        let modifiers = self.statuses.modifiers().chain(self.modifiers.iter());
        self.current = self.current.recomputed(&self.base, modifiers);
    }

    /// Add a standalone stat modifier.
    pub fn apply_stat_modifier(&mut self, modifier: StatModifier) {
        self.modifiers.push(modifier);
        self.recompute();
    }

    /// Remove one matching standalone modifier. Returns false if none matched.
    pub fn remove_stat_modifier(&mut self, modifier: StatModifier) -> bool {
        let Some(index) = self.modifiers.iter().position(|m| *m == modifier) else {
            return false;
        };
        self.modifiers.remove(index);
        self.recompute();
        true
    }

    /// Apply a status, refreshing an existing one of the same type.
    /// Eliminated units ignore statuses and report `None`.
    pub fn add_status(&mut self, status: Status) -> Option<StatusApplication> {
        if self.eliminated {
            return None;
        }
        let outcome = self.statuses.add(status);
        self.recompute();
        Some(outcome)
    }

    /// Remove a status, reverting its stat modifiers.
    pub fn remove_status(&mut self, kind: StatusType) -> Option<Status> {
        let removed = self.statuses.remove(kind)?;
        self.recompute();
        Some(removed)
    }

    /// Remove every harmful status.
    pub fn cleanse(&mut self) -> Vec<StatusType> {
        let removed = self.statuses.remove_harmful();
        if !removed.is_empty() {
            self.recompute();
        }
        removed
    }

    /// Run periodic effects, decrement durations and purge expired statuses.
    ///
    /// The returned tick reports the HP actually lost and restored.
    pub fn process_statuses(&mut self) -> StatusTick {
        if self.eliminated {
            return StatusTick::default();
        }
        let mut tick = self.statuses.tick();
        tick.damage = self.lose_hp(tick.damage);
        tick.heal = self.receive_heal(tick.heal);
        if !tick.expired.is_empty() && !self.eliminated {
            for kind in &tick.expired {
                trace!(unit = %self.id, status = kind.as_str(), "Status expired");
            }
            self.recompute();
        }
        tick
    }

    /// Turn-start hook: process statuses, reset budgets, regenerate MP and
    /// Stamina, and count every skill cooldown down by one.
    pub fn new_turn(&mut self, rules: &TurnStartRules) -> TurnStartReport {
        if self.eliminated {
            return TurnStartReport {
                eliminated: true,
                ..TurnStartReport::default()
            };
        }

        let tick = self.process_statuses();

        self.actions_remaining = rules.actions_per_turn;
        self.movement_remaining = self.current.mov;

        let (mp_regained, stamina_regained) = if self.eliminated {
            (0, 0)
        } else {
            (
                self.restore_mp(percent_of(self.base.mp, rules.mp_regen_percent)),
                self.restore_stamina(percent_of(self.base.stamina, rules.stamina_regen_percent)),
            )
        };

        for skill in &mut self.skills {
            skill.tick_cooldown();
        }

        TurnStartReport {
            periodic_damage: tick.damage,
            periodic_heal: tick.heal,
            expired: tick.expired,
            mp_regained,
            stamina_regained,
            eliminated: self.eliminated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::{SkillCategory, TargetFilter};
    use crate::stats::StatKind;

    fn unit() -> Unit {
        Unit::new(UnitId::new("u1"), "Tester", TeamId::new("t1"), Stats::default())
    }

    #[test]
    fn test_damage_floors_at_zero_and_eliminates() {
        let mut u = unit();
        let receipt = u.receive_damage(30);
        assert_eq!(receipt.dealt, 30);
        assert_eq!(u.hp(), 70);
        assert!(!receipt.eliminated);

        let receipt = u.receive_damage(500);
        assert_eq!(receipt.dealt, 70);
        assert_eq!(u.hp(), 0);
        assert!(receipt.eliminated);
        assert!(u.is_eliminated());

        // Further damage and healing are no-ops.
        assert_eq!(u.receive_damage(10), DamageReceipt::default());
        assert_eq!(u.receive_heal(50), 0);
        assert_eq!(u.hp(), 0);
        assert!(u.is_eliminated());
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut u = unit();
        u.receive_damage(10);
        assert_eq!(u.receive_heal(50), 10);
        assert_eq!(u.hp(), u.max_hp());
    }

    #[test]
    fn test_revive() {
        let mut u = unit();
        assert!(!u.revive(10));
        u.receive_damage(1000);
        assert!(u.revive(0));
        assert_eq!(u.hp(), 1);
        assert!(u.is_alive());
        u.receive_damage(1000);
        assert!(u.revive(5000));
        assert_eq!(u.hp(), u.max_hp());
    }

    #[test]
    fn test_consume_resources() {
        let mut u = unit();
        assert!(u.consume_mp(20).is_ok());
        assert_eq!(u.mp(), 30);
        assert_eq!(
            u.consume_mp(31),
            Err(ResourceError::InsufficientMp {
                required: 31,
                available: 30
            })
        );
        assert_eq!(u.mp(), 30);

        assert!(u.consume_stamina(50).is_ok());
        assert!(matches!(
            u.consume_stamina(1),
            Err(ResourceError::InsufficientStamina { .. })
        ));
        assert_eq!(u.stamina(), 0);
    }

    #[test]
    fn test_status_modifiers_apply_and_revert() {
        let mut u = unit();
        let atk = u.stats().atk;
        u.add_status(
            Status::new(StatusType::Buff, 2, 0).with_modifier(StatModifier::new(StatKind::Atk, 10)),
        );
        assert_eq!(u.stats().atk, atk + 10);

        u.remove_status(StatusType::Buff);
        assert_eq!(u.stats().atk, atk);
    }

    #[test]
    fn test_standalone_modifiers() {
        let mut u = unit();
        let spd = u.stats().spd;
        let slow = StatModifier::new(StatKind::Spd, -3);
        u.apply_stat_modifier(slow);
        assert_eq!(u.stats().spd, spd - 3);
        assert!(u.remove_stat_modifier(slow));
        assert!(!u.remove_stat_modifier(slow));
        assert_eq!(u.stats().spd, spd);
    }

    #[test]
    fn test_blocking_statuses() {
        let mut u = unit();
        assert!(u.can_act() && u.can_move());

        u.add_status(Status::new(StatusType::Root, 1, 0));
        assert!(u.can_act());
        assert!(!u.can_move());

        u.add_status(Status::new(StatusType::Stun, 1, 0));
        assert!(!u.can_act());
    }

    #[test]
    fn test_sleep_breaks_on_damage() {
        let mut u = unit();
        u.add_status(Status::new(StatusType::Sleep, 3, 0));
        assert!(!u.can_act());
        u.receive_damage(1);
        assert!(u.can_act());
    }

    #[test]
    fn test_new_turn_regen_and_cooldowns() {
        let skill =
            Skill::new("s", "S", SkillCategory::Magic, 2, TargetFilter::Enemies).with_cooldown(2);
        let mut u = unit().with_skill(&skill);
        u.consume_mp(50).unwrap();
        u.consume_stamina(50).unwrap();
        u.skill_mut(&SkillId::new("s")).unwrap().trigger_cooldown();
        u.spend_action();
        u.spend_movement(4);

        let report = u.new_turn(&TurnStartRules::default());
        assert_eq!(report.mp_regained, 5);
        assert_eq!(report.stamina_regained, 10);
        assert_eq!(u.mp(), 5);
        assert_eq!(u.stamina(), 10);
        assert_eq!(u.skill(&SkillId::new("s")).unwrap().cooldown, 1);
        assert_eq!(u.actions_remaining(), 1);
        assert_eq!(u.movement_remaining(), u.stats().mov);

        u.new_turn(&TurnStartRules::default());
        u.new_turn(&TurnStartRules::default());
        assert_eq!(u.skill(&SkillId::new("s")).unwrap().cooldown, 0);
    }

    #[test]
    fn test_regen_capped_at_max() {
        let mut u = unit();
        let report = u.new_turn(&TurnStartRules::default());
        assert_eq!(report.mp_regained, 0);
        assert_eq!(u.mp(), u.base_stats().mp);
    }

    #[test]
    fn test_poison_can_eliminate_at_turn_start() {
        let mut u = unit();
        u.receive_damage(95);
        u.add_status(Status::new(StatusType::Poison, 3, 10));
        let report = u.new_turn(&TurnStartRules::default());
        assert!(report.eliminated);
        assert_eq!(report.periodic_damage, 5);
        assert!(u.is_eliminated());
        assert!(u.statuses().is_empty());
    }
}
