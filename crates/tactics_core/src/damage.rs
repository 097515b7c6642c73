//! Damage and healing calculation strategies.
//!
//! Every damaging strategy floors its result at [`MIN_DAMAGE`], however
//! lopsided the attacker and defender stats are. The per-combat strategy can
//! be swapped at runtime (arena rules); otherwise [`DamageStrategy::for_category`]
//! picks one from the skill category.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal, percent_of, scale, Fixed};
use crate::skill::{Skill, SkillCategory};
use crate::unit::Unit;

/// Minimum damage floor - every hit deals at least 1.
pub const MIN_DAMAGE: u32 = 1;

/// Share of the defender's MDEF added back to magical damage as penetration.
pub const MAGIC_PENETRATION_PERCENT: u32 = 20;

/// Computes the damage one unit deals to another with a skill.
pub trait DamageCalculator {
    /// Damage dealt, never below [`MIN_DAMAGE`].
    fn calculate(&self, attacker: &Unit, defender: &Unit, skill: &Skill) -> u32;
}

fn floor_damage(raw: i64) -> u32 {
    u32::try_from(raw.max(i64::from(MIN_DAMAGE))).unwrap_or(u32::MAX)
}

fn physical_raw(attacker: &Unit, defender: &Unit, skill: &Skill) -> i64 {
    let atk = i64::from(attacker.stats().atk);
    let def = i64::from(defender.stats().def);
    (atk - def) + i64::from(skill.power) + scale(atk, skill.scaling)
}

fn magical_raw(attacker: &Unit, defender: &Unit, skill: &Skill) -> i64 {
    let matk = i64::from(attacker.stats().matk);
    let mdef = i64::from(defender.stats().mdef);
    let penetration = mdef * i64::from(MAGIC_PENETRATION_PERCENT) / 100;
    (matk - mdef) + i64::from(skill.power) + scale(matk, skill.scaling) + penetration
}

/// `(ATK - DEF) + power + scaling * ATK`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhysicalDamage;

impl DamageCalculator for PhysicalDamage {
    fn calculate(&self, attacker: &Unit, defender: &Unit, skill: &Skill) -> u32 {
        floor_damage(physical_raw(attacker, defender, skill))
    }
}

/// `(MATK - MDEF) + power + scaling * MATK + 20% * MDEF`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MagicalDamage;

impl DamageCalculator for MagicalDamage {
    fn calculate(&self, attacker: &Unit, defender: &Unit, skill: &Skill) -> u32 {
        floor_damage(magical_raw(attacker, defender, skill))
    }
}

/// Weighted blend of the physical and magical formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridDamage {
    /// Weight of the physical component.
    #[serde(with = "fixed_decimal")]
    pub physical_weight: Fixed,
    /// Weight of the magical component.
    #[serde(with = "fixed_decimal")]
    pub magical_weight: Fixed,
}

impl HybridDamage {
    /// Create a blend.
    #[must_use]
    pub const fn new(physical_weight: Fixed, magical_weight: Fixed) -> Self {
        Self {
            physical_weight,
            magical_weight,
        }
    }
}

impl DamageCalculator for HybridDamage {
    fn calculate(&self, attacker: &Unit, defender: &Unit, skill: &Skill) -> u32 {
        let physical = scale(physical_raw(attacker, defender, skill), self.physical_weight);
        let magical = scale(magical_raw(attacker, defender, skill), self.magical_weight);
        floor_damage(physical + magical)
    }
}

/// Constant damage, ignoring stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedDamage {
    /// Damage per hit.
    pub value: u32,
}

impl DamageCalculator for FixedDamage {
    fn calculate(&self, _attacker: &Unit, _defender: &Unit, _skill: &Skill) -> u32 {
        self.value.max(MIN_DAMAGE)
    }
}

/// A percentage of the defender's current or maximum HP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProportionalDamage {
    /// Percentage of HP, 0-100.
    pub percent: u32,
    /// Use current HP instead of max HP.
    pub use_current_hp: bool,
}

impl DamageCalculator for ProportionalDamage {
    fn calculate(&self, _attacker: &Unit, defender: &Unit, _skill: &Skill) -> u32 {
        let pool = if self.use_current_hp {
            defender.hp()
        } else {
            defender.max_hp()
        };
        floor_damage(i64::from(percent_of(pool, self.percent.min(100))))
    }
}

/// The closed set of damage strategies a combat can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageStrategy {
    /// See [`PhysicalDamage`].
    Physical,
    /// See [`MagicalDamage`].
    Magical,
    /// See [`HybridDamage`].
    Hybrid(HybridDamage),
    /// See [`FixedDamage`].
    Fixed(FixedDamage),
    /// See [`ProportionalDamage`].
    Proportional(ProportionalDamage),
}

impl DamageStrategy {
    /// Strategy matching a skill category. `None` for categories that never
    /// deal damage.
    #[must_use]
    pub const fn for_category(category: SkillCategory) -> Option<Self> {
        match category {
            SkillCategory::Attack => Some(Self::Physical),
            SkillCategory::Magic => Some(Self::Magical),
            SkillCategory::Heal
            | SkillCategory::Buff
            | SkillCategory::Debuff
            | SkillCategory::Utility => None,
        }
    }
}

impl DamageCalculator for DamageStrategy {
    fn calculate(&self, attacker: &Unit, defender: &Unit, skill: &Skill) -> u32 {
        match self {
            Self::Physical => PhysicalDamage.calculate(attacker, defender, skill),
            Self::Magical => MagicalDamage.calculate(attacker, defender, skill),
            Self::Hybrid(inner) => inner.calculate(attacker, defender, skill),
            Self::Fixed(inner) => inner.calculate(attacker, defender, skill),
            Self::Proportional(inner) => inner.calculate(attacker, defender, skill),
        }
    }
}

/// Healing from a skill: `power + scaling * MATK`, at least 1.
#[must_use]
pub fn heal_amount(caster: &Unit, skill: &Skill) -> u32 {
    let matk = i64::from(caster.stats().matk);
    floor_damage(i64::from(skill.power) + scale(matk, skill.scaling))
}
