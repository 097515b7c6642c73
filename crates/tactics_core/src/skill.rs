//! Skill definitions and per-unit cooldown state.
//!
//! Skills are plain data. A unit receives its own clone when it learns a
//! skill, so cooldown counters never leak between units sharing a
//! definition.

use serde::{Deserialize, Serialize};

use crate::area::AreaShape;
use crate::ids::SkillId;
use crate::math::{fixed_decimal, Fixed};
use crate::status::Status;

/// Skill category. Drives the damage strategy factory and how effects apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillCategory {
    /// Physical damage.
    Attack,
    /// Magical damage.
    Magic,
    /// Restores HP.
    Heal,
    /// Applies a beneficial status.
    Buff,
    /// Applies a harmful status.
    Debuff,
    /// Cleanses harmful statuses, optionally applying its own.
    Utility,
}

impl SkillCategory {
    /// Returns true if skills of this category deal damage.
    #[must_use]
    pub const fn is_damaging(self) -> bool {
        matches!(self, Self::Attack | Self::Magic)
    }
}

/// Which units a skill may target, relative to the caster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFilter {
    /// Living units of other teams.
    Enemies,
    /// Living units of the caster's team, caster included.
    Allies,
    /// The caster only.
    SelfOnly,
    /// Any living unit.
    All,
}

/// A skill definition plus the owning unit's cooldown state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Skill {
    /// Identifier.
    pub id: SkillId,
    /// Display name.
    pub name: String,
    /// Category.
    pub category: SkillCategory,
    /// Maximum Manhattan distance to the primary target.
    pub range: u32,
    /// MP cost.
    #[serde(default)]
    pub mp_cost: u32,
    /// Stamina cost.
    #[serde(default)]
    pub stamina_cost: u32,
    /// Turns the skill is unavailable after use.
    #[serde(default)]
    pub cooldown_max: u32,
    /// Turns remaining before the skill can be used again.
    #[serde(default)]
    pub cooldown: u32,
    /// Base power added to damage or healing.
    #[serde(default)]
    pub power: u32,
    /// Multiplier applied to the relevant attack stat.
    #[serde(with = "fixed_decimal", default = "zero")]
    pub scaling: Fixed,
    /// Valid targets.
    pub target_filter: TargetFilter,
    /// Area of effect around the primary target.
    #[serde(default)]
    pub area: AreaShape,
    /// Status applied to every affected unit.
    #[serde(default)]
    pub applies: Option<Status>,
}

fn zero() -> Fixed {
    Fixed::ZERO
}

impl Skill {
    /// Create a single-target skill with no costs, cooldown or scaling.
    #[must_use]
    pub fn new(
        id: impl Into<SkillId>,
        name: impl Into<String>,
        category: SkillCategory,
        range: u32,
        target_filter: TargetFilter,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            range,
            mp_cost: 0,
            stamina_cost: 0,
            cooldown_max: 0,
            cooldown: 0,
            power: 0,
            scaling: Fixed::ZERO,
            target_filter,
            area: AreaShape::Single,
            applies: None,
        }
    }

    /// The implicit weapon strike behind the Attack command.
    #[must_use]
    pub fn basic_attack(range: u32) -> Self {
        Self::new(
            "basic-attack",
            "Attack",
            SkillCategory::Attack,
            range,
            TargetFilter::Enemies,
        )
    }

    /// Set MP and Stamina costs.
    #[must_use]
    pub fn with_costs(mut self, mp: u32, stamina: u32) -> Self {
        self.mp_cost = mp;
        self.stamina_cost = stamina;
        self
    }

    /// Set the cooldown length.
    #[must_use]
    pub fn with_cooldown(mut self, turns: u32) -> Self {
        self.cooldown_max = turns;
        self
    }

    /// Set base power and stat scaling.
    #[must_use]
    pub fn with_power(mut self, power: u32, scaling: Fixed) -> Self {
        self.power = power;
        self.scaling = scaling;
        self
    }

    /// Set the area of effect.
    #[must_use]
    pub fn with_area(mut self, area: AreaShape) -> Self {
        self.area = area;
        self
    }

    /// Attach a status applied on hit.
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.applies = Some(status);
        self
    }

    /// Returns true if the skill is off cooldown.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.cooldown == 0
    }

    /// Start the cooldown after use.
    pub fn trigger_cooldown(&mut self) {
        self.cooldown = self.cooldown_max;
    }

    /// Count one turn off the cooldown, flooring at 0.
    pub fn tick_cooldown(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }
}
