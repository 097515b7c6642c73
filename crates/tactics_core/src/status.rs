//! Timed status effects and the per-unit collection that manages them.
//!
//! Statuses never stack: applying a type that is already present refreshes
//! it, keeping the longer duration and the stronger magnitude.

use serde::{Deserialize, Serialize};

use crate::stats::StatModifier;

/// Status effect kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusType {
    /// Cannot act or move.
    Stun,
    /// Cannot move.
    Root,
    /// Cannot use skills.
    Silence,
    /// Loses `magnitude` HP each turn start.
    Poison,
    /// Loses `magnitude` HP each turn start.
    Burn,
    /// Cannot act or move; broken by damage.
    Sleep,
    /// Cannot act or move.
    Paralysis,
    /// Regains `magnitude` HP each turn start.
    Regen,
    /// Absorbs up to `magnitude` incoming damage.
    Shield,
    /// Beneficial stat modifiers.
    Buff,
    /// Harmful stat modifiers.
    Debuff,
}

impl StatusType {
    /// Returns true if this status prevents the unit from taking actions.
    #[must_use]
    pub const fn blocks_actions(self) -> bool {
        matches!(self, Self::Stun | Self::Sleep | Self::Paralysis)
    }

    /// Returns true if this status prevents the unit from moving.
    #[must_use]
    pub const fn blocks_movement(self) -> bool {
        matches!(self, Self::Stun | Self::Sleep | Self::Paralysis | Self::Root)
    }

    /// Returns true if this status prevents skill use.
    #[must_use]
    pub const fn blocks_skills(self) -> bool {
        matches!(self, Self::Silence) || self.blocks_actions()
    }

    /// Returns true for effects a cleanse removes.
    #[must_use]
    pub const fn is_harmful(self) -> bool {
        !matches!(self, Self::Regen | Self::Shield | Self::Buff)
    }

    /// Short display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stun => "stun",
            Self::Root => "root",
            Self::Silence => "silence",
            Self::Poison => "poison",
            Self::Burn => "burn",
            Self::Sleep => "sleep",
            Self::Paralysis => "paralysis",
            Self::Regen => "regen",
            Self::Shield => "shield",
            Self::Buff => "buff",
            Self::Debuff => "debuff",
        }
    }
}

/// One active (or template) status effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    /// Effect kind.
    pub kind: StatusType,
    /// Turn starts remaining before the effect expires.
    pub duration: u32,
    /// Periodic amount, or shield capacity.
    pub magnitude: u32,
    /// Stat changes active while the status lasts.
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
}

impl Status {
    /// Create a status with no stat modifiers.
    #[must_use]
    pub const fn new(kind: StatusType, duration: u32, magnitude: u32) -> Self {
        Self {
            kind,
            duration,
            magnitude,
            modifiers: Vec::new(),
        }
    }

    /// Attach a stat modifier.
    #[must_use]
    pub fn with_modifier(mut self, modifier: StatModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

/// Outcome of adding a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusApplication {
    /// A new entry was created.
    Added,
    /// An existing entry of the same type was refreshed.
    Refreshed,
}

/// Aggregate result of one turn-start status pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTick {
    /// Periodic damage to apply.
    pub damage: u32,
    /// Periodic healing to apply.
    pub heal: u32,
    /// Statuses that ran out and were purged.
    pub expired: Vec<StatusType>,
}

/// Per-unit collection of active statuses, at most one per type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusManager {
    active: Vec<Status>,
}

impl StatusManager {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a status, refreshing an existing one of the same type.
    pub fn add(&mut self, status: Status) -> StatusApplication {
        if let Some(existing) = self.active.iter_mut().find(|s| s.kind == status.kind) {
            existing.duration = existing.duration.max(status.duration);
            existing.magnitude = existing.magnitude.max(status.magnitude);
            if !status.modifiers.is_empty() {
                existing.modifiers = status.modifiers;
            }
            StatusApplication::Refreshed
        } else {
            self.active.push(status);
            StatusApplication::Added
        }
    }

    /// Remove a status by type.
    pub fn remove(&mut self, kind: StatusType) -> Option<Status> {
        let index = self.active.iter().position(|s| s.kind == kind)?;
        Some(self.active.remove(index))
    }

    /// Remove every harmful status, returning the removed types.
    pub fn remove_harmful(&mut self) -> Vec<StatusType> {
        let mut removed = Vec::new();
        self.active.retain(|s| {
            if s.kind.is_harmful() {
                removed.push(s.kind);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop every status.
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Apply periodic effects, decrement durations and purge expired entries.
    pub fn tick(&mut self) -> StatusTick {
        let mut tick = StatusTick::default();

        for status in &mut self.active {
            match status.kind {
                StatusType::Poison | StatusType::Burn => {
                    tick.damage = tick.damage.saturating_add(status.magnitude);
                }
                StatusType::Regen => {
                    tick.heal = tick.heal.saturating_add(status.magnitude);
                }
                _ => {}
            }
            status.duration = status.duration.saturating_sub(1);
        }

        self.active.retain(|s| {
            if s.duration == 0 {
                tick.expired.push(s.kind);
                false
            } else {
                true
            }
        });

        tick
    }

    /// Soak damage with an active shield. Returns the damage that gets
    /// through; the shield is removed once depleted.
    pub fn absorb(&mut self, damage: u32) -> u32 {
        let Some(index) = self.active.iter().position(|s| s.kind == StatusType::Shield) else {
            return damage;
        };

        let shield = &mut self.active[index];
        let absorbed = shield.magnitude.min(damage);
        shield.magnitude -= absorbed;
        if shield.magnitude == 0 {
            self.active.remove(index);
        }
        damage - absorbed
    }

    /// Look up an active status.
    #[must_use]
    pub fn get(&self, kind: StatusType) -> Option<&Status> {
        self.active.iter().find(|s| s.kind == kind)
    }

    /// Returns true if a status of this type is active.
    #[must_use]
    pub fn has(&self, kind: StatusType) -> bool {
        self.get(kind).is_some()
    }

    /// Returns true if any active status blocks actions.
    #[must_use]
    pub fn blocks_actions(&self) -> bool {
        self.active.iter().any(|s| s.kind.blocks_actions())
    }

    /// Returns true if any active status blocks movement.
    #[must_use]
    pub fn blocks_movement(&self) -> bool {
        self.active.iter().any(|s| s.kind.blocks_movement())
    }

    /// Returns true if any active status blocks skill use.
    #[must_use]
    pub fn blocks_skills(&self) -> bool {
        self.active.iter().any(|s| s.kind.blocks_skills())
    }

    /// Every stat modifier contributed by active statuses.
    pub fn modifiers(&self) -> impl Iterator<Item = &StatModifier> {
        self.active.iter().flat_map(|s| s.modifiers.iter())
    }

    /// Iterate active statuses in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Status> {
        self.active.iter()
    }

    /// Number of active statuses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns true if no status is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatKind;

    #[test]
    fn test_refresh_does_not_stack() {
        let mut statuses = StatusManager::new();
        assert_eq!(
            statuses.add(Status::new(StatusType::Poison, 2, 5)),
            StatusApplication::Added
        );
        assert_eq!(
            statuses.add(Status::new(StatusType::Poison, 4, 3)),
            StatusApplication::Refreshed
        );
        assert_eq!(statuses.len(), 1);
        let poison = statuses.get(StatusType::Poison).unwrap();
        assert_eq!(poison.duration, 4);
        assert_eq!(poison.magnitude, 5);

        // Shorter reapplication keeps the longer duration.
        statuses.add(Status::new(StatusType::Poison, 1, 1));
        assert_eq!(statuses.get(StatusType::Poison).unwrap().duration, 4);
    }

    #[test]
    fn test_tick_periodic_and_expiry() {
        let mut statuses = StatusManager::new();
        statuses.add(Status::new(StatusType::Poison, 1, 5));
        statuses.add(Status::new(StatusType::Burn, 3, 2));
        statuses.add(Status::new(StatusType::Regen, 2, 4));

        let tick = statuses.tick();
        assert_eq!(tick.damage, 7);
        assert_eq!(tick.heal, 4);
        assert_eq!(tick.expired, vec![StatusType::Poison]);
        assert_eq!(statuses.len(), 2);

        let tick = statuses.tick();
        assert_eq!(tick.damage, 2);
        assert_eq!(tick.expired, vec![StatusType::Regen]);
    }

    #[test]
    fn test_blocking_flags() {
        let mut statuses = StatusManager::new();
        assert!(!statuses.blocks_actions());

        statuses.add(Status::new(StatusType::Root, 2, 0));
        assert!(statuses.blocks_movement());
        assert!(!statuses.blocks_actions());

        statuses.add(Status::new(StatusType::Silence, 2, 0));
        assert!(statuses.blocks_skills());
        assert!(!statuses.blocks_actions());

        statuses.add(Status::new(StatusType::Stun, 1, 0));
        assert!(statuses.blocks_actions());
    }

    #[test]
    fn test_shield_absorbs_then_breaks() {
        let mut statuses = StatusManager::new();
        statuses.add(Status::new(StatusType::Shield, 3, 10));

        assert_eq!(statuses.absorb(4), 0);
        assert_eq!(statuses.get(StatusType::Shield).unwrap().magnitude, 6);

        assert_eq!(statuses.absorb(9), 3);
        assert!(!statuses.has(StatusType::Shield));
        assert_eq!(statuses.absorb(5), 5);
    }

    #[test]
    fn test_remove_harmful_keeps_buffs() {
        let mut statuses = StatusManager::new();
        statuses.add(Status::new(StatusType::Poison, 3, 2));
        statuses.add(
            Status::new(StatusType::Buff, 3, 0).with_modifier(StatModifier::new(StatKind::Atk, 5)),
        );
        statuses.add(Status::new(StatusType::Silence, 2, 0));

        let mut removed = statuses.remove_harmful();
        removed.sort();
        assert_eq!(removed, vec![StatusType::Silence, StatusType::Poison]);
        assert!(statuses.has(StatusType::Buff));
        assert_eq!(statuses.modifiers().count(), 1);
    }
}
