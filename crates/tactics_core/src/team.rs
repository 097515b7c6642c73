//! Teams own their member units.

use serde::{Deserialize, Serialize};

use crate::ids::{TeamId, UnitId};
use crate::unit::Unit;

/// A side in the combat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    name: String,
    color: String,
    is_ai: bool,
    units: Vec<Unit>,
}

impl Team {
    /// Create an empty team.
    #[must_use]
    pub fn new(id: TeamId, name: impl Into<String>, color: impl Into<String>, is_ai: bool) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            is_ai,
            units: Vec::new(),
        }
    }

    /// Add a member.
    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.add_unit(unit);
        self
    }

    /// Add a member. The unit's stored team id is checked when the combat
    /// initializes.
    pub fn add_unit(&mut self, unit: Unit) {
        self.units.push(unit);
    }

    /// Team id.
    #[must_use]
    pub const fn id(&self) -> &TeamId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Color tag for front-ends.
    #[must_use]
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Returns true if the team is computer-controlled.
    #[must_use]
    pub const fn is_ai(&self) -> bool {
        self.is_ai
    }

    /// All members.
    #[must_use]
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// All members, mutably.
    pub fn units_mut(&mut self) -> &mut [Unit] {
        &mut self.units
    }

    /// Look up a member.
    #[must_use]
    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| u.id() == id)
    }

    /// Look up a member mutably.
    pub fn unit_mut(&mut self, id: &UnitId) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id() == id)
    }

    /// Members still in the fight.
    pub fn living_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| u.is_alive())
    }

    /// Returns true if at least one member is still in the fight.
    #[must_use]
    pub fn has_living_units(&self) -> bool {
        self.units.iter().any(Unit::is_alive)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if the team has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
