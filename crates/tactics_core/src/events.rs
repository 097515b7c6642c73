//! Typed domain events and the append-only log a combat accumulates.
//!
//! Events are the inspectable record of a battle. Each one is wrapped in a
//! [`DomainEvent`] envelope carrying the combat id, a strictly increasing
//! version and a wall-clock timestamp. Timestamps are informational only and
//! never feed back into simulation state.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::grid::Position;
use crate::ids::{CombatId, ItemId, SkillId, TeamId, UnitId};
use crate::status::StatusType;

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
#[must_use]
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// How a finished combat ended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatResolution {
    /// One team remains.
    Victory(TeamId),
    /// No team remains.
    Draw,
    /// At least one team fled.
    Fled(Vec<TeamId>),
    /// The combat was cancelled from outside.
    Cancelled,
}

/// Something that happened in a combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// The combat left the waiting state.
    CombatStarted {
        /// Participating teams.
        teams: Vec<TeamId>,
    },
    /// A command executed successfully.
    ActionExecuted {
        /// Acting unit.
        actor: UnitId,
        /// Command kind, e.g. `"attack"`.
        action: String,
        /// Human-readable outcome.
        message: String,
    },
    /// A unit lost HP.
    DamageDealt {
        /// Source unit, `None` for periodic or terrain damage.
        source: Option<UnitId>,
        /// Damaged unit.
        target: UnitId,
        /// HP removed.
        amount: u32,
        /// Damage soaked by a shield.
        absorbed: u32,
    },
    /// A unit regained HP.
    HealApplied {
        /// Source unit, `None` for periodic or terrain healing.
        source: Option<UnitId>,
        /// Healed unit.
        target: UnitId,
        /// HP restored.
        amount: u32,
    },
    /// A status was applied or refreshed.
    StatusApplied {
        /// Affected unit.
        target: UnitId,
        /// Status type.
        status: StatusType,
        /// Duration after application.
        duration: u32,
    },
    /// A unit dropped to 0 HP.
    UnitEliminated {
        /// Eliminated unit.
        unit: UnitId,
    },
    /// An eliminated unit came back.
    UnitRevived {
        /// Revived unit.
        unit: UnitId,
        /// HP after revival.
        hp: u32,
    },
    /// A unit moved along a path.
    UnitMoved {
        /// Moving unit.
        unit: UnitId,
        /// Start cell.
        from: Position,
        /// End cell.
        to: Position,
        /// Movement points spent.
        cost: u32,
    },
    /// A skill was activated.
    SkillUsed {
        /// Caster.
        actor: UnitId,
        /// Skill id.
        skill: SkillId,
        /// Units inside the area of effect.
        targets: Vec<UnitId>,
    },
    /// An item was consumed.
    ItemUsed {
        /// User.
        actor: UnitId,
        /// Item id.
        item: ItemId,
        /// Target unit.
        target: UnitId,
    },
    /// A team successfully fled.
    TeamFled {
        /// Fleeing team.
        team: TeamId,
    },
    /// The combat ended.
    CombatEnded {
        /// Final resolution.
        resolution: CombatResolution,
        /// Turn counter at the end.
        turns: u32,
    },
}

impl CombatEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CombatStarted { .. } => "combat_started",
            Self::ActionExecuted { .. } => "action_executed",
            Self::DamageDealt { .. } => "damage_dealt",
            Self::HealApplied { .. } => "heal_applied",
            Self::StatusApplied { .. } => "status_applied",
            Self::UnitEliminated { .. } => "unit_eliminated",
            Self::UnitRevived { .. } => "unit_revived",
            Self::UnitMoved { .. } => "unit_moved",
            Self::SkillUsed { .. } => "skill_used",
            Self::ItemUsed { .. } => "item_used",
            Self::TeamFled { .. } => "team_fled",
            Self::CombatEnded { .. } => "combat_ended",
        }
    }
}

/// An event wrapped with its aggregate metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Combat that produced the event.
    pub aggregate_id: CombatId,
    /// Aggregate version after this event.
    pub version: u64,
    /// Wall-clock time of recording.
    pub timestamp_ms: u64,
    /// The event itself.
    pub event: CombatEvent,
}

/// Append-only event log with a commit marker.
///
/// Recording bumps the version. Committing only clears the pending list; the
/// version never goes back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    version: u64,
    uncommitted: Vec<DomainEvent>,
}

impl EventLog {
    /// Create an empty log at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current aggregate version (number of events ever recorded).
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Append an event and return its envelope.
    pub fn record(&mut self, aggregate_id: &CombatId, event: CombatEvent) -> &DomainEvent {
        self.version += 1;
        self.uncommitted.push(DomainEvent {
            aggregate_id: aggregate_id.clone(),
            version: self.version,
            timestamp_ms: timestamp_ms(),
            event,
        });
        let last = self.uncommitted.len() - 1;
        &self.uncommitted[last]
    }

    /// Events recorded since the last commit, oldest first.
    #[must_use]
    pub fn uncommitted(&self) -> &[DomainEvent] {
        &self.uncommitted
    }

    /// Drop the pending events, returning them to the caller.
    pub fn mark_committed(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.uncommitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_increase_across_commits() {
        let id = CombatId::new("c1");
        let mut log = EventLog::new();
        log.record(&id, CombatEvent::CombatStarted { teams: vec![] });
        log.record(&id, CombatEvent::UnitEliminated { unit: UnitId::new("u") });
        assert_eq!(log.version(), 2);
        assert_eq!(log.uncommitted().len(), 2);
        assert_eq!(log.uncommitted()[1].version, 2);

        let committed = log.mark_committed();
        assert_eq!(committed.len(), 2);
        assert!(log.uncommitted().is_empty());

        let event = log.record(&id, CombatEvent::TeamFled { team: TeamId::new("t") });
        assert_eq!(event.version, 3);
        assert_eq!(event.aggregate_id, id);
    }

    #[test]
    fn test_event_names() {
        let event = CombatEvent::SkillUsed {
            actor: UnitId::new("a"),
            skill: SkillId::new("fire"),
            targets: vec![],
        };
        assert_eq!(event.name(), "skill_used");
    }
}
