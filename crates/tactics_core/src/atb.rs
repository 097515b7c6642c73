//! Active Time Battle scheduling.
//!
//! Every living unit on a team that has not fled owns a readiness gauge.
//! Each scheduler tick adds the unit's current SPD to its gauge; a unit is
//! ready once its gauge reaches the threshold. Among ready units the highest
//! gauge goes first, ties resolved by unit id.

use std::collections::BTreeMap;

use tracing::trace;

use crate::combat::Combat;
use crate::ids::UnitId;

/// Readiness gauges for every combatant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtbScheduler {
    threshold: u32,
    gauges: BTreeMap<UnitId, u32>,
    ticks: u64,
}

impl AtbScheduler {
    /// Create a scheduler. A zero threshold is treated as 1.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            gauges: BTreeMap::new(),
            ticks: 0,
        }
    }

    /// Readiness threshold.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Scheduler ticks elapsed.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current gauge of a unit (0 if unknown).
    #[must_use]
    pub fn gauge(&self, unit: &UnitId) -> u32 {
        self.gauges.get(unit).copied().unwrap_or(0)
    }

    /// Units that may take turns: alive and on a team that has not fled.
    fn candidates(combat: &Combat) -> Vec<(UnitId, u32)> {
        combat
            .units()
            .filter(|u| u.is_alive() && !combat.has_fled(u.team_id()))
            .map(|u| (u.id().clone(), u.stats().spd.max(1)))
            .collect()
    }

    /// Advance gauges until at least one candidate is ready.
    ///
    /// Returns false if nobody can take a turn.
    pub fn advance_until_ready(&mut self, combat: &Combat) -> bool {
        let candidates = Self::candidates(combat);
        if candidates.is_empty() {
            return false;
        }

        while !candidates
            .iter()
            .any(|(id, _)| self.gauge(id) >= self.threshold)
        {
            for (id, spd) in &candidates {
                let gauge = self.gauges.entry(id.clone()).or_insert(0);
                *gauge = gauge.saturating_add(*spd);
            }
            self.ticks += 1;
        }
        trace!(ticks = self.ticks, "ATB advanced");
        true
    }

    /// The ready unit that acts next, if any.
    #[must_use]
    pub fn next_ready(&self, combat: &Combat) -> Option<UnitId> {
        Self::candidates(combat)
            .into_iter()
            .map(|(id, _)| {
                let gauge = self.gauge(&id);
                (id, gauge)
            })
            .filter(|(_, gauge)| *gauge >= self.threshold)
            .min_by(|(a_id, a_gauge), (b_id, b_gauge)| {
                b_gauge.cmp(a_gauge).then_with(|| a_id.cmp(b_id))
            })
            .map(|(id, _)| id)
    }

    /// Empty a unit's gauge after it takes its turn.
    pub fn reset(&mut self, unit: &UnitId) {
        self.gauges.insert(unit.clone(), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, Position};
    use crate::ids::TeamId;
    use crate::stats::Stats;
    use crate::team::Team;
    use crate::unit::Unit;

    fn combat(fast_spd: u32, slow_spd: u32) -> Combat {
        let red = TeamId::new("red");
        let blue = TeamId::new("blue");
        Combat::new("c", Grid::new(5, 5))
            .with_team(Team::new(red.clone(), "Red", "red", false).with_unit(
                Unit::new(
                    UnitId::new("fast"),
                    "Fast",
                    red,
                    Stats {
                        spd: fast_spd,
                        ..Stats::default()
                    },
                )
                .with_position(Position::new(0, 0)),
            ))
            .with_team(Team::new(blue.clone(), "Blue", "blue", true).with_unit(
                Unit::new(
                    UnitId::new("slow"),
                    "Slow",
                    blue,
                    Stats {
                        spd: slow_spd,
                        ..Stats::default()
                    },
                )
                .with_position(Position::new(4, 4)),
            ))
    }

    #[test]
    fn test_faster_unit_acts_more_often() {
        let combat = combat(20, 10);
        let mut atb = AtbScheduler::new(100);
        let mut turns = Vec::new();
        for _ in 0..6 {
            assert!(atb.advance_until_ready(&combat));
            let unit = atb.next_ready(&combat).unwrap();
            atb.reset(&unit);
            turns.push(unit.to_string());
        }
        let fast = turns.iter().filter(|t| *t == "fast").count();
        assert_eq!(fast, 4);
        assert_eq!(turns[0], "fast");
    }

    #[test]
    fn test_ties_resolve_by_id() {
        let combat = combat(10, 10);
        let mut atb = AtbScheduler::new(100);
        atb.advance_until_ready(&combat);
        assert_eq!(atb.next_ready(&combat), Some(UnitId::new("fast")));
        atb.reset(&UnitId::new("fast"));
        assert_eq!(atb.next_ready(&combat), Some(UnitId::new("slow")));
    }

    #[test]
    fn test_zero_speed_still_progresses() {
        let combat = combat(0, 0);
        let mut atb = AtbScheduler::new(5);
        assert!(atb.advance_until_ready(&combat));
        assert_eq!(atb.ticks(), 5);
    }

    #[test]
    fn test_eliminated_units_are_skipped() {
        let mut combat = combat(10, 50);
        combat.unit_mut(&UnitId::new("slow")).unwrap().receive_damage(10_000);
        let mut atb = AtbScheduler::new(100);
        atb.advance_until_ready(&combat);
        assert_eq!(atb.next_ready(&combat), Some(UnitId::new("fast")));
        assert_eq!(atb.gauge(&UnitId::new("slow")), 0);
    }
}
