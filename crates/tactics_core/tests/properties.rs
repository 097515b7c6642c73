//! Property tests for combat rules that must hold for every input.

use std::collections::HashSet;

use proptest::prelude::*;
use tactics_core::pathfinding::PathStrategy;
use tactics_core::prelude::*;
use tactics_core::status::StatusManager;
use tactics_test_utils::fixtures::UnitBuilder;
use tactics_test_utils::strategies::{
    arb_amount, arb_damage_strategy, arb_grid_with_endpoints, arb_heuristic, arb_position,
    arb_skill, arb_stats, arb_status, MAX_GRID_SIDE,
};

fn is_adjacent(strategy: &dyn PathStrategy, a: Position, b: Position) -> bool {
    strategy
        .neighbours()
        .iter()
        .any(|&(dx, dy)| a.offset(dx, dy) == Some(b))
}

/// Grids of only open ground and walls, where every step costs 1.
fn arb_uniform_grid() -> impl Strategy<Value = (Grid, Position, Position)> {
    (2..=MAX_GRID_SIDE, 2..=MAX_GRID_SIDE).prop_flat_map(|(w, h)| {
        (
            proptest::collection::vec(prop::bool::weighted(0.2), (w * h) as usize),
            arb_position(w, h),
            arb_position(w, h),
        )
            .prop_map(move |(walls, start, goal)| {
                let mut grid = Grid::new(w, h);
                for (i, wall) in walls.into_iter().enumerate() {
                    let cell = Position::new(i as u32 % w, i as u32 / w);
                    if wall && cell != start && cell != goal {
                        grid.set_terrain(cell, TerrainType::Obstacle);
                    }
                }
                (grid, start, goal)
            })
    })
}

proptest! {
    #[test]
    fn damage_is_at_least_one(
        attacker in arb_stats(),
        defender in arb_stats(),
        skill in arb_skill(),
        strategy in arb_damage_strategy(),
    ) {
        let a = UnitBuilder::new("a", "red").stats(attacker).build();
        let d = UnitBuilder::new("d", "blue").stats(defender).build();
        prop_assert!(strategy.calculate(&a, &d, &skill) >= 1);
    }

    #[test]
    fn hp_never_below_zero(
        stats in arb_stats(),
        hits in proptest::collection::vec(arb_amount(), 1..8)
    ) {
        let mut unit = UnitBuilder::new("u", "red").stats(stats).build();
        for hit in hits {
            let was_eliminated = unit.is_eliminated();
            unit.receive_damage(hit);
            prop_assert!(unit.hp() <= unit.max_hp());
            prop_assert_eq!(unit.is_eliminated(), unit.hp() == 0);
            if was_eliminated {
                prop_assert!(unit.is_eliminated());
            }
        }
    }

    #[test]
    fn elimination_sticks_until_revive(
        stats in arb_stats(),
        heal in arb_amount(),
        revive_hp in 0u32..1000
    ) {
        let mut unit = UnitBuilder::new("u", "red").stats(stats).build();
        unit.receive_damage(u32::MAX);
        prop_assert!(unit.is_eliminated());
        prop_assert_eq!(unit.receive_heal(heal), 0);
        prop_assert!(unit.is_eliminated());

        prop_assert!(unit.revive(revive_hp));
        prop_assert!(!unit.is_eliminated());
        prop_assert!(unit.hp() >= 1 && unit.hp() <= unit.max_hp());
    }

    #[test]
    fn heals_never_exceed_max(
        stats in arb_stats(),
        damage in arb_amount(),
        heals in proptest::collection::vec(arb_amount(), 1..6)
    ) {
        let mut unit = UnitBuilder::new("u", "red").stats(stats).build();
        unit.receive_damage(damage.min(stats.hp.saturating_sub(1)));
        for heal in heals {
            unit.receive_heal(heal);
            prop_assert!(unit.hp() <= stats.hp);
        }
    }

    #[test]
    fn status_refresh_keeps_one_entry(first in arb_status(), extra in 1u32..10) {
        let mut manager = StatusManager::new();
        manager.add(first.clone());
        let second = Status::new(first.kind, first.duration + extra, first.magnitude);
        manager.add(second);
        prop_assert_eq!(manager.len(), 1);
        prop_assert_eq!(manager.get(first.kind).map(|s| s.duration), Some(first.duration + extra));

        let shorter = Status::new(first.kind, 1, first.magnitude);
        manager.add(shorter);
        prop_assert_eq!(manager.len(), 1);
        prop_assert_eq!(manager.get(first.kind).map(|s| s.duration), Some(first.duration + extra));
    }

    #[test]
    fn uniform_paths_cost_their_length(
        (grid, start, goal) in arb_uniform_grid(),
        heuristic in arb_heuristic()
    ) {
        let pathfinder = Pathfinder::with_heuristic(heuristic);
        if let Ok(result) = pathfinder.find_path(&grid, start, goal, &HashSet::new()) {
            prop_assert_eq!(result.path.len() as u32, result.cost);
            if start != goal {
                prop_assert_eq!(result.path.last(), Some(&goal));
            }
        }
    }

    #[test]
    fn path_steps_are_legal(
        (grid, start, goal) in arb_grid_with_endpoints(),
        heuristic in arb_heuristic(),
        blockers in proptest::collection::vec((0..MAX_GRID_SIDE, 0..MAX_GRID_SIDE), 0..10),
    ) {
        let occupied: HashSet<Position> = blockers
            .into_iter()
            .map(|(x, y)| Position::new(x, y))
            .filter(|p| *p != start && *p != goal)
            .collect();
        let pathfinder = Pathfinder::with_heuristic(heuristic);
        if let Ok(result) = pathfinder.find_path(&grid, start, goal, &occupied) {
            let mut previous = start;
            for &cell in &result.path {
                prop_assert!(is_adjacent(pathfinder.strategy(), previous, cell));
                prop_assert!(grid.is_passable(cell));
                prop_assert!(!occupied.contains(&cell));
                previous = cell;
            }
            let cost: u32 = result.path.iter().filter_map(|&c| grid.movement_cost(c)).sum();
            prop_assert_eq!(cost, result.cost);
        }
    }

    #[test]
    fn pathfinding_is_deterministic(
        (grid, start, goal) in arb_grid_with_endpoints(),
        heuristic in arb_heuristic()
    ) {
        let pathfinder = Pathfinder::with_heuristic(heuristic);
        let occupied = HashSet::new();
        let first = pathfinder.find_path(&grid, start, goal, &occupied);
        let second = pathfinder.find_path(&grid, start, goal, &occupied);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn reachable_cells_agree_with_find_path(
        (grid, start, _goal) in arb_grid_with_endpoints(),
        heuristic in arb_heuristic(),
        budget in 0u32..6
    ) {
        let pathfinder = Pathfinder::with_heuristic(heuristic);
        let occupied = HashSet::new();
        for (cell, cost) in pathfinder.reachable_cells(&grid, start, budget, &occupied) {
            prop_assert!(cost <= budget);
            let path = pathfinder.find_path(&grid, start, cell, &occupied);
            prop_assert_eq!(path.map(|p| p.cost), Ok(cost));
        }
    }
}
