//! Proptest strategies for combat property tests.
//!
//! These generate random but reproducible inputs: stat blocks, grids with
//! obstacles, skills, statuses and damage strategies.

use proptest::prelude::*;
use tactics_core::area::AreaShape;
use tactics_core::damage::{DamageStrategy, FixedDamage, HybridDamage, ProportionalDamage};
use tactics_core::grid::{Grid, Position, TerrainType};
use tactics_core::math::{from_percent, Fixed};
use tactics_core::pathfinding::PathHeuristic;
use tactics_core::skill::{Skill, SkillCategory, TargetFilter};
use tactics_core::stats::Stats;
use tactics_core::status::{Status, StatusType};

/// Largest grid side generated.
pub const MAX_GRID_SIDE: u32 = 12;

/// Generate a stat block, including extreme defenses.
pub fn arb_stats() -> impl Strategy<Value = Stats> {
    (
        (1u32..500, 0u32..200, 0u32..200),
        (0u32..300, 0u32..1000, 0u32..300, 0u32..1000),
        (1u32..50, 0u32..8, 0u32..=100),
    )
        .prop_map(|((hp, mp, stamina), (atk, def, matk, mdef), (spd, mov, hit_chance))| Stats {
            hp,
            mp,
            stamina,
            atk,
            def,
            matk,
            mdef,
            spd,
            mov,
            hit_chance,
        })
}

/// Generate an amount of damage or healing.
pub fn arb_amount() -> impl Strategy<Value = u32> {
    prop_oneof![0u32..50, 50u32..500, Just(u32::MAX)]
}

/// Generate a position inside a `width` x `height` grid.
pub fn arb_position(width: u32, height: u32) -> impl Strategy<Value = Position> {
    (0..width.max(1), 0..height.max(1)).prop_map(|(x, y)| Position::new(x, y))
}

/// Generate a fixed-point multiplier between 0 and 2.
pub fn arb_multiplier() -> impl Strategy<Value = Fixed> {
    (0u32..=200).prop_map(from_percent)
}

/// Generate a terrain type.
pub fn arb_terrain() -> impl Strategy<Value = TerrainType> {
    prop_oneof![
        4 => Just(TerrainType::Normal),
        2 => Just(TerrainType::Obstacle),
        1 => Just(TerrainType::Difficult),
        1 => Just(TerrainType::Hazard),
        1 => Just(TerrainType::Heal),
    ]
}

/// Generate an open grid with no obstacles.
pub fn arb_open_grid() -> impl Strategy<Value = Grid> {
    (2..=MAX_GRID_SIDE, 2..=MAX_GRID_SIDE).prop_map(|(w, h)| Grid::new(w, h))
}

/// Generate a grid with random terrain.
pub fn arb_grid() -> impl Strategy<Value = Grid> {
    (2..=MAX_GRID_SIDE, 2..=MAX_GRID_SIDE).prop_flat_map(|(w, h)| {
        let cells = (w * h) as usize;
        proptest::collection::vec(arb_terrain(), cells).prop_map(move |terrain| {
            let mut grid = Grid::new(w, h);
            for (i, kind) in terrain.into_iter().enumerate() {
                let i = i as u32;
                grid.set_terrain(Position::new(i % w, i / w), kind);
            }
            grid
        })
    })
}

/// Generate a grid together with two of its positions.
pub fn arb_grid_with_endpoints() -> impl Strategy<Value = (Grid, Position, Position)> {
    arb_grid().prop_flat_map(|grid| {
        let (w, h) = (grid.width(), grid.height());
        (Just(grid), arb_position(w, h), arb_position(w, h))
    })
}

/// Generate a pathfinding heuristic.
pub fn arb_heuristic() -> impl Strategy<Value = PathHeuristic> {
    prop_oneof![
        Just(PathHeuristic::Manhattan),
        Just(PathHeuristic::Euclidean),
        Just(PathHeuristic::Diagonal),
    ]
}

/// Generate a status type.
pub fn arb_status_type() -> impl Strategy<Value = StatusType> {
    prop_oneof![
        Just(StatusType::Stun),
        Just(StatusType::Root),
        Just(StatusType::Silence),
        Just(StatusType::Poison),
        Just(StatusType::Burn),
        Just(StatusType::Sleep),
        Just(StatusType::Paralysis),
        Just(StatusType::Regen),
        Just(StatusType::Shield),
        Just(StatusType::Buff),
        Just(StatusType::Debuff),
    ]
}

/// Generate a status without stat modifiers.
pub fn arb_status() -> impl Strategy<Value = Status> {
    (arb_status_type(), 1u32..6, 0u32..40)
        .prop_map(|(kind, duration, magnitude)| Status::new(kind, duration, magnitude))
}

/// Generate a skill category.
pub fn arb_category() -> impl Strategy<Value = SkillCategory> {
    prop_oneof![
        Just(SkillCategory::Attack),
        Just(SkillCategory::Magic),
        Just(SkillCategory::Heal),
        Just(SkillCategory::Buff),
        Just(SkillCategory::Debuff),
        Just(SkillCategory::Utility),
    ]
}

/// Generate an area shape.
pub fn arb_area() -> impl Strategy<Value = AreaShape> {
    prop_oneof![
        Just(AreaShape::Single),
        (0u32..3).prop_map(|radius| AreaShape::Cross { radius }),
        (0u32..3).prop_map(|radius| AreaShape::Circle { radius }),
        (1u32..4).prop_map(|length| AreaShape::Line { length }),
    ]
}

/// Generate a skill with random power and costs.
pub fn arb_skill() -> impl Strategy<Value = Skill> {
    (arb_category(), 1u32..5, 0u32..80, 0u32..60, arb_multiplier(), arb_area()).prop_map(
        |(category, range, power, mp, scaling, area)| {
            let filter = match category {
                SkillCategory::Attack | SkillCategory::Magic | SkillCategory::Debuff => {
                    TargetFilter::Enemies
                }
                SkillCategory::Heal | SkillCategory::Buff | SkillCategory::Utility => {
                    TargetFilter::Allies
                }
            };
            Skill::new("generated", "Generated", category, range, filter)
                .with_costs(mp, 0)
                .with_power(power, scaling)
                .with_area(area)
        },
    )
}

/// Generate any damage strategy.
pub fn arb_damage_strategy() -> impl Strategy<Value = DamageStrategy> {
    prop_oneof![
        Just(DamageStrategy::Physical),
        Just(DamageStrategy::Magical),
        (arb_multiplier(), arb_multiplier())
            .prop_map(|(p, m)| DamageStrategy::Hybrid(HybridDamage::new(p, m))),
        (0u32..200).prop_map(|value| DamageStrategy::Fixed(FixedDamage { value })),
        (0u32..=100, any::<bool>()).prop_map(|(percent, use_current_hp)| {
            DamageStrategy::Proportional(ProportionalDamage {
                percent,
                use_current_hp,
            })
        }),
    ]
}

/// Generate a sequence of seeds for batch tests.
pub fn arb_seeds(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::vec(any::<u64>(), 1..=max_len.max(1))
}
