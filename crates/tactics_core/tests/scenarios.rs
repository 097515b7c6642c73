//! End-to-end combat scenarios.
//!
//! Each test builds a small battle with the shared fixtures and checks one
//! observable rule: damage floor, resource checks, path costs, victory and
//! flee odds.

use std::collections::HashSet;

use tactics_core::command::flee_chance;
use tactics_core::prelude::*;
use tactics_test_utils::fixtures::{pos, team, UnitBuilder};

fn two_sided(red: Unit, blue: Unit) -> Combat {
    Combat::new("scenario", Grid::new(10, 10))
        .with_team(team(false, vec![red]))
        .with_team(team(true, vec![blue]))
}

#[test]
fn heavy_armor_still_takes_minimum_damage() {
    let mut combat = two_sided(
        UnitBuilder::new("attacker", "red").atk(20).hit(100).at(4, 4).build(),
        UnitBuilder::new("defender", "blue").def(999).at(4, 5).build(),
    );
    combat.set_damage_strategy(Some(DamageStrategy::Physical));

    let result = Command::attack("attacker", "defender").execute(&mut combat).unwrap();

    assert!(matches!(result.effects[0], Effect::Damage { amount: 1, .. }));
    assert_eq!(combat.unit(&UnitId::new("defender")).unwrap().hp(), 99);
}

#[test]
fn expensive_skill_rejected_without_spending_mp() {
    let meteor = Skill::new("meteor", "Meteor", SkillCategory::Magic, 5, TargetFilter::Enemies)
        .with_costs(60, 0);
    let mut combat = two_sided(
        UnitBuilder::new("mage", "red").mp(50).at(1, 1).skill(meteor).build(),
        UnitBuilder::new("orc", "blue").at(2, 1).build(),
    );
    let before = combat.state_hash();

    let err = Command::use_skill("mage", "meteor", vec![UnitId::new("orc")])
        .execute(&mut combat)
        .unwrap_err();

    assert_eq!(
        err,
        CombatError::Validation(ValidationError::InsufficientMp {
            required: 60,
            available: 50
        })
    );
    assert_eq!(combat.unit(&UnitId::new("mage")).unwrap().mp(), 50);
    assert_eq!(combat.state_hash(), before);
}

#[test]
fn manhattan_and_diagonal_path_costs() {
    let grid = Grid::new(10, 10);
    let occupied = HashSet::new();

    let manhattan = Pathfinder::with_heuristic(PathHeuristic::Manhattan)
        .find_path(&grid, pos(0, 0), pos(3, 3), &occupied)
        .unwrap();
    assert_eq!(manhattan.cost, 6);
    assert_eq!(manhattan.path.len(), 6);
    assert_eq!(manhattan.path.last(), Some(&pos(3, 3)));

    let diagonal = Pathfinder::with_heuristic(PathHeuristic::Diagonal)
        .find_path(&grid, pos(0, 0), pos(3, 3), &occupied)
        .unwrap();
    assert_eq!(diagonal.cost, 3);
    assert_eq!(diagonal.path.len(), 3);
}

#[test]
fn wiped_team_loses_and_survivor_wins() {
    let mut combat = two_sided(
        UnitBuilder::new("knight", "red").at(0, 0).build(),
        UnitBuilder::new("orc", "blue").at(5, 5).build(),
    );
    let red = TeamId::new("red");
    let blue = TeamId::new("blue");
    assert_eq!(combat.verify_victory_conditions(&red), VictoryOutcome::Continue);

    combat.unit_mut(&UnitId::new("orc")).unwrap().receive_damage(500);

    assert_eq!(combat.verify_victory_conditions(&red), VictoryOutcome::Victory);
    assert_eq!(combat.verify_victory_conditions(&blue), VictoryOutcome::Defeat);
    assert_eq!(combat.winner(), Some(&red));
}

#[test]
fn nobody_left_is_defeat_for_everyone() {
    let mut combat = two_sided(
        UnitBuilder::new("knight", "red").at(0, 0).build(),
        UnitBuilder::new("orc", "blue").at(5, 5).build(),
    );
    combat.unit_mut(&UnitId::new("knight")).unwrap().receive_damage(500);
    combat.unit_mut(&UnitId::new("orc")).unwrap().receive_damage(500);

    assert_eq!(combat.verify_victory_conditions(&TeamId::new("red")), VictoryOutcome::Defeat);
    assert_eq!(combat.verify_victory_conditions(&TeamId::new("blue")), VictoryOutcome::Defeat);
    assert_eq!(combat.resolution(), CombatResolution::Draw);
}

fn flee_successes(runner_spd: u32, enemy_spd: u32) -> usize {
    (0..100u64)
        .filter(|&seed| {
            let config = CombatConfig::default().with_seed(seed);
            let runner = UnitBuilder::new("runner", "red").spd(runner_spd).at(0, 0).build();
            let mut combat = Combat::with_config("flee", Grid::new(10, 10), config)
                .with_team(team(false, vec![runner]))
                .with_team(team(
                    true,
                    vec![
                        UnitBuilder::new("orc", "blue").spd(enemy_spd).at(9, 9).build(),
                        UnitBuilder::new("troll", "blue").spd(enemy_spd).at(8, 9).build(),
                    ],
                ));
            let result = Command::flee("runner").execute(&mut combat).unwrap();
            matches!(result.effects[0], Effect::Fled { .. })
        })
        .count()
}

#[test]
fn fast_units_usually_escape() {
    let successes = flee_successes(600, 10);
    assert!(successes >= 70, "only {successes}/100 escapes");
}

#[test]
fn slow_units_rarely_escape() {
    let successes = flee_successes(1, 600);
    assert!(successes <= 20, "{successes}/100 escapes");
}

#[test]
fn flee_chance_is_clamped() {
    let combat = two_sided(
        UnitBuilder::new("runner", "red").spd(5000).at(0, 0).build(),
        UnitBuilder::new("orc", "blue").spd(1).at(5, 5).build(),
    );
    assert_eq!(flee_chance(&combat, combat.unit(&UnitId::new("runner")).unwrap()), 95);
    assert_eq!(flee_chance(&combat, combat.unit(&UnitId::new("orc")).unwrap()), 10);
}

#[test]
fn flee_disabled_by_config() {
    let config = CombatConfig {
        allow_flee: false,
        ..CombatConfig::default()
    };
    let mut combat = Combat::with_config("no-flee", Grid::new(5, 5), config)
        .with_team(team(false, vec![UnitBuilder::new("runner", "red").at(0, 0).build()]))
        .with_team(team(true, vec![UnitBuilder::new("orc", "blue").at(4, 4).build()]));

    let err = Command::flee("runner").execute(&mut combat).unwrap_err();
    assert_eq!(err, CombatError::Validation(ValidationError::FleeNotAllowed));
}
