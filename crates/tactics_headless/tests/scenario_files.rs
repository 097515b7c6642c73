//! Bundled scenario files load and play to the end.

use std::path::PathBuf;

use tactics_core::ids::UnitId;
use tactics_headless::{run_game, BatchConfig, GameConfig, GameOutcome, Scenario};

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name)
}

#[test]
fn bundled_skirmish_matches_builtin_layout() {
    let file = Scenario::load(scenario_path("skirmish.ron")).unwrap();
    let builtin = Scenario::skirmish();

    assert_eq!(file.name, builtin.name);
    assert_eq!(file.grid_size, builtin.grid_size);
    assert_eq!(file.terrain, builtin.terrain);
    assert_eq!(file.teams, builtin.teams);
    let ids: Vec<_> = file.skills.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["slash", "fireball", "mend", "venom"]);
}

#[test]
fn bundled_skirmish_plays_out() {
    let scenario = Scenario::load(scenario_path("skirmish.ron")).unwrap();
    let combat = scenario.build_combat(5).unwrap();
    assert!(combat.unit(&UnitId::new("blue-rogue")).is_some());

    let result = run_game(&GameConfig::new(scenario, 5)).unwrap();
    assert_ne!(result.metrics.outcome, GameOutcome::TurnLimit);
    let survivors: u32 = result.metrics.teams.values().map(|t| t.units_alive).sum();
    assert!(survivors < 6);
}

#[test]
fn batch_from_scenario_file() {
    let config = BatchConfig::new(4).with_scenario(scenario_path("skirmish.ron")).with_seed(100);
    let results = tactics_headless::run_batch(config).unwrap();

    assert_eq!(results.games.len(), 4);
    assert!(results.errors.is_empty());
    assert_eq!(results.scenario, "Standard 3v3 Skirmish");
    let summary = &results.summary;
    let decided = summary.wins.values().sum::<u32>() + summary.draws + summary.fled;
    assert_eq!(decided + results.summary.turn_limits, 4);
}
