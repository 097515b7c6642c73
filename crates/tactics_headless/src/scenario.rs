//! Scenario loading and configuration.
//!
//! Scenarios define a battle for headless runs: the grid and its terrain,
//! the skill pool, teams with their units and inventories, and optional rule
//! overrides. Everything is plain RON.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tactics_core::combat::Combat;
use tactics_core::config::CombatConfig;
use tactics_core::damage::DamageStrategy;
use tactics_core::error::ConfigError;
use tactics_core::grid::{Grid, Position, TerrainType};
use tactics_core::ids::{IdGenerator, SkillId, TeamId, UnitId};
use tactics_core::inventory::{Bag, ItemCatalog};
use tactics_core::skill::Skill;
use tactics_core::stats::Stats;
use tactics_core::team::Team;
use tactics_core::unit::Unit;
use thiserror::Error;
use tracing::debug;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A unit refers to a skill the scenario does not define.
    #[error("Unit {unit} refers to unknown skill {skill}")]
    UnknownSkill {
        /// Unit with the bad reference.
        unit: String,
        /// Missing skill id.
        skill: String,
    },
    /// A terrain patch lies outside the grid.
    #[error("Terrain patch at ({0}, {1}) is outside the grid")]
    TerrainOutOfBounds(u32, u32),
    /// The rule override is invalid.
    #[error("Invalid rules: {0}")]
    Config(#[from] ConfigError),
}

/// One terrain override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainPatch {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Terrain to place.
    pub terrain: TerrainType,
}

/// One unit placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSetup {
    /// Unit id, unique across the scenario. Left empty, an id is generated
    /// (`unit-1`, `unit-2`, ...) in file order.
    #[serde(default)]
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    /// Stat block; omitted fields take their defaults.
    #[serde(default)]
    pub stats: Stats,
    /// Starting cell.
    pub position: (u32, u32),
    /// Skill ids from the scenario's skill pool.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Basic attack range.
    #[serde(default = "default_weapon_range")]
    pub weapon_range: u32,
}

const fn default_weapon_range() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

impl UnitSetup {
    /// Create a placement with default stats.
    pub fn new(id: impl Into<String>, x: u32, y: u32) -> Self {
        Self {
            id: id.into(),
            name: None,
            stats: Stats::default(),
            position: (x, y),
            skills: Vec::new(),
            weapon_range: default_weapon_range(),
        }
    }

    /// Set the stat block.
    #[must_use]
    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    /// Add skills by id.
    #[must_use]
    pub fn with_skills(mut self, skills: &[&str]) -> Self {
        self.skills.extend(skills.iter().map(|s| (*s).to_string()));
        self
    }
}

/// One team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSetup {
    /// Team id.
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    /// Display color.
    #[serde(default)]
    pub color: String,
    /// Whether the AI controls this team.
    #[serde(default = "default_true")]
    pub is_ai: bool,
    /// Units on this team.
    pub units: Vec<UnitSetup>,
    /// Starting items by id.
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Grid dimensions (width, height) in cells.
    pub grid_size: (u32, u32),
    /// Terrain overrides; every other cell is Normal.
    #[serde(default)]
    pub terrain: Vec<TerrainPatch>,
    /// Skills units may reference.
    #[serde(default)]
    pub skills: Vec<Skill>,
    /// Item catalog; the standard catalog when omitted.
    #[serde(default)]
    pub items: Option<ItemCatalog>,
    /// Teams in turn-order-independent declaration order.
    pub teams: Vec<TeamSetup>,
    /// Rule overrides. The seed is replaced per run.
    #[serde(default)]
    pub rules: Option<CombatConfig>,
    /// Damage override for every damaging skill.
    #[serde(default)]
    pub damage_strategy: Option<DamageStrategy>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A built-in 3v3 skirmish on a 10x10 map.
    #[must_use]
    pub fn skirmish() -> Self {
        use tactics_core::area::AreaShape;
        use tactics_core::math::from_percent;
        use tactics_core::skill::{SkillCategory, TargetFilter};
        use tactics_core::status::{Status, StatusType};

        let skills = vec![
            Skill::new("slash", "Slash", SkillCategory::Attack, 1, TargetFilter::Enemies)
                .with_costs(0, 10)
                .with_power(8, from_percent(50)),
            Skill::new("fireball", "Fireball", SkillCategory::Magic, 4, TargetFilter::Enemies)
                .with_costs(15, 0)
                .with_cooldown(2)
                .with_power(10, from_percent(100))
                .with_area(AreaShape::Cross { radius: 1 }),
            Skill::new("mend", "Mend", SkillCategory::Heal, 3, TargetFilter::Allies)
                .with_costs(10, 0)
                .with_power(25, from_percent(50)),
            Skill::new("venom", "Venom", SkillCategory::Attack, 2, TargetFilter::Enemies)
                .with_costs(0, 15)
                .with_power(4, from_percent(30))
                .with_status(Status::new(StatusType::Poison, 3, 5)),
        ];

        let stats = |hp, atk, def, spd| Stats {
            hp,
            atk,
            def,
            spd,
            ..Stats::default()
        };

        let terrain = [(4, 4), (5, 5), (4, 5)]
            .into_iter()
            .map(|(x, y)| TerrainPatch {
                x,
                y,
                terrain: TerrainType::Obstacle,
            })
            .chain([(2, 7), (7, 2)].into_iter().map(|(x, y)| TerrainPatch {
                x,
                y,
                terrain: TerrainType::Difficult,
            }))
            .collect();

        Self {
            name: "Standard 3v3 Skirmish".to_string(),
            description: "Mirrored melee, caster and healer on each side".to_string(),
            grid_size: (10, 10),
            terrain,
            skills,
            items: None,
            teams: vec![
                TeamSetup {
                    id: "red".to_string(),
                    name: Some("Red Company".to_string()),
                    color: "red".to_string(),
                    is_ai: true,
                    units: vec![
                        UnitSetup::new("red-knight", 1, 2)
                            .with_stats(stats(120, 24, 14, 11))
                            .with_skills(&["slash"]),
                        UnitSetup::new("red-mage", 0, 1)
                            .with_stats(stats(70, 10, 8, 10))
                            .with_skills(&["fireball"]),
                        UnitSetup::new("red-cleric", 1, 0)
                            .with_stats(stats(80, 12, 10, 9))
                            .with_skills(&["mend"]),
                    ],
                    inventory: BTreeMap::from([("potion".to_string(), 2)]),
                },
                TeamSetup {
                    id: "blue".to_string(),
                    name: Some("Blue Legion".to_string()),
                    color: "blue".to_string(),
                    is_ai: true,
                    units: vec![
                        UnitSetup::new("blue-knight", 8, 7)
                            .with_stats(stats(120, 24, 14, 11))
                            .with_skills(&["slash"]),
                        UnitSetup::new("blue-rogue", 9, 8)
                            .with_stats(stats(85, 20, 8, 13))
                            .with_skills(&["venom"]),
                        UnitSetup::new("blue-cleric", 8, 9)
                            .with_stats(stats(80, 12, 10, 9))
                            .with_skills(&["mend"]),
                    ],
                    inventory: BTreeMap::from([("potion".to_string(), 2)]),
                },
            ],
            rules: None,
            damage_strategy: None,
        }
    }

    /// Total units across all teams.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.teams.iter().map(|t| t.units.len()).sum()
    }

    /// Build a fresh combat for one run.
    ///
    /// Setup problems the engine checks itself (overlaps, empty teams) are
    /// left for [`tactics_core::engine::CombatEngine::initialize`] to report.
    pub fn build_combat(&self, seed: u64) -> Result<Combat, ScenarioError> {
        let mut config = self.rules.clone().unwrap_or_default();
        config.seed = seed;
        config.validate()?;

        let (width, height) = self.grid_size;
        let mut grid = Grid::new(width, height);
        for patch in &self.terrain {
            if !grid.set_terrain(Position::new(patch.x, patch.y), patch.terrain) {
                return Err(ScenarioError::TerrainOutOfBounds(patch.x, patch.y));
            }
        }

        let pool: BTreeMap<SkillId, &Skill> =
            self.skills.iter().map(|s| (s.id.clone(), s)).collect();
        let items = self.items.clone().unwrap_or_else(ItemCatalog::standard);

        let mut combat = Combat::with_config(self.name.as_str(), grid, config).with_items(items);
        combat.set_damage_strategy(self.damage_strategy);

        let mut ids = IdGenerator::new();
        for setup in &self.teams {
            let team_id = TeamId::new(setup.id.as_str());
            let mut team = Team::new(
                team_id.clone(),
                setup.name.clone().unwrap_or_else(|| setup.id.clone()),
                setup.color.as_str(),
                setup.is_ai,
            );
            for unit in &setup.units {
                let id = if unit.id.is_empty() {
                    ids.unit_id()
                } else {
                    UnitId::new(unit.id.as_str())
                };
                team.add_unit(Self::build_unit(id, unit, &team_id, &pool)?);
            }
            combat.add_team(team);

            let bag = setup
                .inventory
                .iter()
                .fold(Bag::new(), |bag, (item, qty)| bag.with(item.as_str(), *qty));
            combat = combat.with_inventory(team_id, bag);
        }

        debug!(
            scenario = %self.name,
            seed,
            teams = self.teams.len(),
            units = self.unit_count(),
            "Combat built"
        );
        Ok(combat)
    }

    fn build_unit(
        id: UnitId,
        setup: &UnitSetup,
        team: &TeamId,
        pool: &BTreeMap<SkillId, &Skill>,
    ) -> Result<Unit, ScenarioError> {
        let (x, y) = setup.position;
        let name = setup.name.clone().unwrap_or_else(|| id.to_string());
        let mut unit = Unit::new(id, name, team.clone(), setup.stats)
            .with_position(Position::new(x, y))
            .with_weapon_range(setup.weapon_range);

        for skill_id in &setup.skills {
            let skill = pool
                .get(&SkillId::new(skill_id.as_str()))
                .ok_or_else(|| ScenarioError::UnknownSkill {
                    unit: unit.id().to_string(),
                    skill: skill_id.clone(),
                })?;
            unit.learn_skill(skill);
        }
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario() {
        let scenario = Scenario::default();
        assert_eq!(scenario.teams.len(), 2);
        assert_eq!(scenario.teams[0].id, "red");
        assert_eq!(scenario.teams[1].id, "blue");
        assert_eq!(scenario.unit_count(), 6);
    }

    #[test]
    fn test_skirmish_builds_valid_combat() {
        let combat = Scenario::skirmish().build_combat(42).unwrap();
        assert_eq!(combat.validate_setup(), Ok(()));
        assert_eq!(combat.config().seed, 42);
        assert_eq!(combat.units().count(), 6);
        let knight = combat.unit(&UnitId::new("red-knight")).unwrap();
        assert_eq!(knight.skills().len(), 1);
        assert_eq!(combat.grid().terrain(Position::new(4, 4)), Some(TerrainType::Obstacle));
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                grid_size: (6, 6),
                terrain: [(x: 2, y: 2, terrain: Obstacle)],
                skills: [
                    (id: "jab", name: "Jab", category: Attack, range: 1, power: 5,
                     target_filter: Enemies),
                ],
                teams: [
                    (id: "a", units: [
                        (id: "a1", position: (0, 0), skills: ["jab"], stats: (hp: 40)),
                    ]),
                    (id: "b", is_ai: false, units: [(id: "b1", position: (5, 5))],
                     inventory: {"potion": 1}),
                ],
                rules: Some((allow_flee: false)),
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.teams[0].units[0].stats.hp, 40);
        assert_eq!(scenario.teams[0].units[0].stats.atk, Stats::default().atk);
        assert!(scenario.teams[0].is_ai);
        assert!(!scenario.teams[1].is_ai);

        let combat = scenario.build_combat(1).unwrap();
        assert!(!combat.config().allow_flee);
        assert_eq!(combat.inventory(&TeamId::new("b")).map(|bag| bag.iter().count()), Some(1));
    }

    #[test]
    fn test_omitted_unit_ids_are_generated() {
        let ron = r#"
            Scenario(
                name: "Anonymous",
                grid_size: (6, 6),
                teams: [
                    (id: "a", units: [(position: (0, 0)), (id: "captain", position: (0, 1))]),
                    (id: "b", units: [(position: (5, 5))]),
                ],
            )
        "#;
        let combat = Scenario::from_ron_str(ron).unwrap().build_combat(0).unwrap();
        assert_eq!(combat.validate_setup(), Ok(()));

        let first = combat.unit(&UnitId::new("unit-1")).unwrap();
        assert_eq!(first.team_id(), &TeamId::new("a"));
        assert_eq!(first.name(), "unit-1");
        assert!(combat.unit(&UnitId::new("captain")).is_some());
        assert_eq!(combat.unit(&UnitId::new("unit-2")).unwrap().team_id(), &TeamId::new("b"));
    }

    #[test]
    fn test_unknown_skill_rejected() {
        let mut scenario = Scenario::skirmish();
        scenario.teams[0].units[0].skills.push("meteor".to_string());
        assert!(matches!(
            scenario.build_combat(0),
            Err(ScenarioError::UnknownSkill { skill, .. }) if skill == "meteor"
        ));
    }

    #[test]
    fn test_terrain_out_of_bounds_rejected() {
        let mut scenario = Scenario::skirmish();
        scenario.terrain.push(TerrainPatch {
            x: 10,
            y: 0,
            terrain: TerrainType::Obstacle,
        });
        assert!(matches!(scenario.build_combat(0), Err(ScenarioError::TerrainOutOfBounds(10, 0))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/definitely/not/here.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
