//! Test fixtures and helpers.
//!
//! Pre-built units, skills and battles for consistent testing.

use fixed::types::I32F32;
use tactics_core::prelude::*;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real combat code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Shorthand for [`Position::new`].
#[must_use]
pub const fn pos(x: u32, y: u32) -> Position {
    Position::new(x, y)
}

/// The standard skill set as a RON document.
pub const STANDARD_SKILLS_RON: &str = r#"[
    (id: "slash", name: "Slash", category: Attack, range: 1,
     stamina_cost: 10, power: 8, scaling: 0.5, target_filter: Enemies),
    (id: "fireball", name: "Fireball", category: Magic, range: 4,
     mp_cost: 15, cooldown_max: 2, power: 10, scaling: 1.0,
     target_filter: Enemies, area: Cross(radius: 1)),
    (id: "mend", name: "Mend", category: Heal, range: 3,
     mp_cost: 10, power: 25, scaling: 0.5, target_filter: Allies),
    (id: "stun-bolt", name: "Stun Bolt", category: Debuff, range: 3,
     mp_cost: 12, cooldown_max: 3, target_filter: Enemies,
     applies: Some((kind: Stun, duration: 1, magnitude: 0))),
    (id: "purify", name: "Purify", category: Utility, range: 2,
     mp_cost: 8, target_filter: Allies,
     applies: Some((kind: Regen, duration: 2, magnitude: 5))),
]"#;

/// Parse the standard skill set.
///
/// # Panics
///
/// Panics if [`STANDARD_SKILLS_RON`] no longer parses.
#[must_use]
pub fn standard_skills() -> Vec<Skill> {
    ron::from_str(STANDARD_SKILLS_RON).expect("standard skills RON is valid")
}

/// Look up one of the standard skills by id.
///
/// # Panics
///
/// Panics if the id is not in the standard set.
#[must_use]
pub fn skill(id: &str) -> Skill {
    standard_skills()
        .into_iter()
        .find(|s| s.id.as_str() == id)
        .unwrap_or_else(|| panic!("no standard skill {id}"))
}

/// Fluent builder for test units.
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    id: UnitId,
    team: TeamId,
    stats: Stats,
    position: Option<Position>,
    skills: Vec<Skill>,
    weapon_range: u32,
}

impl UnitBuilder {
    /// Start a unit with default stats and no position.
    #[must_use]
    pub fn new(id: &str, team: &str) -> Self {
        Self {
            id: UnitId::new(id),
            team: TeamId::new(team),
            stats: Stats::default(),
            position: None,
            skills: Vec::new(),
            weapon_range: 1,
        }
    }

    /// Replace the whole stat block.
    #[must_use]
    pub fn stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    /// Set max HP.
    #[must_use]
    pub fn hp(mut self, hp: u32) -> Self {
        self.stats.hp = hp;
        self
    }

    /// Set max MP.
    #[must_use]
    pub fn mp(mut self, mp: u32) -> Self {
        self.stats.mp = mp;
        self
    }

    /// Set ATK.
    #[must_use]
    pub fn atk(mut self, atk: u32) -> Self {
        self.stats.atk = atk;
        self
    }

    /// Set DEF.
    #[must_use]
    pub fn def(mut self, def: u32) -> Self {
        self.stats.def = def;
        self
    }

    /// Set SPD.
    #[must_use]
    pub fn spd(mut self, spd: u32) -> Self {
        self.stats.spd = spd;
        self
    }

    /// Set hit chance.
    #[must_use]
    pub fn hit(mut self, hit_chance: u32) -> Self {
        self.stats.hit_chance = hit_chance;
        self
    }

    /// Place the unit.
    #[must_use]
    pub fn at(mut self, x: u32, y: u32) -> Self {
        self.position = Some(pos(x, y));
        self
    }

    /// Teach a skill.
    #[must_use]
    pub fn skill(mut self, skill: Skill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Set the basic attack range.
    #[must_use]
    pub fn weapon_range(mut self, range: u32) -> Self {
        self.weapon_range = range;
        self
    }

    /// Build the unit.
    #[must_use]
    pub fn build(self) -> Unit {
        let name = self.id_name();
        let mut unit =
            Unit::new(self.id, name, self.team, self.stats).with_weapon_range(self.weapon_range);
        if let Some(position) = self.position {
            unit = unit.with_position(position);
        }
        for skill in &self.skills {
            unit.learn_skill(skill);
        }
        unit
    }

    fn id_name(&self) -> String {
        let mut chars = self.id.as_str().chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
            .unwrap_or_default()
    }
}

/// Build a team from units. The team id is taken from the first unit.
///
/// # Panics
///
/// Panics if `units` is empty.
#[must_use]
pub fn team(is_ai: bool, units: Vec<Unit>) -> Team {
    let id = units.first().expect("team needs at least one unit").team_id().clone();
    let mut team = Team::new(id.clone(), id.as_str(), id.as_str(), is_ai);
    for unit in units {
        team.add_unit(unit);
    }
    team
}

/// One knight against one orc, both AI, guaranteed hits.
#[must_use]
pub fn duel(seed: u64) -> Combat {
    let knight = UnitBuilder::new("knight", "red").spd(12).hit(100).at(1, 1).build();
    Combat::with_config("duel", Grid::new(6, 6), CombatConfig::default().with_seed(seed))
        .with_team(team(true, vec![knight]))
        .with_team(team(true, vec![UnitBuilder::new("orc", "blue").hit(100).at(4, 4).build()]))
}

/// Three against three on an 8x8 map with terrain, skills and items.
#[must_use]
pub fn skirmish(seed: u64) -> Combat {
    let mut grid = Grid::new(8, 8);
    grid.set_terrain(pos(3, 3), TerrainType::Obstacle);
    grid.set_terrain(pos(4, 4), TerrainType::Obstacle);
    grid.set_terrain(pos(3, 4), TerrainType::Difficult);
    grid.set_terrain(pos(4, 3), TerrainType::Difficult);
    grid.set_terrain(pos(0, 7), TerrainType::Hazard);
    grid.set_terrain(pos(7, 0), TerrainType::Heal);

    let red = team(
        true,
        vec![
            UnitBuilder::new("knight", "red")
                .atk(24)
                .def(14)
                .spd(11)
                .at(1, 1)
                .skill(skill("slash"))
                .build(),
            UnitBuilder::new("mage", "red")
                .hp(70)
                .spd(9)
                .at(0, 2)
                .skill(skill("fireball"))
                .skill(skill("stun-bolt"))
                .build(),
            UnitBuilder::new("cleric", "red")
                .hp(80)
                .spd(10)
                .at(2, 0)
                .skill(skill("mend"))
                .skill(skill("purify"))
                .build(),
        ],
    );
    let blue = team(
        true,
        vec![
            UnitBuilder::new("brute", "blue")
                .hp(130)
                .atk(26)
                .def(8)
                .spd(8)
                .at(6, 6)
                .skill(skill("slash"))
                .build(),
            UnitBuilder::new("archer", "blue").hp(80).spd(13).at(7, 5).weapon_range(3).build(),
            UnitBuilder::new("shaman", "blue")
                .hp(75)
                .spd(10)
                .at(5, 7)
                .skill(skill("mend"))
                .skill(skill("fireball"))
                .build(),
        ],
    );

    Combat::with_config("skirmish", grid, CombatConfig::default().with_seed(seed))
        .with_team(red)
        .with_team(blue)
        .with_items(ItemCatalog::standard())
        .with_inventory("red", Bag::new().with("potion", 2).with("phoenix-down", 1))
        .with_inventory("blue", Bag::new().with("potion", 1).with("bomb", 1))
}
