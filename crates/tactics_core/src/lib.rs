//! # Tactics Core
//!
//! Turn-based tactical combat resolution engine.
//!
//! This crate contains **only** combat logic:
//! - No rendering
//! - No network
//! - No system randomness (every roll comes from a seeded [`rng::CombatRng`])
//! - No floating-point math in combat formulas (uses fixed-point)
//!
//! Given the same setup, seed and command stream, a battle always ends in
//! the same state, which keeps AI batch runs and replays reproducible.
//!
//! ## Crate Structure
//!
//! - [`engine`] - Turn state machine driver, the main entry point
//! - [`state_machine`] - Turn states, events and transition history
//! - [`command`] / [`validation`] / [`invoker`] - Validated, reversible actions
//! - [`combat`] - The match aggregate: teams, grid, lifecycle, victory
//! - [`pathfinding`] - A* strategies and movement range queries
//! - [`damage`] - Damage and healing strategies
//! - [`unit`] / [`status`] / [`stats`] - Combatants and their effects
//! - [`ai`] - Deterministic command selection for AI teams

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod area;
pub mod atb;
pub mod combat;
pub mod command;
pub mod config;
pub mod damage;
pub mod engine;
pub mod error;
pub mod events;
pub mod grid;
pub mod ids;
pub mod inventory;
pub mod invoker;
pub mod math;
pub mod pathfinding;
pub mod rng;
pub mod skill;
pub mod state_machine;
pub mod stats;
pub mod status;
pub mod team;
pub mod unit;
pub mod validation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::AiController;
    pub use crate::area::AreaShape;
    pub use crate::combat::{Combat, CombatStatus, VictoryOutcome};
    pub use crate::command::{Action, Command, CommandResult, Effect};
    pub use crate::config::CombatConfig;
    pub use crate::damage::{DamageCalculator, DamageStrategy};
    pub use crate::engine::{CombatEngine, Notification, RunOutcome, TurnPhase};
    pub use crate::error::{CombatError, PathError, Result, SetupError, ValidationError};
    pub use crate::events::{CombatEvent, CombatResolution, DomainEvent};
    pub use crate::grid::{Grid, Position, TerrainType};
    pub use crate::ids::{CombatId, IdGenerator, ItemId, SkillId, TeamId, UnitId};
    pub use crate::inventory::{Bag, InventoryProvider, ItemCatalog, ItemDef, ItemEffect};
    pub use crate::math::Fixed;
    pub use crate::pathfinding::{PathHeuristic, PathResult, Pathfinder};
    pub use crate::skill::{Skill, SkillCategory, TargetFilter};
    pub use crate::state_machine::{TurnEvent, TurnState};
    pub use crate::stats::{StatKind, StatModifier, Stats};
    pub use crate::status::{Status, StatusType};
    pub use crate::team::Team;
    pub use crate::unit::Unit;
}
