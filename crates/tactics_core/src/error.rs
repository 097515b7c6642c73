//! Error types for the combat engine.
//!
//! Each concern owns a focused error enum; [`CombatError`] aggregates them so
//! callers can propagate with `?` across module boundaries.

use thiserror::Error;

use crate::grid::Position;
use crate::ids::{ItemId, SkillId, TeamId, UnitId};
use crate::state_machine::TurnState;

/// Result type alias using [`CombatError`].
pub type Result<T> = std::result::Result<T, CombatError>;

/// Top-level error type for all combat engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    /// Malformed match configuration detected during initialization.
    #[error("Setup failed: {0}")]
    Setup(#[from] SetupError),

    /// A command was rejected before any state was touched.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Pathfinding could not produce a usable path.
    #[error("Pathfinding failed: {0}")]
    Path(#[from] PathError),

    /// A direct resource consumption call could not be satisfied.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// The turn state machine refused a transition.
    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Inventory operation failed.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Configuration or scenario data could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A command failed after it started mutating state.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Unit identifier does not exist in this combat.
    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),

    /// Team identifier does not exist in this combat.
    #[error("Unknown team: {0}")]
    UnknownTeam(TeamId),

    /// Invalid combat state for the requested operation.
    #[error("Invalid combat state: {0}")]
    InvalidState(String),
}

/// Errors detected while validating a combat before the first turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// Fewer than two teams were registered.
    #[error("At least 2 teams are required, found {0}")]
    TooFewTeams(usize),

    /// A team has no members.
    #[error("Team {0} has no units")]
    EmptyTeam(TeamId),

    /// A unit was never placed on the grid.
    #[error("Unit {0} has no position")]
    MissingPosition(UnitId),

    /// Grid has a zero dimension.
    #[error("Grid dimensions must be positive, got {width}x{height}")]
    InvalidGrid {
        /// Grid width in cells.
        width: u32,
        /// Grid height in cells.
        height: u32,
    },

    /// A unit's stored team id does not match the team that owns it.
    #[error("Unit {unit} claims team {claimed} but is owned by {owner}")]
    MembershipMismatch {
        /// Offending unit.
        unit: UnitId,
        /// Team id stored on the unit.
        claimed: TeamId,
        /// Team that actually lists the unit.
        owner: TeamId,
    },

    /// A unit is listed by more than one team.
    #[error("Unit {0} belongs to more than one team")]
    DuplicateUnit(UnitId),

    /// A unit was placed outside the grid or on impassable terrain.
    #[error("Unit {unit} placed on invalid cell {position}")]
    InvalidPlacement {
        /// Offending unit.
        unit: UnitId,
        /// Cell it was placed on.
        position: Position,
    },

    /// Two units share a cell.
    #[error("Units {first} and {second} share cell {position}")]
    OverlappingUnits {
        /// First occupant.
        first: UnitId,
        /// Second occupant.
        second: UnitId,
        /// Shared cell.
        position: Position,
    },
}

/// Per-command rule violations. Raising one never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Acting unit does not exist.
    #[error("Actor {0} not found")]
    ActorNotFound(UnitId),

    /// Acting unit is eliminated.
    #[error("Actor {0} is eliminated")]
    ActorEliminated(UnitId),

    /// An active status prevents acting.
    #[error("Actor {0} is blocked from acting by a status effect")]
    ActionBlocked(UnitId),

    /// An active status prevents moving.
    #[error("Actor {0} is blocked from moving by a status effect")]
    MovementBlocked(UnitId),

    /// Silence prevents skill use.
    #[error("Actor {0} is silenced")]
    Silenced(UnitId),

    /// The actor has no actions left this turn.
    #[error("Actor {0} has no actions left this turn")]
    NoActionsLeft(UnitId),

    /// Not enough MP for the skill.
    #[error("Insufficient MP: need {required}, have {available}")]
    InsufficientMp {
        /// MP cost of the skill.
        required: u32,
        /// MP the actor currently has.
        available: u32,
    },

    /// Not enough Stamina for the skill.
    #[error("Insufficient stamina: need {required}, have {available}")]
    InsufficientStamina {
        /// Stamina cost of the skill.
        required: u32,
        /// Stamina the actor currently has.
        available: u32,
    },

    /// Skill is still cooling down.
    #[error("Skill {skill} is on cooldown for {remaining} more turns")]
    OnCooldown {
        /// Skill being used.
        skill: SkillId,
        /// Turns until it is usable again.
        remaining: u32,
    },

    /// The actor never learned the skill.
    #[error("Actor does not know skill {0}")]
    UnknownSkill(SkillId),

    /// Target lies beyond the allowed range.
    #[error("Target out of range: distance {distance}, range {range}")]
    OutOfRange {
        /// Manhattan distance to the target.
        distance: u32,
        /// Maximum allowed distance.
        range: u32,
    },

    /// Target unit does not exist.
    #[error("Target {0} not found")]
    TargetNotFound(UnitId),

    /// Target unit is eliminated.
    #[error("Target {0} is eliminated")]
    TargetEliminated(UnitId),

    /// Target is not allowed for this action.
    #[error("Invalid target {target}: {reason}")]
    InvalidTarget {
        /// Rejected target.
        target: UnitId,
        /// Why it was rejected.
        reason: String,
    },

    /// Command needs at least one target.
    #[error("No target given")]
    NoTarget,

    /// Destination lies outside the grid.
    #[error("Destination {0} is outside the grid")]
    DestinationOutOfBounds(Position),

    /// Destination cannot be reached within the movement budget.
    #[error("Destination unreachable: {0}")]
    Unreachable(PathError),

    /// Item is not in the team inventory.
    #[error("Item {0} is not available")]
    ItemUnavailable(ItemId),

    /// Item id is not in the catalog.
    #[error("Unknown item {0}")]
    UnknownItem(ItemId),

    /// Combat rules forbid fleeing.
    #[error("Fleeing is not allowed in this combat")]
    FleeNotAllowed,

    /// The actor's team already fled.
    #[error("Team {0} has already fled")]
    AlreadyFled(TeamId),
}

/// Pathfinding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Start or goal lies outside the grid.
    #[error("Position {0} is outside the grid")]
    OutOfBounds(Position),

    /// Goal cell is impassable terrain.
    #[error("Goal {0} is impassable")]
    Impassable(Position),

    /// Goal cell is occupied by a unit.
    #[error("Goal {0} is occupied")]
    GoalOccupied(Position),

    /// No route exists.
    #[error("No path from {from} to {to}")]
    NoPath {
        /// Start cell.
        from: Position,
        /// Goal cell.
        to: Position,
    },

    /// A route exists but costs more than the budget allows.
    #[error("Path cost {cost} exceeds movement budget {budget}")]
    OutOfRange {
        /// Optimal path cost.
        cost: u32,
        /// Available movement points.
        budget: u32,
    },
}

/// Direct resource consumption failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// Not enough MP.
    #[error("Insufficient MP: need {required}, have {available}")]
    InsufficientMp {
        /// Requested amount.
        required: u32,
        /// Current amount.
        available: u32,
    },

    /// Not enough Stamina.
    #[error("Insufficient stamina: need {required}, have {available}")]
    InsufficientStamina {
        /// Requested amount.
        required: u32,
        /// Current amount.
        available: u32,
    },
}

/// Turn state machine failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Target state is not in the current state's allow-list.
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current state.
        from: TurnState,
        /// Requested state.
        to: TurnState,
    },

    /// The machine has reached a terminal state.
    #[error("State {0:?} is terminal")]
    Terminal(TurnState),

    /// The current state has no handling for the event.
    #[error("State {state:?} cannot handle event {event}")]
    UnhandledEvent {
        /// Current state.
        state: TurnState,
        /// Event name.
        event: String,
    },

    /// The target state's enter hook failed; the machine stayed put.
    #[error("Entering {state:?} failed: {reason}")]
    EnterFailed {
        /// State whose enter hook failed.
        state: TurnState,
        /// Failure description.
        reason: String,
    },
}

/// Inventory failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Not enough of the item.
    #[error("Not enough {item}: need {required}, have {available}")]
    NotEnough {
        /// Item id.
        item: ItemId,
        /// Requested quantity.
        required: u32,
        /// Held quantity.
        available: u32,
    },
}

/// Configuration loading failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read '{path}': {message}")]
    Read {
        /// Path that failed.
        path: String,
        /// IO error text.
        message: String,
    },

    /// RON text could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Parsed values are inconsistent.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}
