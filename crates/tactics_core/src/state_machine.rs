//! The turn state machine.
//!
//! The machine only knows states, events and the allow-list between them.
//! Behaviour attached to a state lives in a [`StateHooks`] implementation
//! passed into every transition, which keeps the machine free of borrows on
//! the combat it drives.
//!
//! Transition protocol:
//! 1. Terminal states refuse everything.
//! 2. The target must be in the current state's allow-list.
//! 3. `on_enter` runs for the target. If it fails the previous state is
//!    restored, its `on_exit` does not run and nothing is recorded.
//! 4. Once the target is entered, `on_exit` runs for the state left behind.
//! 5. Successful transitions are appended to the history.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TransitionError;
use crate::events::timestamp_ms;

/// Phases of a combat, from setup through the turn loop to resolution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum TurnState {
    /// Created, nothing validated yet.
    #[default]
    Idle,
    /// Checking the combat setup.
    Initializing,
    /// Setup is valid; the first turn has not started.
    Ready,
    /// Setup was invalid. Terminal.
    Failed,
    /// A unit was selected and its turn-start hooks ran.
    TurnBegin,
    /// The active unit cannot act this turn.
    Stunned,
    /// Waiting for the active unit's command.
    ActionSelection,
    /// Running the validation chain.
    Validating,
    /// Validation passed.
    Confirmed,
    /// Validation failed; back to selection.
    ActionRejected,
    /// Mutating combat state.
    Executing,
    /// Publishing the command's effects.
    ApplyingEffects,
    /// Execution failed and was rolled back.
    ExecutionFailed,
    /// Evaluating victory conditions.
    CheckVictory,
    /// The active unit's turn is over.
    TurnEnd,
    /// Advancing readiness gauges until a unit is ready.
    WaitingAtb,
    /// A victory condition was met.
    BattleEnded,
    /// Rewards handed out. Terminal.
    Finalizing,
}

impl TurnState {
    /// States reachable from this one.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Idle => &[Self::Initializing],
            Self::Initializing => &[Self::Ready, Self::Failed],
            Self::Ready | Self::WaitingAtb => &[Self::TurnBegin],
            Self::TurnBegin => &[Self::Stunned, Self::ActionSelection],
            Self::Stunned => &[Self::TurnEnd],
            Self::ActionSelection => &[Self::Validating, Self::TurnEnd],
            Self::Validating => &[Self::Confirmed, Self::ActionRejected],
            Self::Confirmed => &[Self::Executing],
            Self::Executing => &[Self::ApplyingEffects, Self::ExecutionFailed],
            Self::ApplyingEffects => &[Self::CheckVictory],
            Self::CheckVictory => &[Self::BattleEnded, Self::TurnEnd],
            Self::TurnEnd => &[Self::WaitingAtb],
            Self::ActionRejected | Self::ExecutionFailed => &[Self::ActionSelection],
            Self::BattleEnded => &[Self::Finalizing],
            Self::Failed | Self::Finalizing => &[],
        }
    }

    /// Returns true if `to` is in this state's allow-list.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Returns true for states that accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Finalizing)
    }

    /// State this one moves to on `event`, if it handles it.
    #[must_use]
    pub const fn next_state(self, event: TurnEvent) -> Option<Self> {
        let next = match (self, event) {
            (Self::Idle, TurnEvent::Initialize) => Self::Initializing,
            (Self::Initializing, TurnEvent::SetupValidated) => Self::Ready,
            (Self::Initializing, TurnEvent::SetupFailed) => Self::Failed,
            (Self::Ready | Self::WaitingAtb, TurnEvent::StartTurn) => Self::TurnBegin,
            (Self::TurnBegin, TurnEvent::UnitStunned) => Self::Stunned,
            (Self::TurnBegin, TurnEvent::UnitReady) => Self::ActionSelection,
            (Self::ActionSelection, TurnEvent::CommandSubmitted) => Self::Validating,
            (Self::ActionSelection, TurnEvent::Skip) | (Self::Stunned, TurnEvent::EndTurn) => {
                Self::TurnEnd
            }
            (Self::Validating, TurnEvent::ValidationPassed) => Self::Confirmed,
            (Self::Validating, TurnEvent::ValidationFailed) => Self::ActionRejected,
            (Self::Confirmed, TurnEvent::Execute) => Self::Executing,
            (Self::Executing, TurnEvent::ExecutionSucceeded) => Self::ApplyingEffects,
            (Self::Executing, TurnEvent::ExecutionFailed) => Self::ExecutionFailed,
            (Self::ApplyingEffects, TurnEvent::EffectsApplied) => Self::CheckVictory,
            (Self::CheckVictory, TurnEvent::BattleDecided) => Self::BattleEnded,
            (Self::CheckVictory, TurnEvent::BattleContinues) => Self::TurnEnd,
            (Self::TurnEnd, TurnEvent::AdvanceAtb) => Self::WaitingAtb,
            (Self::ActionRejected | Self::ExecutionFailed, TurnEvent::Retry) => {
                Self::ActionSelection
            }
            (Self::BattleEnded, TurnEvent::Finalize) => Self::Finalizing,
            _ => return None,
        };
        Some(next)
    }
}

/// Inputs that drive the machine through [`TurnStateMachine::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnEvent {
    /// Begin setup validation.
    Initialize,
    /// Setup checks passed.
    SetupValidated,
    /// Setup checks failed.
    SetupFailed,
    /// Start the next unit's turn.
    StartTurn,
    /// The selected unit cannot act.
    UnitStunned,
    /// The selected unit may act.
    UnitReady,
    /// A command arrived.
    CommandSubmitted,
    /// Pass the turn without running the pipeline.
    Skip,
    /// Every validation rule passed.
    ValidationPassed,
    /// A validation rule failed.
    ValidationFailed,
    /// Run the confirmed command.
    Execute,
    /// The command executed.
    ExecutionSucceeded,
    /// The command failed and was rolled back.
    ExecutionFailed,
    /// Effects were published.
    EffectsApplied,
    /// A victory condition holds.
    BattleDecided,
    /// No victory condition holds.
    BattleContinues,
    /// Hand the clock back to the scheduler.
    AdvanceAtb,
    /// Return to action selection after a rejection or failure.
    Retry,
    /// Close a stunned unit's turn.
    EndTurn,
    /// Close the battle.
    Finalize,
}

impl TurnEvent {
    /// Short name for logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::SetupValidated => "setup_validated",
            Self::SetupFailed => "setup_failed",
            Self::StartTurn => "start_turn",
            Self::UnitStunned => "unit_stunned",
            Self::UnitReady => "unit_ready",
            Self::CommandSubmitted => "command_submitted",
            Self::Skip => "skip",
            Self::ValidationPassed => "validation_passed",
            Self::ValidationFailed => "validation_failed",
            Self::Execute => "execute",
            Self::ExecutionSucceeded => "execution_succeeded",
            Self::ExecutionFailed => "execution_failed",
            Self::EffectsApplied => "effects_applied",
            Self::BattleDecided => "battle_decided",
            Self::BattleContinues => "battle_continues",
            Self::AdvanceAtb => "advance_atb",
            Self::Retry => "retry",
            Self::EndTurn => "end_turn",
            Self::Finalize => "finalize",
        }
    }
}

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State left.
    pub from: TurnState,
    /// State entered.
    pub to: TurnState,
    /// Event that caused the transition.
    pub event: TurnEvent,
    /// Wall-clock time in milliseconds.
    pub timestamp_ms: u64,
}

/// Per-state behaviour invoked by the machine.
pub trait StateHooks {
    /// Runs once when `state` is entered. An error aborts the transition.
    fn on_enter(&mut self, state: TurnState, event: TurnEvent) -> Result<(), String>;

    /// Runs once when `state` is left, after the next state was entered.
    fn on_exit(&mut self, state: TurnState) {
        let _ = state;
    }
}

/// Hooks that do nothing, for driving the machine on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl StateHooks for NoHooks {
    fn on_enter(&mut self, _state: TurnState, _event: TurnEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Current state plus the append-only transition history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnStateMachine {
    state: TurnState,
    history: Vec<TransitionRecord>,
}

impl TurnStateMachine {
    /// Create a machine in [`TurnState::Idle`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Returns true once a terminal state is reached.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Every successful transition, oldest first.
    #[must_use]
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Most recent transition.
    #[must_use]
    pub fn last_transition(&self) -> Option<&TransitionRecord> {
        self.history.last()
    }

    /// Move to `to` if the allow-list permits it.
    ///
    /// # Errors
    /// [`TransitionError::InvalidTransition`] if `to` is not allowed (always
    /// the case from a terminal state) or [`TransitionError::EnterFailed`]
    /// if the target's enter hook fails.
    pub fn transition<H: StateHooks + ?Sized>(
        &mut self,
        to: TurnState,
        event: TurnEvent,
        hooks: &mut H,
    ) -> Result<TurnState, TransitionError> {
        let from = self.state;
        if !from.can_transition_to(to) {
            warn!(?from, ?to, event = event.as_str(), "Invalid transition");
            return Err(TransitionError::InvalidTransition { from, to });
        }

        self.state = to;
        if let Err(reason) = hooks.on_enter(to, event) {
            warn!(?from, ?to, %reason, "Enter hook failed, rolling back");
            self.state = from;
            return Err(TransitionError::EnterFailed { state: to, reason });
        }
        hooks.on_exit(from);

        debug!(?from, ?to, event = event.as_str(), "State transition");
        self.history.push(TransitionRecord {
            from,
            to,
            event,
            timestamp_ms: timestamp_ms(),
        });
        Ok(to)
    }

    /// Feed an event to the current state.
    ///
    /// # Errors
    /// [`TransitionError::Terminal`] in a terminal state,
    /// [`TransitionError::UnhandledEvent`] if the state ignores the event,
    /// or any error from [`TurnStateMachine::transition`].
    pub fn handle<H: StateHooks + ?Sized>(
        &mut self,
        event: TurnEvent,
        hooks: &mut H,
    ) -> Result<TurnState, TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::Terminal(self.state));
        }
        let Some(to) = self.state.next_state(event) else {
            return Err(TransitionError::UnhandledEvent {
                state: self.state,
                event: event.as_str().to_string(),
            });
        };
        self.transition(to, event, hooks)
    }
}
