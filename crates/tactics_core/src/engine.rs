//! Battle driver: runs the turn state machine against a combat.
//!
//! [`CombatEngine`] owns the machine, the combat, the ATB scheduler, the
//! command invoker and the AI. The state enter hooks do the work; the engine
//! feeds events to the machine and reads back what the hooks stored.
//!
//! ```text
//! Idle -> Initializing -> Ready -> TurnBegin -> ActionSelection -> Validating
//!   -> Confirmed -> Executing -> ApplyingEffects -> CheckVictory
//!   -> TurnEnd -> WaitingAtb -> TurnBegin ...
//!   -> BattleEnded -> Finalizing
//! ```

use std::fmt;

use tracing::{debug, info, warn};

use crate::ai::AiController;
use crate::atb::AtbScheduler;
use crate::combat::{Combat, CombatStatus};
use crate::command::{Action, Command, CommandResult, Effect};
use crate::error::{CombatError, Result, SetupError, ValidationError};
use crate::events::{CombatEvent, CombatResolution, DomainEvent};
use crate::ids::UnitId;
use crate::invoker::CommandInvoker;
use crate::state_machine::{StateHooks, TransitionRecord, TurnEvent, TurnState, TurnStateMachine};

/// Hands out rewards once a battle is over.
pub trait RewardDistributor {
    /// Called exactly once, on entering [`TurnState::Finalizing`].
    fn distribute(&mut self, combat: &Combat, resolution: &CombatResolution);
}

/// Distributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewards;

impl RewardDistributor for NoRewards {
    fn distribute(&mut self, _combat: &Combat, _resolution: &CombatResolution) {}
}

/// What a subscriber is told about.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    /// The turn state machine moved.
    Transition(&'a TransitionRecord),
    /// The combat recorded a domain event.
    Event(&'a DomainEvent),
}

/// Synchronous subscriber, called after every state transition.
pub trait CombatObserver {
    /// Receive one notification.
    fn notify(&mut self, notification: &Notification<'_>);
}

impl<F> CombatObserver for F
where
    F: FnMut(&Notification<'_>),
{
    fn notify(&mut self, notification: &Notification<'_>) {
        self(notification);
    }
}

/// Result of starting a unit's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPhase {
    /// The unit is waiting for a command.
    AwaitingCommand(UnitId),
    /// The unit could not act and its turn ended.
    Skipped(UnitId),
    /// Turn-start effects decided the battle.
    Ended(CombatResolution),
}

/// Why [`CombatEngine::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The battle is over.
    Finished(CombatResolution),
    /// A human-controlled unit must act.
    AwaitingInput(UnitId),
    /// The turn cap was reached first.
    TurnLimit {
        /// Turns started during this run.
        turns: u32,
    },
}

/// State shared with the machine's enter hooks.
struct EngineCore {
    combat: Combat,
    atb: AtbScheduler,
    invoker: CommandInvoker,
    active: Option<UnitId>,
    stunned: bool,
    pending: Option<Command>,
    setup_error: Option<SetupError>,
    validation_error: Option<ValidationError>,
    execution: Option<std::result::Result<(Action, CommandResult), CombatError>>,
    decided: bool,
    resolution: Option<CombatResolution>,
    rewards: Box<dyn RewardDistributor>,
    rewarded: bool,
}

impl fmt::Debug for EngineCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCore")
            .field("combat", self.combat.id())
            .field("active", &self.active)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

impl EngineCore {
    fn new(combat: Combat) -> Self {
        let atb = AtbScheduler::new(combat.config().atb_threshold);
        let invoker = CommandInvoker::new(combat.config().command_history_capacity);
        Self {
            combat,
            atb,
            invoker,
            active: None,
            stunned: false,
            pending: None,
            setup_error: None,
            validation_error: None,
            execution: None,
            decided: false,
            resolution: None,
            rewards: Box::new(NoRewards),
            rewarded: false,
        }
    }

    fn begin_turn(&mut self) -> std::result::Result<(), String> {
        if !self.atb.advance_until_ready(&self.combat) {
            return Err("no unit can take a turn".into());
        }
        let unit = self
            .atb
            .next_ready(&self.combat)
            .ok_or_else(|| "no unit is ready".to_string())?;
        let start = self.combat.begin_unit_turn(&unit).map_err(|e| e.to_string())?;
        self.atb.reset(&unit);
        self.stunned = start.stunned;
        self.active = Some(unit);
        Ok(())
    }

    fn execute_pending(&mut self) -> std::result::Result<(), String> {
        let command = self
            .pending
            .take()
            .ok_or_else(|| "no command to execute".to_string())?;
        let action = command.action().clone();
        self.execution = Some(
            self.invoker
                .execute(command, &mut self.combat)
                .map(|result| (action, result)),
        );
        Ok(())
    }

    fn publish_effects(&mut self) {
        let Some(Ok((action, result))) = &self.execution else {
            return;
        };
        let actor = action.actor().clone();
        let mut events = vec![CombatEvent::ActionExecuted {
            actor: actor.clone(),
            action: action.name().to_string(),
            message: result.message.clone(),
        }];

        for effect in &result.effects {
            match effect {
                Effect::Damage {
                    target,
                    amount,
                    absorbed,
                    eliminated,
                } => {
                    events.push(CombatEvent::DamageDealt {
                        source: Some(actor.clone()),
                        target: target.clone(),
                        amount: *amount,
                        absorbed: *absorbed,
                    });
                    if *eliminated {
                        events.push(CombatEvent::UnitEliminated { unit: target.clone() });
                    }
                }
                Effect::Heal { target, amount } => events.push(CombatEvent::HealApplied {
                    source: Some(actor.clone()),
                    target: target.clone(),
                    amount: *amount,
                }),
                Effect::Status {
                    target,
                    status,
                    duration,
                } => events.push(CombatEvent::StatusApplied {
                    target: target.clone(),
                    status: *status,
                    duration: *duration,
                }),
                Effect::Revived { target, hp } => events.push(CombatEvent::UnitRevived {
                    unit: target.clone(),
                    hp: *hp,
                }),
                Effect::Moved { unit, from, to, cost } => events.push(CombatEvent::UnitMoved {
                    unit: unit.clone(),
                    from: *from,
                    to: *to,
                    cost: *cost,
                }),
                Effect::SkillActivated { skill, targets } => events.push(CombatEvent::SkillUsed {
                    actor: actor.clone(),
                    skill: skill.clone(),
                    targets: targets.clone(),
                }),
                Effect::ItemConsumed { item, target } => events.push(CombatEvent::ItemUsed {
                    actor: actor.clone(),
                    item: item.clone(),
                    target: target.clone(),
                }),
                Effect::Fled { team } => events.push(CombatEvent::TeamFled { team: team.clone() }),
                Effect::RestoreMp { .. }
                | Effect::Cleansed { .. }
                | Effect::Missed { .. }
                | Effect::FleeFailed { .. }
                | Effect::Waited => {}
            }
        }

        for event in events {
            self.combat.record(event);
        }
    }

    fn finalize(&mut self) {
        if self.rewarded {
            return;
        }
        let resolution = self.resolution.clone().unwrap_or_else(|| self.combat.resolution());
        self.rewards.distribute(&self.combat, &resolution);
        self.rewarded = true;
    }
}

impl StateHooks for EngineCore {
    fn on_enter(&mut self, state: TurnState, event: TurnEvent) -> std::result::Result<(), String> {
        match state {
            TurnState::Initializing => {
                self.setup_error = self.combat.validate_setup().err();
            }
            TurnState::Ready => self.combat.start().map_err(|e| e.to_string())?,
            TurnState::Failed => {
                warn!(combat = %self.combat.id(), error = ?self.setup_error, "Combat setup failed");
            }
            TurnState::TurnBegin => self.begin_turn()?,
            TurnState::Validating => {
                let command = self
                    .pending
                    .as_ref()
                    .ok_or_else(|| "no command submitted".to_string())?;
                self.validation_error = command.validate(&self.combat).err();
            }
            TurnState::ActionRejected => {
                self.pending = None;
            }
            TurnState::Executing => self.execute_pending()?,
            TurnState::ApplyingEffects => self.publish_effects(),
            TurnState::CheckVictory => {
                self.decided = self.combat.is_decided();
            }
            TurnState::BattleEnded => {
                let resolution = self.combat.finish().map_err(|e| e.to_string())?;
                info!(combat = %self.combat.id(), ?resolution, "Battle ended");
                self.resolution = Some(resolution);
            }
            TurnState::Finalizing => self.finalize(),
            TurnState::Idle
            | TurnState::Stunned
            | TurnState::ActionSelection
            | TurnState::Confirmed
            | TurnState::ExecutionFailed
            | TurnState::TurnEnd
            | TurnState::WaitingAtb => {}
        }
        debug!(?state, event = event.as_str(), "Entered state");
        Ok(())
    }

    fn on_exit(&mut self, state: TurnState) {
        if state == TurnState::TurnEnd {
            self.active = None;
            self.stunned = false;
        }
    }
}

/// Drives one combat from setup to finalization.
pub struct CombatEngine {
    machine: TurnStateMachine,
    core: EngineCore,
    ai: AiController,
    observers: Vec<Box<dyn CombatObserver>>,
    notified_transitions: usize,
    notified_version: u64,
}

impl fmt::Debug for CombatEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatEngine")
            .field("state", &self.machine.state())
            .field("core", &self.core)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl CombatEngine {
    /// Wrap a combat. Nothing runs until [`CombatEngine::initialize`].
    #[must_use]
    pub fn new(combat: Combat) -> Self {
        Self {
            machine: TurnStateMachine::new(),
            core: EngineCore::new(combat),
            ai: AiController::default(),
            observers: Vec::new(),
            notified_transitions: 0,
            notified_version: 0,
        }
    }

    /// Builder: replace the reward distributor.
    #[must_use]
    pub fn with_rewards(mut self, rewards: impl RewardDistributor + 'static) -> Self {
        self.core.rewards = Box::new(rewards);
        self
    }

    /// Builder: replace the AI controller.
    #[must_use]
    pub fn with_ai(mut self, ai: AiController) -> Self {
        self.ai = ai;
        self
    }

    /// Register a subscriber for transitions and domain events.
    pub fn subscribe(&mut self, observer: impl CombatObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Register a closure subscriber.
    pub fn on_notification<F>(&mut self, callback: F)
    where
        F: FnMut(&Notification<'_>) + 'static,
    {
        self.observers.push(Box::new(callback));
    }

    /// Current machine state.
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.machine.state()
    }

    /// The combat being driven.
    #[must_use]
    pub const fn combat(&self) -> &Combat {
        &self.core.combat
    }

    /// Consume the engine, returning the combat.
    #[must_use]
    pub fn into_combat(self) -> Combat {
        self.core.combat
    }

    /// Transition history.
    #[must_use]
    pub fn history(&self) -> &[TransitionRecord] {
        self.machine.history()
    }

    /// Executed commands.
    #[must_use]
    pub const fn invoker(&self) -> &CommandInvoker {
        &self.core.invoker
    }

    /// ATB gauges.
    #[must_use]
    pub const fn atb(&self) -> &AtbScheduler {
        &self.core.atb
    }

    /// Unit whose turn it is.
    #[must_use]
    pub const fn active_unit(&self) -> Option<&UnitId> {
        self.core.active.as_ref()
    }

    /// Final resolution, once the battle has ended.
    #[must_use]
    pub const fn resolution(&self) -> Option<&CombatResolution> {
        self.core.resolution.as_ref()
    }

    /// Returns true once the machine is terminal.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.machine.is_terminal()
    }

    /// Pause the combat. Commands are refused until resumed.
    pub fn pause(&mut self) -> Result<()> {
        self.core.combat.pause()?;
        self.notify();
        Ok(())
    }

    /// Resume a paused combat.
    pub fn resume(&mut self) -> Result<()> {
        self.core.combat.resume()?;
        self.notify();
        Ok(())
    }

    fn handle(&mut self, event: TurnEvent) -> Result<TurnState> {
        let result = self.machine.handle(event, &mut self.core);
        self.notify();
        result.map_err(Into::into)
    }

    fn notify(&mut self) {
        let history = self.machine.history();
        let version = self.core.combat.version();
        if self.observers.is_empty() {
            self.notified_transitions = history.len();
            self.notified_version = version;
            return;
        }

        for record in &history[self.notified_transitions.min(history.len())..] {
            for observer in &mut self.observers {
                observer.notify(&Notification::Transition(record));
            }
        }
        self.notified_transitions = history.len();

        for event in self
            .core
            .combat
            .uncommitted_events()
            .iter()
            .filter(|e| e.version > self.notified_version)
        {
            for observer in &mut self.observers {
                observer.notify(&Notification::Event(event));
            }
        }
        self.notified_version = version;
    }

    fn require_state(&self, expected: &[TurnState], operation: &str) -> Result<()> {
        let state = self.machine.state();
        if expected.contains(&state) {
            Ok(())
        } else {
            Err(CombatError::InvalidState(format!("cannot {operation} in state {state:?}")))
        }
    }

    fn require_in_progress(&self) -> Result<()> {
        match self.core.combat.status() {
            CombatStatus::InProgress => Ok(()),
            status => Err(CombatError::InvalidState(format!("combat is {status:?}"))),
        }
    }

    /// Validate the setup and start the combat.
    ///
    /// # Errors
    /// The setup error, after the machine has entered [`TurnState::Failed`].
    pub fn initialize(&mut self) -> Result<()> {
        self.require_state(&[TurnState::Idle], "initialize")?;
        self.handle(TurnEvent::Initialize)?;
        if let Some(err) = self.core.setup_error.take() {
            self.handle(TurnEvent::SetupFailed)?;
            return Err(err.into());
        }
        self.handle(TurnEvent::SetupValidated)?;
        Ok(())
    }

    /// Advance the ATB and start the next unit's turn.
    ///
    /// A stunned unit's turn ends immediately. If turn-start effects decided
    /// the battle, a Wait is pushed through the full pipeline so the victory
    /// check can end it.
    pub fn begin_next_turn(&mut self) -> Result<TurnPhase> {
        self.require_state(&[TurnState::Ready, TurnState::WaitingAtb], "begin a turn")?;
        self.require_in_progress()?;
        self.handle(TurnEvent::StartTurn)?;

        let unit = self
            .core
            .active
            .clone()
            .ok_or_else(|| CombatError::InvalidState("turn began without a unit".into()))?;
        let decided = self.core.combat.is_decided();

        if self.core.stunned && !decided {
            info!(unit = %unit, "Unit cannot act, skipping turn");
            self.handle(TurnEvent::UnitStunned)?;
            self.handle(TurnEvent::EndTurn)?;
            self.handle(TurnEvent::AdvanceAtb)?;
            return Ok(TurnPhase::Skipped(unit));
        }

        self.handle(TurnEvent::UnitReady)?;
        if decided {
            self.submit(Command::wait(unit))?;
            let resolution = self.core.combat.resolution();
            return Ok(TurnPhase::Ended(resolution));
        }
        Ok(TurnPhase::AwaitingCommand(unit))
    }

    /// Run a command for the active unit through validation, execution and
    /// the victory check.
    ///
    /// On a validation or execution error the machine returns to
    /// [`TurnState::ActionSelection`] and the same unit may try again.
    pub fn submit(&mut self, command: Command) -> Result<CommandResult> {
        self.require_state(&[TurnState::ActionSelection], "submit a command")?;
        self.require_in_progress()?;
        let active = self
            .core
            .active
            .clone()
            .ok_or_else(|| CombatError::InvalidState("no active unit".into()))?;
        if command.actor() != &active {
            return Err(CombatError::InvalidState(format!(
                "it is {active}'s turn, not {}",
                command.actor()
            )));
        }

        if command.is_wait() && !self.core.combat.is_decided() {
            let result = CommandResult::waited(&active);
            self.core.combat.record(CombatEvent::ActionExecuted {
                actor: active,
                action: command.action().name().to_string(),
                message: result.message.clone(),
            });
            self.handle(TurnEvent::Skip)?;
            self.handle(TurnEvent::AdvanceAtb)?;
            return Ok(result);
        }

        self.core.pending = Some(command);
        self.handle(TurnEvent::CommandSubmitted)?;
        if let Some(err) = self.core.validation_error.take() {
            debug!(unit = %active, %err, "Command rejected");
            self.handle(TurnEvent::ValidationFailed)?;
            self.handle(TurnEvent::Retry)?;
            return Err(err.into());
        }

        self.handle(TurnEvent::ValidationPassed)?;
        self.handle(TurnEvent::Execute)?;
        if let Some(Err(err)) = &self.core.execution {
            let err = err.clone();
            self.core.execution = None;
            self.handle(TurnEvent::ExecutionFailed)?;
            self.handle(TurnEvent::Retry)?;
            return Err(err);
        }

        self.handle(TurnEvent::ExecutionSucceeded)?;
        let result = match self.core.execution.take() {
            Some(Ok((_, result))) => result,
            _ => return Err(CombatError::InvalidState("execution produced no result".into())),
        };
        self.handle(TurnEvent::EffectsApplied)?;

        if self.core.decided {
            self.handle(TurnEvent::BattleDecided)?;
            self.handle(TurnEvent::Finalize)?;
        } else {
            self.handle(TurnEvent::BattleContinues)?;
            self.handle(TurnEvent::AdvanceAtb)?;
        }
        Ok(result)
    }

    /// Let the AI pick and submit a command for the active unit.
    ///
    /// If the AI's choice is rejected the unit waits instead.
    pub fn play_ai_turn(&mut self) -> Result<CommandResult> {
        let unit = self
            .core
            .active
            .clone()
            .ok_or_else(|| CombatError::InvalidState("no active unit".into()))?;
        let command = self.ai.decide(&self.core.combat, &unit);
        match self.submit(command) {
            Ok(result) => Ok(result),
            Err(err) if self.machine.state() == TurnState::ActionSelection => {
                warn!(unit = %unit, %err, "AI command failed, waiting instead");
                self.submit(Command::wait(unit))
            }
            Err(err) => Err(err),
        }
    }

    /// Roll back the most recent command and cancel the combat.
    ///
    /// Returns the rolled back command, if there was one. A combat that can
    /// no longer be cancelled is left untouched.
    pub fn abort(&mut self) -> Result<Option<Command>> {
        let status = self.core.combat.status();
        if !status.can_transition_to(CombatStatus::Cancelled) {
            return Err(CombatError::InvalidState(format!(
                "cannot abort a combat in {status:?}"
            )));
        }
        let undone = if self.core.invoker.is_empty() {
            None
        } else {
            Some(self.core.invoker.undo_last(&mut self.core.combat)?)
        };
        self.core.pending = None;
        self.core.combat.cancel()?;
        self.core.resolution = Some(CombatResolution::Cancelled);
        warn!(combat = %self.core.combat.id(), "Combat aborted");
        self.notify();
        Ok(undone)
    }

    /// [`CombatEngine::run`] capped by the combat's configured `max_turns`.
    pub fn run_to_completion(&mut self) -> Result<RunOutcome> {
        self.run(self.core.combat.config().max_turns)
    }

    /// Play turns until the battle ends, a human unit must act, or
    /// `max_turns` turns have started.
    pub fn run(&mut self, max_turns: u32) -> Result<RunOutcome> {
        if self.machine.state() == TurnState::Idle {
            self.initialize()?;
        }

        let mut turns = 0;
        loop {
            match self.machine.state() {
                TurnState::Finalizing => {
                    let resolution = self
                        .core
                        .resolution
                        .clone()
                        .unwrap_or_else(|| self.core.combat.resolution());
                    return Ok(RunOutcome::Finished(resolution));
                }
                TurnState::ActionSelection => {
                    let unit = self
                        .core
                        .active
                        .clone()
                        .ok_or_else(|| CombatError::InvalidState("no active unit".into()))?;
                    let is_ai = self
                        .core
                        .combat
                        .unit(&unit)
                        .and_then(|u| self.core.combat.team(u.team_id()))
                        .is_some_and(|t| t.is_ai());
                    if !is_ai {
                        return Ok(RunOutcome::AwaitingInput(unit));
                    }
                    self.play_ai_turn()?;
                }
                TurnState::Ready | TurnState::WaitingAtb => {
                    if turns >= max_turns {
                        info!(turns, "Turn limit reached");
                        return Ok(RunOutcome::TurnLimit { turns });
                    }
                    self.begin_next_turn()?;
                    turns += 1;
                }
                state => {
                    return Err(CombatError::InvalidState(format!(
                        "cannot run from state {state:?}"
                    )));
                }
            }
        }
    }
}
