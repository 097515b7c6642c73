//! Turn state machine tests.
//!
//! Walks the machine on its own and through the engine, checking the
//! allow-list, terminal states and the recorded history.

use proptest::prelude::*;
use tactics_core::error::TransitionError;
use tactics_core::prelude::*;
use tactics_core::state_machine::{NoHooks, TurnStateMachine};
use tactics_test_utils::fixtures::{team, UnitBuilder};

const ALL_EVENTS: [TurnEvent; 20] = [
    TurnEvent::Initialize,
    TurnEvent::SetupValidated,
    TurnEvent::SetupFailed,
    TurnEvent::StartTurn,
    TurnEvent::UnitStunned,
    TurnEvent::UnitReady,
    TurnEvent::CommandSubmitted,
    TurnEvent::Skip,
    TurnEvent::ValidationPassed,
    TurnEvent::ValidationFailed,
    TurnEvent::Execute,
    TurnEvent::ExecutionSucceeded,
    TurnEvent::ExecutionFailed,
    TurnEvent::EffectsApplied,
    TurnEvent::BattleDecided,
    TurnEvent::BattleContinues,
    TurnEvent::AdvanceAtb,
    TurnEvent::Retry,
    TurnEvent::EndTurn,
    TurnEvent::Finalize,
];

const ALL_STATES: [TurnState; 18] = [
    TurnState::Idle,
    TurnState::Initializing,
    TurnState::Ready,
    TurnState::Failed,
    TurnState::TurnBegin,
    TurnState::Stunned,
    TurnState::ActionSelection,
    TurnState::Validating,
    TurnState::Confirmed,
    TurnState::ActionRejected,
    TurnState::Executing,
    TurnState::ApplyingEffects,
    TurnState::ExecutionFailed,
    TurnState::CheckVictory,
    TurnState::TurnEnd,
    TurnState::WaitingAtb,
    TurnState::BattleEnded,
    TurnState::Finalizing,
];

fn machine_in(path: &[TurnEvent]) -> TurnStateMachine {
    let mut machine = TurnStateMachine::new();
    for &event in path {
        machine.handle(event, &mut NoHooks).unwrap();
    }
    machine
}

#[test]
fn idle_only_reaches_initializing() {
    for to in ALL_STATES {
        let mut machine = TurnStateMachine::new();
        let result = machine.transition(to, TurnEvent::Initialize, &mut NoHooks);
        if to == TurnState::Initializing {
            assert_eq!(result, Ok(TurnState::Initializing));
        } else {
            assert_eq!(
                result,
                Err(TransitionError::InvalidTransition {
                    from: TurnState::Idle,
                    to
                })
            );
            assert_eq!(machine.state(), TurnState::Idle);
        }
    }
}

#[test]
fn failed_and_finalizing_accept_nothing() {
    let failed = machine_in(&[TurnEvent::Initialize, TurnEvent::SetupFailed]);
    let finalizing = machine_in(&[
        TurnEvent::Initialize,
        TurnEvent::SetupValidated,
        TurnEvent::StartTurn,
        TurnEvent::UnitReady,
        TurnEvent::CommandSubmitted,
        TurnEvent::ValidationPassed,
        TurnEvent::Execute,
        TurnEvent::ExecutionSucceeded,
        TurnEvent::EffectsApplied,
        TurnEvent::BattleDecided,
        TurnEvent::Finalize,
    ]);

    for machine in [failed, finalizing] {
        let terminal = machine.state();
        assert!(machine.is_terminal());
        for event in ALL_EVENTS {
            let mut m = machine.clone();
            assert_eq!(m.handle(event, &mut NoHooks), Err(TransitionError::Terminal(terminal)));
        }
        for to in ALL_STATES {
            let mut m = machine.clone();
            assert!(matches!(
                m.transition(to, TurnEvent::Finalize, &mut NoHooks),
                Err(TransitionError::InvalidTransition { .. })
            ));
        }
    }
}

#[test]
fn rejected_command_loops_back_to_selection() {
    let mut machine = machine_in(&[
        TurnEvent::Initialize,
        TurnEvent::SetupValidated,
        TurnEvent::StartTurn,
        TurnEvent::UnitReady,
        TurnEvent::CommandSubmitted,
        TurnEvent::ValidationFailed,
    ]);
    assert_eq!(machine.state(), TurnState::ActionRejected);
    assert_eq!(machine.handle(TurnEvent::Retry, &mut NoHooks), Ok(TurnState::ActionSelection));
    assert_eq!(machine.history().len(), 7);
}

#[test]
fn engine_walk_records_full_pipeline() {
    let knight = UnitBuilder::new("knight", "red").spd(20).hit(100).atk(500).at(1, 1).build();
    let combat = Combat::new("walk", Grid::new(6, 6))
        .with_team(team(false, vec![knight]))
        .with_team(team(true, vec![UnitBuilder::new("orc", "blue").at(1, 2).build()]));
    let mut engine = CombatEngine::new(combat);

    engine.initialize().unwrap();
    assert_eq!(engine.state(), TurnState::Ready);
    assert_eq!(
        engine.begin_next_turn().unwrap(),
        TurnPhase::AwaitingCommand(UnitId::new("knight"))
    );
    engine.submit(Command::attack("knight", "orc")).unwrap();

    let path: Vec<TurnState> = engine.history().iter().map(|r| r.to).collect();
    assert_eq!(
        path,
        vec![
            TurnState::Initializing,
            TurnState::Ready,
            TurnState::TurnBegin,
            TurnState::ActionSelection,
            TurnState::Validating,
            TurnState::Confirmed,
            TurnState::Executing,
            TurnState::ApplyingEffects,
            TurnState::CheckVictory,
            TurnState::BattleEnded,
            TurnState::Finalizing,
        ]
    );
    assert!(engine.is_finished());
    assert_eq!(engine.resolution(), Some(&CombatResolution::Victory(TeamId::new("red"))));
    assert_eq!(engine.combat().status(), CombatStatus::Finished);
    for pair in engine.history().windows(2) {
        assert_eq!(pair[0].to, pair[1].from);
    }
}

#[test]
fn engine_rejects_commands_after_battle() {
    let knight = UnitBuilder::new("knight", "red").spd(20).hit(100).atk(500).at(0, 0).build();
    let combat = Combat::new("done", Grid::new(4, 4))
        .with_team(team(false, vec![knight]))
        .with_team(team(true, vec![UnitBuilder::new("orc", "blue").at(1, 0).build()]));
    let mut engine = CombatEngine::new(combat);
    engine.initialize().unwrap();
    engine.begin_next_turn().unwrap();
    engine.submit(Command::attack("knight", "orc")).unwrap();

    assert!(engine.submit(Command::wait("knight")).is_err());
    assert!(engine.begin_next_turn().is_err());
    assert_eq!(engine.state(), TurnState::Finalizing);
}

proptest! {
    #[test]
    fn random_events_follow_allow_list(
        events in proptest::collection::vec(prop::sample::select(ALL_EVENTS.to_vec()), 0..60)
    ) {
        let mut machine = TurnStateMachine::new();
        for event in events {
            let before = machine.state();
            match machine.handle(event, &mut NoHooks) {
                Ok(after) => {
                    prop_assert!(before.can_transition_to(after));
                    prop_assert_eq!(before.next_state(event), Some(after));
                }
                Err(_) => prop_assert_eq!(machine.state(), before),
            }
        }
        for pair in machine.history().windows(2) {
            prop_assert_eq!(pair[0].to, pair[1].from);
        }
    }
}
