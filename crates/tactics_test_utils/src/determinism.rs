//! Determinism testing utilities.
//!
//! Provides a harness for verifying that battles produce identical results
//! given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and AI batch runs only mean something if a battle is 100%
//! reproducible. Sources of non-determinism include:
//!
//! - **Floating-point math**: combat formulas use fixed-point arithmetic via
//!   [`tactics_core::math::Fixed`] throughout.
//!
//! - **Map iteration order**: teams and units live in ordered maps and every
//!   tie (ATB readiness, AI targeting) is broken by id.
//!
//! - **System randomness**: hit and flee rolls come from the combat's seeded
//!   [`tactics_core::rng::CombatRng`].
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual rules (damage, flee chance, validation)
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: full AI battles are reproducible
//! 4. **Parallel tests**: running N battles on separate threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tactics_core::combat::Combat;
use tactics_core::engine::{CombatEngine, TurnPhase};
use tactics_core::error::Result;
use tactics_core::state_machine::TurnState;
use tracing::debug;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of turns played per run.
    pub turns: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the battle was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Turns: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel battle runs.
#[derive(Debug, Clone)]
pub struct ParallelBattleResult {
    /// Final state hash from each battle.
    pub hashes: Vec<u64>,
    /// Turn cap each battle ran with.
    pub max_turns: u64,
    /// Number of battles run.
    pub num_battles: usize,
}

impl ParallelBattleResult {
    /// Check if all battles produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all battles matched.
    ///
    /// # Panics
    ///
    /// Panics if battles produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel battles diverged!\n\
                 Battles: {}\n\
                 Max turns: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_battles,
                self.max_turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `turns` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute a state hash
///
/// # Example
///
/// ```ignore
/// use tactics_test_utils::determinism::{play_turn, verify_determinism};
/// use tactics_test_utils::fixtures::skirmish;
///
/// let result = verify_determinism(
///     5,  // Run 5 times
///     40, // 40 turns each
///     || CombatEngine::new(skirmish(7)),
///     |engine| { play_turn(engine).unwrap(); },
///     |engine| engine.combat().state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    turns: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..turns {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        turns,
    }
}

/// Play one unit turn with the AI deciding for everyone.
///
/// Initializes the engine on first use and does nothing once the battle is
/// over. Returns `false` when there was nothing left to play.
///
/// # Errors
///
/// Any engine error.
pub fn play_turn(engine: &mut CombatEngine) -> Result<bool> {
    if engine.state() == TurnState::Idle {
        engine.initialize()?;
    }
    if engine.is_finished() {
        return Ok(false);
    }
    if engine.state() == TurnState::ActionSelection {
        engine.play_ai_turn()?;
        return Ok(true);
    }
    if let TurnPhase::AwaitingCommand(_) = engine.begin_next_turn()? {
        engine.play_ai_turn()?;
    }
    Ok(true)
}

/// Run a battle to completion (or `max_turns`) and return its final hash.
///
/// Every team is driven by the AI regardless of its `is_ai` flag.
///
/// # Panics
///
/// Panics if the engine returns an error.
#[must_use]
pub fn run_battle(combat: Combat, max_turns: u64) -> u64 {
    let mut engine = CombatEngine::new(combat);
    for _ in 0..max_turns {
        if !play_turn(&mut engine).expect("battle turn failed") {
            break;
        }
    }
    let hash = engine.combat().state_hash();
    debug!(hash, turn = engine.combat().turn(), "Battle finished");
    hash
}

/// Run a battle twice with identical setup and compare the final hashes.
pub fn verify_battle_determinism<F>(setup_fn: F, max_turns: u64) -> bool
where
    F: Fn() -> Combat,
{
    let result = verify_determinism(
        2,
        1,
        || 0u64,
        |hash| *hash = run_battle(setup_fn(), max_turns),
        |hash| *hash,
    );
    result.is_deterministic
}

/// Run N battles on scoped threads and collect the final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences. The setup function runs on each thread, so
/// it only needs to be `Sync`.
///
/// # Panics
///
/// Panics if a battle thread panics.
pub fn run_parallel_battles<F>(
    setup_fn: F,
    num_battles: usize,
    max_turns: u64,
) -> ParallelBattleResult
where
    F: Fn() -> Combat + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_battles)
            .map(|_| s.spawn(|| run_battle(setup_fn(), max_turns)))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });

    ParallelBattleResult {
        hashes,
        max_turns,
        num_battles,
    }
}

/// Compare two battles turn-by-turn, finding the first divergence.
///
/// # Returns
///
/// `None` if the battles stay identical, `Some(turn)` if they diverge at
/// that turn (0 means the initial states already differ).
///
/// # Panics
///
/// Panics if the engine returns an error.
pub fn find_first_divergence<F>(setup_fn: F, max_turns: u64) -> Option<u64>
where
    F: Fn() -> Combat,
{
    let mut first = CombatEngine::new(setup_fn());
    let mut second = CombatEngine::new(setup_fn());

    if first.combat().state_hash() != second.combat().state_hash() {
        return Some(0);
    }

    for turn in 1..=max_turns {
        let more_first = play_turn(&mut first).expect("battle turn failed");
        let more_second = play_turn(&mut second).expect("battle turn failed");

        let same_hash = first.combat().state_hash() == second.combat().state_hash();
        if more_first != more_second || !same_hash {
            return Some(turn);
        }
        if !more_first {
            break;
        }
    }

    None
}

/// Names of every event a battle recorded, in order.
///
/// Two deterministic runs must produce the same sequence.
#[must_use]
pub fn event_trace(engine: &CombatEngine) -> Vec<&'static str> {
    engine
        .combat()
        .uncommitted_events()
        .iter()
        .map(|e| e.event.name())
        .collect()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{duel, skirmish};

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![10, 10, 10]);
        result.assert_deterministic();
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_detects_non_determinism() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_duel_is_deterministic() {
        assert!(verify_battle_determinism(|| duel(3), 200));
    }

    #[test]
    fn test_skirmish_turn_by_turn() {
        let result = verify_determinism(
            3,
            40,
            || CombatEngine::new(skirmish(11)),
            |engine| {
                play_turn(engine).unwrap();
            },
            |engine| engine.combat().state_hash(),
        );
        result.assert_deterministic();
        assert_eq!(find_first_divergence(|| skirmish(11), 40), None);
    }

    #[test]
    fn test_parallel_battles_match() {
        let result = run_parallel_battles(|| skirmish(5), 4, 200);
        assert_eq!(result.hashes.len(), 4);
        result.assert_deterministic();
    }

    #[test]
    fn test_event_traces_match() {
        let mut first = CombatEngine::new(skirmish(9));
        let mut second = CombatEngine::new(skirmish(9));
        for _ in 0..60 {
            play_turn(&mut first).unwrap();
            play_turn(&mut second).unwrap();
        }
        assert!(!event_trace(&first).is_empty());
        assert_eq!(event_trace(&first), event_trace(&second));
    }

    #[test]
    fn test_play_turn_stops_when_finished() {
        let mut engine = CombatEngine::new(duel(1));
        let mut played = 0;
        while play_turn(&mut engine).unwrap() {
            played += 1;
            assert!(played < 500, "duel never ended");
        }
        assert!(engine.is_finished());
        assert!(!play_turn(&mut engine).unwrap());
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
        assert_ne!(compute_hash(&1u32), compute_hash(&2u32));
    }
}
