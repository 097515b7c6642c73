//! Seeded randomness for hit and flee rolls.
//!
//! Every roll in a combat draws from one [`CombatRng`] seeded from the
//! combat config, so a replayed command stream reproduces the same outcomes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic random source owned by a combat.
#[derive(Debug, Clone)]
pub struct CombatRng {
    seed: u64,
    rolls: u64,
    inner: StdRng,
}

impl CombatRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rolls: 0,
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed this generator was created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of rolls drawn so far.
    #[must_use]
    pub const fn rolls(&self) -> u64 {
        self.rolls
    }

    /// Roll a d100 (1-100 inclusive).
    pub fn roll_d100(&mut self) -> u32 {
        self.rolls += 1;
        self.inner.gen_range(1..=100)
    }

    /// Succeeds with `percent`% probability. 0 never succeeds, 100 always does.
    pub fn chance(&mut self, percent: u32) -> bool {
        self.roll_d100() <= percent
    }
}

impl Default for CombatRng {
    fn default() -> Self {
        Self::new(0)
    }
}
