//! Opaque string identifiers and the generator that hands them out.
//!
//! The engine only relies on uniqueness. [`IdGenerator`] is an explicit
//! object passed to whatever builds units, teams or matches; there is no
//! process-wide counter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a combat (the match aggregate).
    CombatId
);
string_id!(
    /// Identifier of a unit.
    UnitId
);
string_id!(
    /// Identifier of a team.
    TeamId
);
string_id!(
    /// Identifier of a skill definition.
    SkillId
);
string_id!(
    /// Identifier of an item definition.
    ItemId
);

/// Monotonic identifier generator.
///
/// Keeps one counter per prefix, so `next("unit")` yields `unit-1`,
/// `unit-2`, ... independently of `next("team")`.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    counters: BTreeMap<String, u64>,
}

impl IdGenerator {
    /// Create a generator with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next raw identifier for a prefix.
    pub fn next(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}-{counter}")
    }

    /// Next combat id.
    pub fn combat_id(&mut self) -> CombatId {
        CombatId(self.next("combat"))
    }

    /// Next unit id.
    pub fn unit_id(&mut self) -> UnitId {
        UnitId(self.next("unit"))
    }

    /// Next team id.
    pub fn team_id(&mut self) -> TeamId {
        TeamId(self.next("team"))
    }

    /// Next skill id.
    pub fn skill_id(&mut self) -> SkillId {
        SkillId(self.next("skill"))
    }

    /// Next item id.
    pub fn item_id(&mut self) -> ItemId {
        ItemId(self.next("item"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_per_prefix() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.unit_id().as_str(), "unit-1");
        assert_eq!(ids.unit_id().as_str(), "unit-2");
        assert_eq!(ids.team_id().as_str(), "team-1");
        assert_eq!(ids.next("unit"), "unit-3");
    }

    #[test]
    fn test_independent_generators() {
        let mut a = IdGenerator::new();
        let mut b = IdGenerator::new();
        assert_eq!(a.unit_id(), b.unit_id());
    }
}
