//! Executes commands and keeps a bounded undo history.

use std::collections::VecDeque;

use tracing::debug;

use crate::combat::Combat;
use crate::command::{Command, CommandResult};
use crate::error::{CombatError, Result};

/// Runs commands against a combat and remembers the successful ones.
///
/// History is a ring: once `capacity` commands are stored the oldest is
/// dropped and can no longer be undone.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    history: VecDeque<Command>,
    capacity: usize,
}

impl Default for CommandInvoker {
    fn default() -> Self {
        Self::new(64)
    }
}

impl CommandInvoker {
    /// Create an invoker. A zero capacity is treated as 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Execute a command, recording it on success.
    pub fn execute(&mut self, mut command: Command, combat: &mut Combat) -> Result<CommandResult> {
        let result = command.execute(combat)?;
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(command);
        Ok(result)
    }

    /// Roll back the most recent command.
    pub fn undo_last(&mut self, combat: &mut Combat) -> Result<Command> {
        let mut command = self
            .history
            .pop_back()
            .ok_or_else(|| CombatError::InvalidState("no command to undo".into()))?;
        command.rollback(combat)?;
        debug!(command = %command, remaining = self.history.len(), "Undid command");
        Ok(command)
    }

    /// Executed commands, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Command> {
        self.history.iter()
    }

    /// Most recent command.
    #[must_use]
    pub fn last(&self) -> Option<&Command> {
        self.history.back()
    }

    /// Number of commands held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if nothing has been executed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Maximum history length.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, Position};
    use crate::ids::{TeamId, UnitId};
    use crate::stats::Stats;
    use crate::team::Team;
    use crate::unit::Unit;

    fn combat() -> Combat {
        let red = TeamId::new("red");
        let blue = TeamId::new("blue");
        let mov = Stats { mov: 20, ..Stats::default() };
        Combat::new("c", Grid::new(10, 10))
            .with_team(Team::new(red.clone(), "Red", "red", false).with_unit(
                Unit::new(UnitId::new("a"), "A", red, mov).with_position(Position::new(0, 0)),
            ))
            .with_team(Team::new(blue.clone(), "Blue", "blue", true).with_unit(
                Unit::new(UnitId::new("b"), "B", blue, Stats::default())
                    .with_position(Position::new(9, 9)),
            ))
    }

    #[test]
    fn test_history_is_bounded() {
        let mut combat = combat();
        let mut invoker = CommandInvoker::new(2);
        for x in 1..=3 {
            invoker
                .execute(Command::move_to("a", Position::new(x, 0)), &mut combat)
                .unwrap();
        }
        assert_eq!(invoker.len(), 2);
        assert_eq!(invoker.capacity(), 2);
    }

    #[test]
    fn test_failed_command_not_recorded() {
        let mut combat = combat();
        let mut invoker = CommandInvoker::default();
        assert!(invoker.execute(Command::attack("a", "b"), &mut combat).is_err());
        assert!(invoker.is_empty());
    }

    #[test]
    fn test_undo_in_reverse_order() {
        let mut combat = combat();
        let mut invoker = CommandInvoker::default();
        invoker.execute(Command::move_to("a", Position::new(1, 0)), &mut combat).unwrap();
        invoker.execute(Command::move_to("a", Position::new(2, 0)), &mut combat).unwrap();

        invoker.undo_last(&mut combat).unwrap();
        assert_eq!(combat.unit(&UnitId::new("a")).unwrap().position(), Some(Position::new(1, 0)));
        invoker.undo_last(&mut combat).unwrap();
        assert_eq!(combat.unit(&UnitId::new("a")).unwrap().position(), Some(Position::new(0, 0)));
        assert!(invoker.undo_last(&mut combat).is_err());
    }
}
