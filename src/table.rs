//! This module defines the `TransitionTable`, the deterministic mapping from a state and the
//! symbols read by every head to the next state, the symbols to write and the head moves.

use crate::types::{Symbol, TransitionStatement};
use std::collections::{hash_map::Entry, HashMap};
use tracing::debug;

/// Lookup key: a source state and one read symbol per head, concatenated in head order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitionKey {
    pub state: String,
    pub read: String,
}

impl TransitionKey {
    pub fn new(state: impl Into<String>, read: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            read: read.into(),
        }
    }

    pub fn from_statement(statement: &TransitionStatement) -> Self {
        Self {
            state: statement.source.clone(),
            read: statement.actions.iter().map(|a| a.read).collect(),
        }
    }
}

/// Lookup result: the next state, one write symbol per head and one move per head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionValue {
    pub target: String,
    pub write: String,
    pub moves: Vec<i64>,
}

impl TransitionValue {
    pub fn from_statement(statement: &TransitionStatement) -> Self {
        Self {
            target: statement.target.clone(),
            write: statement.actions.iter().map(|a| a.write).collect(),
            moves: statement.actions.iter().map(|a| a.movement).collect(),
        }
    }

    /// Iterates the (write symbol, move) pairs in head order.
    pub fn actions(&self) -> impl Iterator<Item = (Symbol, i64)> + '_ {
        self.write.chars().zip(self.moves.iter().copied())
    }
}

/// A partial function from `TransitionKey` to `TransitionValue`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionTable {
    entries: HashMap<TransitionKey, TransitionValue>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table by registering every statement in order.
    pub fn from_statements(statements: &[TransitionStatement]) -> Self {
        let mut table = Self::new();
        for statement in statements {
            table.add_transition(statement);
        }
        table
    }

    /// Registers a statement unless its key is already present.
    ///
    /// The first registration for a key wins; later ones are ignored so the table can never
    /// hold two outcomes for the same situation. Returns whether the statement was added.
    pub fn add_transition(&mut self, statement: &TransitionStatement) -> bool {
        match self.entries.entry(TransitionKey::from_statement(statement)) {
            Entry::Vacant(entry) => {
                entry.insert(TransitionValue::from_statement(statement));
                true
            }
            Entry::Occupied(entry) => {
                debug!(
                    state = %entry.key().state,
                    read = %entry.key().read,
                    "duplicate transition ignored"
                );
                false
            }
        }
    }

    /// Removes the statement's key, if present. Returns whether anything was removed.
    pub fn remove_transition(&mut self, statement: &TransitionStatement) -> bool {
        self.entries
            .remove(&TransitionKey::from_statement(statement))
            .is_some()
    }

    pub fn get(&self, key: &TransitionKey) -> Option<&TransitionValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &TransitionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns every source state, sorted.
    pub fn states(&self) -> Vec<&str> {
        let mut states: Vec<&str> = self.entries.keys().map(|k| k.state.as_str()).collect();
        states.sort_unstable();
        states.dedup();
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeadAction;

    fn statement(
        source: &str,
        read: &str,
        write: &str,
        moves: &[i64],
        target: &str,
    ) -> TransitionStatement {
        TransitionStatement {
            source: source.to_string(),
            target: target.to_string(),
            actions: read
                .chars()
                .zip(write.chars())
                .zip(moves)
                .map(|((read, write), &movement)| HeadAction {
                    read,
                    write,
                    movement,
                })
                .collect(),
        }
    }

    #[test]
    fn test_lookup_concatenates_head_symbols() {
        let table =
            TransitionTable::from_statements(&[statement("q0", "ab", "xy", &[1, -1], "q1")]);

        let value = table.get(&TransitionKey::new("q0", "ab")).unwrap();
        assert_eq!(value.target, "q1");
        assert_eq!(value.write, "xy");
        assert_eq!(value.moves, vec![1, -1]);
        assert_eq!(value.actions().collect::<Vec<_>>(), vec![('x', 1), ('y', -1)]);

        assert!(table.get(&TransitionKey::new("q0", "ba")).is_none());
        assert!(table.get(&TransitionKey::new("q1", "ab")).is_none());
    }

    #[test]
    fn test_first_registration_wins() {
        let mut table = TransitionTable::new();

        assert!(table.add_transition(&statement("q0", "1", "0", &[1], "q1")));
        assert!(!table.add_transition(&statement("q0", "1", "1", &[-1], "q2")));

        let value = table.get(&TransitionKey::new("q0", "1")).unwrap();
        assert_eq!(value.target, "q1");
        assert_eq!(value.write, "0");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_transition() {
        let first = statement("q0", "1", "0", &[1], "q1");
        let mut table = TransitionTable::from_statements(&[first.clone()]);

        assert!(!table.remove_transition(&statement("q0", "0", "0", &[1], "q1")));
        assert!(table.remove_transition(&first));
        assert!(table.is_empty());
        assert!(!table.remove_transition(&first));

        // Once removed, the key can be registered again.
        assert!(table.add_transition(&statement("q0", "1", "1", &[0], "q9")));
        assert_eq!(table.get(&TransitionKey::new("q0", "1")).unwrap().target, "q9");
    }

    #[test]
    fn test_states_are_sorted_and_unique() {
        let table = TransitionTable::from_statements(&[
            statement("b", "1", "1", &[1], "a"),
            statement("a", "1", "1", &[1], "b"),
            statement("b", "0", "0", &[1], "b"),
        ]);

        assert_eq!(table.states(), vec!["a", "b"]);
        assert!(table.contains(&TransitionKey::new("b", "0")));
    }
}
