use std::collections::HashMap;
use std::time::SystemTime;

use indexmap::IndexMap;

use crate::dao::token_store::TokenRecord;

/// In-memory mirror of the token table, kept current by the change feed.
///
/// The board only exists once a store snapshot has been applied; readers must
/// treat its absence as "unavailable" rather than serving zeroes.
#[derive(Debug, Clone)]
pub struct TokenBoard {
    tokens: IndexMap<String, u32>,
    as_of: SystemTime,
}

impl TokenBoard {
    /// Build a board from a store snapshot, ordered like the registry.
    ///
    /// Snapshot rows for departments outside `order` are dropped.
    pub fn from_records(order: &[String], records: Vec<TokenRecord>) -> Self {
        let values: HashMap<String, u32> = records
            .into_iter()
            .map(|record| (record.department, record.current_token))
            .collect();
        let tokens = order
            .iter()
            .filter_map(|id| values.get(id).map(|value| (id.clone(), *value)))
            .collect();

        Self {
            tokens,
            as_of: SystemTime::now(),
        }
    }

    /// Apply a confirmed change. Returns `false` when the board already held
    /// the value, so duplicate feed deliveries stay harmless.
    pub fn apply(&mut self, department: &str, value: u32) -> bool {
        match self.tokens.get_mut(department) {
            Some(current) if *current == value => false,
            Some(current) => {
                *current = value;
                self.as_of = SystemTime::now();
                true
            }
            None => {
                self.tokens.insert(department.to_owned(), value);
                self.as_of = SystemTime::now();
                true
            }
        }
    }

    /// Current value for one department, if the board tracks it.
    pub fn value(&self, department: &str) -> Option<u32> {
        self.tokens.get(department).copied()
    }

    /// Entries in board order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.tokens.iter().map(|(id, value)| (id.as_str(), *value))
    }

    /// When the board content last changed.
    pub fn as_of(&self) -> SystemTime {
        self.as_of
    }

    /// Number of departments the board tracks.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the board tracks no departments at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Vec<String> {
        vec!["cs".to_owned(), "ee".to_owned(), "me".to_owned()]
    }

    fn record(department: &str, current_token: u32) -> TokenRecord {
        TokenRecord {
            department: department.to_owned(),
            current_token,
        }
    }

    #[test]
    fn snapshot_keeps_registry_order() {
        let board = TokenBoard::from_records(
            &order(),
            vec![record("me", 3), record("cs", 1), record("ee", 2)],
        );
        let entries: Vec<_> = board.entries().collect();
        assert_eq!(entries, vec![("cs", 1), ("ee", 2), ("me", 3)]);
    }

    #[test]
    fn snapshot_drops_unknown_departments() {
        let board = TokenBoard::from_records(&order(), vec![record("cs", 1), record("zz", 9)]);
        assert_eq!(board.value("zz"), None);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn apply_updates_value() {
        let mut board = TokenBoard::from_records(&order(), vec![record("cs", 1)]);
        assert!(board.apply("cs", 2));
        assert_eq!(board.value("cs"), Some(2));
    }

    #[test]
    fn apply_is_idempotent() {
        let mut board = TokenBoard::from_records(&order(), vec![record("cs", 5)]);
        let stamp = board.as_of();
        assert!(!board.apply("cs", 5));
        assert_eq!(board.value("cs"), Some(5));
        assert_eq!(board.as_of(), stamp);
    }

    #[test]
    fn apply_inserts_departments_missing_from_snapshot() {
        let mut board = TokenBoard::from_records(&order(), vec![record("cs", 1)]);
        assert!(board.apply("ee", 4));
        assert_eq!(board.value("ee"), Some(4));
    }

    #[test]
    fn later_value_wins() {
        let mut board = TokenBoard::from_records(&order(), vec![record("cs", 1)]);
        board.apply("cs", 2);
        board.apply("cs", 3);
        assert_eq!(board.value("cs"), Some(3));
    }
}
