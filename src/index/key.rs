//! Key index: row positions per logical entity

use crate::core::record::VersionedRecord;
use crate::core::value::Key;
use std::collections::BTreeMap;

/// Map from key to the positions of its rows in the table, in ascending order
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    positions: BTreeMap<Key, Vec<usize>>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
        }
    }

    /// Build an index over `rows`
    pub fn build<'a>(rows: impl IntoIterator<Item = &'a VersionedRecord>) -> Self {
        let mut index = Self::new();
        for (position, record) in rows.into_iter().enumerate() {
            index.insert(record.key.clone(), position);
        }
        index
    }

    pub fn insert(&mut self, key: Key, position: usize) {
        self.positions.entry(key).or_default().push(position);
    }

    /// Positions of every row for `key`
    pub fn positions(&self, key: &Key) -> &[usize] {
        self.positions.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.positions.keys()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::temporal::Timestamp;

    fn row(symbol: &str, secs: i64) -> VersionedRecord {
        VersionedRecord {
            key: Key::new(vec![symbol.into()]),
            values: Default::default(),
            from_time: Timestamp::from_secs(secs),
            to_time: None,
            change_time: Timestamp::from_secs(secs),
        }
    }

    #[test]
    fn test_build_groups_positions_by_key() {
        let rows = vec![row("B", 1), row("A", 2), row("B", 3)];
        let index = KeyIndex::build(&rows);

        assert_eq!(index.len(), 2);
        assert_eq!(index.positions(&rows[0].key), &[0, 2]);
        assert_eq!(index.positions(&rows[1].key), &[1]);
        assert!(index.positions(&Key::new(vec!["C".into()])).is_empty());

        let keys: Vec<_> = index.keys().cloned().collect();
        assert_eq!(keys, vec![rows[1].key.clone(), rows[0].key.clone()]);
    }
}
