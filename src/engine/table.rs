//! Record table: the rows of a versioned table and their key index

use crate::core::record::VersionedRecord;
use crate::core::temporal::Timestamp;
use crate::core::value::Key;
use crate::error::{Error, Result};
use crate::index::KeyIndex;

/// Append-mostly row storage.
///
/// Rows keep insertion order. They are only mutated to close them, and only
/// removed by eviction, after which the key index is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    rows: Vec<VersionedRecord>,
    index: KeyIndex,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing rows without checking invariants
    pub fn from_rows(rows: Vec<VersionedRecord>) -> Self {
        let index = KeyIndex::build(&rows);
        Self { rows, index }
    }

    pub fn rows(&self) -> &[VersionedRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<VersionedRecord> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&VersionedRecord> {
        self.rows.get(position)
    }

    /// Distinct keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.index.keys()
    }

    /// Rows of one key with their positions, in insertion order
    pub fn rows_for_key<'a>(
        &'a self,
        key: &Key,
    ) -> impl Iterator<Item = (usize, &'a VersionedRecord)> + 'a {
        let positions = self.index.positions(key).to_vec();
        positions.into_iter().map(move |pos| (pos, &self.rows[pos]))
    }

    /// Position of the open row for `key`, if any
    pub fn active_position(&self, key: &Key) -> Option<usize> {
        self.index
            .positions(key)
            .iter()
            .copied()
            .find(|&pos| self.rows[pos].is_open())
    }

    /// Append a row, returning its position
    pub fn push(&mut self, record: VersionedRecord) -> usize {
        let position = self.rows.len();
        self.index.insert(record.key.clone(), position);
        self.rows.push(record);
        position
    }

    /// Close the row at `position` at `to_time`; `change_time` is only
    /// touched when given.
    pub fn close(&mut self, position: usize, to_time: Timestamp, change_time: Option<Timestamp>) {
        if let Some(row) = self.rows.get_mut(position) {
            row.to_time = Some(to_time);
            if let Some(change_time) = change_time {
                row.change_time = change_time;
            }
        }
    }

    /// Remove the rows at `positions`, returning them in table order
    pub fn evict(&mut self, positions: &[usize]) -> Vec<VersionedRecord> {
        if positions.is_empty() {
            return Vec::new();
        }
        let mut doomed = positions.to_vec();
        doomed.sort_unstable();
        doomed.dedup();

        let mut evicted = Vec::with_capacity(doomed.len());
        let mut kept = Vec::with_capacity(self.rows.len().saturating_sub(doomed.len()));
        for (position, row) in std::mem::take(&mut self.rows).into_iter().enumerate() {
            if doomed.binary_search(&position).is_ok() {
                evicted.push(row);
            } else {
                kept.push(row);
            }
        }

        self.index = KeyIndex::build(&kept);
        self.rows = kept;
        evicted
    }

    /// Verify, per key: every closed interval is non-empty, at most one row
    /// is open, and no two intervals intersect.
    pub fn check_invariants(&self) -> Result<()> {
        for key in self.index.keys() {
            let mut rows: Vec<&VersionedRecord> = self
                .index
                .positions(key)
                .iter()
                .map(|&pos| &self.rows[pos])
                .collect();

            if let Some(bad) = rows.iter().find(|row| !row.interval().is_well_formed()) {
                return Err(Error::InvariantViolation(format!(
                    "key {key} has an empty or inverted interval {}",
                    bad.interval()
                )));
            }

            let open = rows.iter().filter(|row| row.is_open()).count();
            if open > 1 {
                return Err(Error::InvariantViolation(format!(
                    "key {key} has {open} open versions"
                )));
            }

            rows.sort_by_key(|row| row.from_time);
            for pair in rows.windows(2) {
                if pair[0].interval().overlaps(&pair[1].interval()) {
                    return Err(Error::InvariantViolation(format!(
                        "key {key} has overlapping intervals {} and {}",
                        pair[0].interval(),
                        pair[1].interval()
                    )));
                }
            }
        }
        Ok(())
    }
}
