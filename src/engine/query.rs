//! Query engine: as-of, latest, history and multi-instant snapshot reads

use crate::core::record::{KeyFilter, VersionedRecord};
use crate::core::temporal::{TimeInput, Timestamp};
use crate::engine::VersionedTable;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A row returned by [`VersionedTable::snapshot`], tagged with the instant it
/// was active at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub snapshot_time: Timestamp,
    pub record: VersionedRecord,
}

impl VersionedTable {
    /// Rows whose interval contains `timestamp`, in table order
    pub fn get_active(&self, timestamp: impl Into<TimeInput>) -> Result<Vec<&VersionedRecord>> {
        let timestamp: TimeInput = timestamp.into();
        Ok(self.active_at(timestamp.resolve()?))
    }

    /// Rows whose interval contains `timestamp`
    pub fn active_at(&self, timestamp: Timestamp) -> Vec<&VersionedRecord> {
        self.table
            .rows()
            .iter()
            .filter(|row| row.is_active_at(timestamp))
            .collect()
    }

    /// Rows with an open interval: the current version of every live key
    pub fn latest(&self) -> Vec<&VersionedRecord> {
        self.table.rows().iter().filter(|row| row.is_open()).collect()
    }

    /// Every version, open and closed.
    ///
    /// With a filter, matching rows are ordered by `from_time`; without one,
    /// all rows are ordered by key and then `from_time`.
    pub fn full_history(&self, filter: Option<&KeyFilter>) -> Result<Vec<&VersionedRecord>> {
        match filter.filter(|f| !f.is_empty()) {
            Some(filter) => {
                self.schema.check_filter(filter)?;
                let mut rows: Vec<&VersionedRecord> = match self.schema.exact_key(filter) {
                    Some(key) => self.table.rows_for_key(&key).map(|(_, row)| row).collect(),
                    None => self
                        .table
                        .rows()
                        .iter()
                        .filter(|row| self.schema.matches(filter, row))
                        .collect(),
                };
                rows.sort_by_key(|row| row.from_time);
                Ok(rows)
            }
            None => {
                let mut rows: Vec<&VersionedRecord> = self.table.rows().iter().collect();
                rows.sort_by(|a, b| a.key.cmp(&b.key).then(a.from_time.cmp(&b.from_time)));
                Ok(rows)
            }
        }
    }

    /// [`VersionedTable::get_active`] for each instant in order, each row
    /// tagged with its instant. All instants are parsed before any is read.
    pub fn snapshot<I, T>(&self, timestamps: I) -> Result<Vec<SnapshotRow>>
    where
        I: IntoIterator<Item = T>,
        T: Into<TimeInput>,
    {
        let instants = timestamps
            .into_iter()
            .map(|t| TimeInput::resolve(&t.into()))
            .collect::<Result<Vec<_>>>()?;

        Ok(instants
            .into_iter()
            .flat_map(|snapshot_time| {
                self.active_at(snapshot_time)
                    .into_iter()
                    .map(move |record| SnapshotRow {
                        snapshot_time,
                        record: record.clone(),
                    })
            })
            .collect())
    }
}
