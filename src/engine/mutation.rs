//! Mutation engine: add, upsert, batch upsert and logical delete

use crate::core::record::{Candidate, KeyFilter, RecordInput, VersionedRecord};
use crate::core::schema::FROM_TIME;
use crate::core::temporal::{Interval, TimeInput, Timestamp};
use crate::engine::resolver::{resolve, OverlapMode, Resolution};
use crate::engine::VersionedTable;
use crate::error::{Error, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What happened to a candidate row
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// Appended without conflict
    Inserted,
    /// Appended after removing the overlapping rows, returned here
    InsertedAfterEvicting(Vec<VersionedRecord>),
    /// Declined because of an overlap in skip mode
    Skipped,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// Result of one upsert
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    /// Final interval of the predecessor this upsert closed, if any
    pub closed_predecessor: Option<Interval>,
    /// Fate of the new row
    pub insert: InsertOutcome,
}

impl UpsertOutcome {
    /// The predecessor was closed but the new row was skipped, leaving the
    /// key without an active version
    pub fn left_key_inactive(&self) -> bool {
        self.closed_predecessor.is_some() && !self.insert.is_inserted()
    }
}

impl VersionedTable {
    /// Insert a new open version. The table is left untouched when the
    /// candidate is skipped or conflicts.
    pub fn add(&mut self, input: &RecordInput, mode: Option<OverlapMode>) -> Result<InsertOutcome> {
        let candidate = self.schema.candidate(input)?;
        self.insert_candidate(candidate, mode)
    }

    /// Close the key's active version at the incoming `from_time`, then add.
    ///
    /// The close happens before overlap resolution and is kept even if the
    /// new row is then skipped. A predecessor starting at or after the
    /// incoming `from_time` is not closed; it takes part in resolution.
    pub fn upsert(&mut self, input: &RecordInput, mode: Option<OverlapMode>) -> Result<UpsertOutcome> {
        let candidate = self.schema.candidate(input)?;
        self.upsert_candidate(candidate, mode)
    }

    /// Validate every record, then upsert them in order.
    ///
    /// Fails with [`Error::MissingFields`] before touching the table if any
    /// record lacks a required field. Overlap outcomes are per record: under
    /// [`OverlapMode::Raise`] a conflict aborts the batch with the earlier
    /// records already applied.
    pub fn batch_upsert(
        &mut self,
        inputs: &[RecordInput],
        mode: Option<OverlapMode>,
    ) -> Result<Vec<UpsertOutcome>> {
        let missing = self.batch_missing_fields(inputs);
        if !missing.is_empty() {
            return Err(Error::MissingFields(missing));
        }
        let candidates = inputs
            .iter()
            .map(|input| self.schema.candidate(input))
            .collect::<Result<Vec<_>>>()?;

        let mut outcomes = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.into_iter().enumerate() {
            match self.upsert_candidate(candidate, mode) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(record = i, applied = outcomes.len(), error = %e, "batch upsert aborted");
                    return Err(e);
                }
            }
        }

        info!(
            records = outcomes.len(),
            inserted = outcomes.iter().filter(|o| o.insert.is_inserted()).count(),
            "batch upsert applied"
        );
        Ok(outcomes)
    }

    /// Logically delete: close the active version(s) matching `filter` at
    /// `delete_time` and stamp `change_time`. Returns the number of closed
    /// rows; no match is not an error.
    pub fn delete(&mut self, filter: &KeyFilter, delete_time: impl Into<TimeInput>) -> Result<usize> {
        if filter.is_empty() {
            return Err(Error::MissingFields(self.schema.key_fields().to_vec()));
        }
        self.schema.check_filter(filter)?;
        let delete_time: TimeInput = delete_time.into();
        let delete_time = delete_time.resolve()?;

        let positions: Vec<usize> = match self.schema.exact_key(filter) {
            Some(key) => self.table.active_position(&key).into_iter().collect(),
            None => self
                .table
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| row.is_open() && self.schema.matches(filter, row))
                .map(|(pos, _)| pos)
                .collect(),
        };

        if positions.is_empty() {
            debug!(%delete_time, "delete matched no active version");
            return Ok(0);
        }

        if let Some(row) = positions
            .iter()
            .filter_map(|&pos| self.table.get(pos))
            .find(|row| row.from_time >= delete_time)
        {
            return Err(Error::Temporal(format!(
                "delete time {delete_time} is not after the start {} of the active version of {}",
                row.from_time, row.key
            )));
        }

        let now = Timestamp::now();
        for &pos in &positions {
            self.table.close(pos, delete_time, Some(now));
        }
        info!(closed = positions.len(), %delete_time, "deleted active versions");
        Ok(positions.len())
    }

    fn upsert_candidate(
        &mut self,
        candidate: Candidate,
        mode: Option<OverlapMode>,
    ) -> Result<UpsertOutcome> {
        let mut closed_predecessor = None;

        if let Some(pos) = self.table.active_position(&candidate.key) {
            let predecessor_start = self.table.rows()[pos].from_time;
            if predecessor_start < candidate.from_time {
                self.table.close(pos, candidate.from_time, None);
                closed_predecessor = Some(Interval::closed(predecessor_start, candidate.from_time));
            } else {
                debug!(
                    key = %candidate.key,
                    from_time = %candidate.from_time,
                    "backdated upsert leaves the active version to overlap resolution"
                );
            }
        }

        let insert = self.insert_candidate(candidate, mode)?;
        Ok(UpsertOutcome {
            closed_predecessor,
            insert,
        })
    }

    fn insert_candidate(
        &mut self,
        candidate: Candidate,
        mode: Option<OverlapMode>,
    ) -> Result<InsertOutcome> {
        let mode = mode.unwrap_or(self.default_mode);

        match resolve(&self.table, &candidate.key, candidate.from_time, mode)? {
            Resolution::Reject => {
                debug!(
                    key = %candidate.key,
                    from_time = %candidate.from_time,
                    "skipped overlapping version"
                );
                Ok(InsertOutcome::Skipped)
            }
            Resolution::Accept => {
                self.table.push(candidate.into_open_record(Timestamp::now()));
                Ok(InsertOutcome::Inserted)
            }
            Resolution::AcceptAfterEvicting(positions) => {
                let evicted = self.table.evict(&positions);
                info!(
                    key = %candidate.key,
                    from_time = %candidate.from_time,
                    evicted = evicted.len(),
                    "replaced overlapping versions"
                );
                self.table.push(candidate.into_open_record(Timestamp::now()));
                Ok(InsertOutcome::InsertedAfterEvicting(evicted))
            }
        }
    }

    /// Union of the fields missing from any input, in schema order
    fn batch_missing_fields(&self, inputs: &[RecordInput]) -> Vec<String> {
        let missing: HashSet<String> = inputs
            .iter()
            .flat_map(|input| self.schema.missing_fields(input))
            .collect();

        self.schema
            .key_fields()
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(FROM_TIME))
            .chain(self.schema.value_fields().iter().map(String::as_str))
            .filter(|name| missing.contains(*name))
            .map(str::to_string)
            .collect()
    }
}
