//! Overlap resolution for candidate intervals

use crate::core::temporal::{Interval, Timestamp};
use crate::core::value::Key;
use crate::engine::table::RecordTable;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Policy applied when a new interval intersects existing intervals of its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverlapMode {
    /// Fail with [`Error::OverlapConflict`]
    #[default]
    Raise,
    /// Silently decline the insertion
    Skip,
    /// Evict every overlapping row, then insert
    Replace,
}

impl OverlapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raise => "raise",
            Self::Skip => "skip",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for OverlapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlapMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "raise" => Ok(Self::Raise),
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            other => Err(Error::InvalidConfiguration(format!(
                "invalid overlap handling mode: {other:?} (expected raise, skip or replace)"
            ))),
        }
    }
}

/// Outcome of resolving a candidate against the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No conflict
    Accept,
    /// Conflict under [`OverlapMode::Skip`]; the candidate must not be inserted
    Reject,
    /// Conflict under [`OverlapMode::Replace`]; the rows at these positions
    /// must be evicted before inserting
    AcceptAfterEvicting(Vec<usize>),
}

/// Positions of rows for `key` intersecting the open interval starting at `from_time`
pub fn overlapping_positions(table: &RecordTable, key: &Key, from_time: Timestamp) -> Vec<usize> {
    let candidate = Interval::open(from_time);
    table
        .rows_for_key(key)
        .filter(|(_, row)| row.interval().overlaps(&candidate))
        .map(|(pos, _)| pos)
        .collect()
}

/// Decide whether an open interval for `key` starting at `from_time` may be inserted.
///
/// Never mutates the table; eviction is left to the caller.
pub fn resolve(
    table: &RecordTable,
    key: &Key,
    from_time: Timestamp,
    mode: OverlapMode,
) -> Result<Resolution> {
    let overlapping = overlapping_positions(table, key, from_time);
    if overlapping.is_empty() {
        return Ok(Resolution::Accept);
    }

    match mode {
        OverlapMode::Raise => Err(Error::OverlapConflict {
            key: key.clone(),
            from_time,
        }),
        OverlapMode::Skip => Ok(Resolution::Reject),
        OverlapMode::Replace => Ok(Resolution::AcceptAfterEvicting(overlapping)),
    }
}
