//! pit-db: point-in-time versioned record store
//!
//! Every logical entity, identified by a composite key, owns a sequence of
//! non-overlapping validity intervals. Each interval carries a snapshot of
//! the entity's value fields.
//!
//! # Core Concepts
//!
//! - **Versioned records**: rows valid over `[from_time, to_time)`, where an
//!   open `to_time` marks the active version
//! - **Overlap modes**: `raise`, `skip` or `replace` when a new interval
//!   collides with existing ones
//! - **Logical deletes**: closing the active interval instead of removing rows
//! - **As-of reads**: reconstructing the state valid at any instant
//!
//! # Example
//!
//! ```no_run
//! use pit_db::prelude::*;
//!
//! # fn example() -> pit_db::error::Result<()> {
//! let mut table = VersionedTable::with_fields(["symbol", "source"], ["price"], OverlapMode::Raise)?;
//!
//! let quote = RecordInput::new()
//!     .field("symbol", "AAPL")
//!     .field("source", "vendor1")
//!     .field("price", 150)
//!     .from_time("2024-01-01");
//! table.upsert(&quote, None)?;
//!
//! let active = table.get_active("2024-01-15")?;
//! assert_eq!(active.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod index;
pub mod storage;

/// Shared async handle
pub mod db;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::core::*;
    pub use crate::db::PitDB;
    pub use crate::engine::{
        InsertOutcome, OverlapMode, SnapshotRow, UpsertOutcome, VersionedTable,
    };
    pub use crate::error::{Error, Result};
}
