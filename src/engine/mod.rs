//! Versioning engine: record table, overlap resolution, mutations and queries

pub mod mutation;
pub mod query;
pub mod resolver;
pub mod table;

pub use mutation::*;
pub use query::*;
pub use resolver::*;
pub use table::*;

use crate::core::record::VersionedRecord;
use crate::core::schema::Schema;
use crate::error::Result;
use crate::storage::{TableFileHeader, TableFileReader, TableFileWriter};
use std::path::Path;
use tracing::info;

/// A versioned table with a fixed schema and a default overlap mode.
///
/// The table is synchronous and owned; callers serialize access through
/// `&mut self`. See [`crate::db::PitDB`] for a shareable handle.
#[derive(Debug, Clone)]
pub struct VersionedTable {
    schema: Schema,
    default_mode: OverlapMode,
    table: RecordTable,
}

impl VersionedTable {
    /// Create an empty table
    pub fn new(schema: Schema, default_mode: OverlapMode) -> Self {
        Self {
            schema,
            default_mode,
            table: RecordTable::new(),
        }
    }

    /// Create an empty table from field name lists
    pub fn with_fields<K, V>(key_fields: K, value_fields: V, default_mode: OverlapMode) -> Result<Self>
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Ok(Self::new(Schema::new(key_fields, value_fields)?, default_mode))
    }

    /// Rebuild a table from existing rows, verifying the interval invariants
    pub fn from_rows(
        schema: Schema,
        default_mode: OverlapMode,
        rows: Vec<VersionedRecord>,
    ) -> Result<Self> {
        let table = RecordTable::from_rows(rows);
        table.check_invariants()?;
        Ok(Self {
            schema,
            default_mode,
            table,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn default_mode(&self) -> OverlapMode {
        self.default_mode
    }

    /// All rows in table order
    pub fn rows(&self) -> &[VersionedRecord] {
        self.table.rows()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn check_invariants(&self) -> Result<()> {
        self.table.check_invariants()
    }

    /// Write the whole table to a columnar table file at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<TableFileHeader> {
        let header = TableFileWriter::write(path.as_ref(), &self.schema, self.table.rows())?;
        info!(
            path = %path.as_ref().display(),
            rows = header.row_count,
            "saved table"
        );
        Ok(header)
    }

    /// Load a table previously written by [`VersionedTable::save`]
    pub fn load<P: AsRef<Path>>(path: P, default_mode: OverlapMode) -> Result<Self> {
        let mut reader = TableFileReader::open(path.as_ref())?;
        let (schema, rows) = reader.read_table()?;
        info!(path = %path.as_ref().display(), rows = rows.len(), "loaded table");
        Self::from_rows(schema, default_mode, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{KeyFilter, RecordInput};
    use crate::core::temporal::Timestamp;
    use crate::core::value::Key;
    use crate::error::Error;
    use tempfile::TempDir;

    fn quote(symbol: &str, from: &str, price: f64) -> RecordInput {
        RecordInput::new()
            .field("symbol", symbol)
            .field("source", "vendor1")
            .field("price", price)
            .field("volume", 10_000)
            .from_time(from)
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("quotes.pit");

        let mut table =
            VersionedTable::with_fields(["symbol", "source"], ["price", "volume"], OverlapMode::Raise)
                .unwrap();
        table.add(&quote("AAPL", "2024-01-01T09:30:00.123456789Z", 150.0), None).unwrap();
        table.upsert(&quote("AAPL", "2024-03-01", 155.5), None).unwrap();
        table.add(&quote("MSFT", "2024-01-01", 300.0), None).unwrap();
        table
            .delete(&KeyFilter::new().field("symbol", "MSFT"), "2024-04-15")
            .unwrap();

        let header = table.save(&path).unwrap();
        assert_eq!(header.row_count, 3);

        let loaded = VersionedTable::load(&path, OverlapMode::Skip).unwrap();
        assert_eq!(loaded.schema(), table.schema());
        assert_eq!(loaded.rows(), table.rows());
        assert_eq!(loaded.default_mode(), OverlapMode::Skip);

        let open: Vec<bool> = loaded.rows().iter().map(|r| r.is_open()).collect();
        assert_eq!(open, vec![false, true, false]);
        assert_eq!(
            loaded.rows()[0].from_time,
            Timestamp::parse("2024-01-01T09:30:00.123456789Z").unwrap()
        );
    }

    #[test]
    fn test_load_rejects_overlapping_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.pit");
        let schema = Schema::new(["id"], ["v"]).unwrap();
        let row = |from: i64| VersionedRecord {
            key: Key::new(vec![1.into()]),
            values: Default::default(),
            from_time: Timestamp::from_secs(from),
            to_time: None,
            change_time: Timestamp::from_secs(from),
        };
        TableFileWriter::write(&path, &schema, &[row(0), row(10)]).unwrap();

        assert!(matches!(
            VersionedTable::load(&path, OverlapMode::Raise),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            VersionedTable::load("/nonexistent/table.pit", OverlapMode::Raise),
            Err(Error::Io(_))
        ));
    }
}
