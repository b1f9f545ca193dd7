//! Shared database handle for concurrent callers

use crate::config::StoreConfig;
use crate::core::record::{KeyFilter, RecordInput, VersionedRecord};
use crate::core::schema::Schema;
use crate::core::temporal::TimeInput;
use crate::engine::{InsertOutcome, OverlapMode, SnapshotRow, UpsertOutcome, VersionedTable};
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Point-in-time database: a [`VersionedTable`] behind an async lock.
///
/// Writers hold the write lock for the whole mutation; readers share the
/// read lock and receive owned rows. Cloning the handle shares the table.
#[derive(Clone)]
pub struct PitDB {
    table: Arc<RwLock<VersionedTable>>,
}

impl PitDB {
    /// Wrap an existing table
    pub fn new(table: VersionedTable) -> Self {
        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }

    /// Create an empty database from a configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(config.build_table()?))
    }

    /// Open a saved table file
    pub fn open<P: AsRef<Path>>(path: P, default_mode: OverlapMode) -> Result<Self> {
        Ok(Self::new(VersionedTable::load(path, default_mode)?))
    }

    pub async fn add(&self, input: &RecordInput, mode: Option<OverlapMode>) -> Result<InsertOutcome> {
        self.table.write().await.add(input, mode)
    }

    pub async fn upsert(&self, input: &RecordInput, mode: Option<OverlapMode>) -> Result<UpsertOutcome> {
        self.table.write().await.upsert(input, mode)
    }

    pub async fn batch_upsert(
        &self,
        inputs: &[RecordInput],
        mode: Option<OverlapMode>,
    ) -> Result<Vec<UpsertOutcome>> {
        self.table.write().await.batch_upsert(inputs, mode)
    }

    pub async fn delete(&self, filter: &KeyFilter, delete_time: impl Into<TimeInput>) -> Result<usize> {
        self.table.write().await.delete(filter, delete_time)
    }

    pub async fn get_active(&self, timestamp: impl Into<TimeInput>) -> Result<Vec<VersionedRecord>> {
        let table = self.table.read().await;
        Ok(table.get_active(timestamp)?.into_iter().cloned().collect())
    }

    pub async fn latest(&self) -> Vec<VersionedRecord> {
        self.table.read().await.latest().into_iter().cloned().collect()
    }

    pub async fn full_history(&self, filter: Option<&KeyFilter>) -> Result<Vec<VersionedRecord>> {
        let table = self.table.read().await;
        Ok(table.full_history(filter)?.into_iter().cloned().collect())
    }

    pub async fn snapshot<I, T>(&self, timestamps: I) -> Result<Vec<SnapshotRow>>
    where
        I: IntoIterator<Item = T>,
        T: Into<TimeInput>,
    {
        self.table.read().await.snapshot(timestamps)
    }

    /// Save under the read lock; concurrent readers are not blocked
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.table.read().await.save(path)?;
        Ok(())
    }

    pub async fn schema(&self) -> Schema {
        self.table.read().await.schema().clone()
    }

    /// Consistent copy of the whole table
    pub async fn snapshot_table(&self) -> VersionedTable {
        self.table.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::temporal::Timestamp;
    use crate::core::value::Scalar;
    use tempfile::TempDir;

    fn config() -> StoreConfig {
        StoreConfig {
            key_fields: vec!["user".to_string()],
            value_fields: vec!["status".to_string()],
            default_overlap_mode: "raise".to_string(),
        }
    }

    fn status(user: &str, status: &str, from: i64) -> RecordInput {
        RecordInput::new()
            .field("user", user)
            .field("status", status)
            .from_time(Timestamp::from_secs(from))
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let db = PitDB::from_config(&config()).unwrap();

        db.upsert(&status("user:1", "active", 1000), None).await.unwrap();
        db.upsert(&status("user:1", "inactive", 2000), None).await.unwrap();

        let at_1500 = db.get_active(Timestamp::from_secs(1500)).await.unwrap();
        assert_eq!(at_1500.len(), 1);
        assert_eq!(at_1500[0].values["status"], Scalar::from("active"));

        let latest = db.latest().await;
        assert_eq!(latest[0].values["status"], Scalar::from("inactive"));

        assert!(db.get_active(Timestamp::from_secs(500)).await.unwrap().is_empty());
        assert_eq!(db.full_history(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_readers_and_writer() {
        let db = PitDB::from_config(&config()).unwrap();

        let writer = {
            let db = db.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    db.upsert(&status("user:1", &format!("s{i}"), 1000 + i), None)
                        .await
                        .unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        assert!(db.latest().await.len() <= 1);
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        let table = db.snapshot_table().await;
        assert_eq!(table.len(), 50);
        table.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_save_and_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.pit");

        let db = PitDB::from_config(&config()).unwrap();
        db.add(&status("user:1", "active", 1000), None).await.unwrap();
        db.delete(&KeyFilter::new().field("user", "user:1"), Timestamp::from_secs(3000))
            .await
            .unwrap();
        db.save(&path).await.unwrap();

        let reopened = PitDB::open(&path, OverlapMode::Raise).unwrap();
        assert_eq!(reopened.full_history(None).await.unwrap(), db.full_history(None).await.unwrap());
        assert!(reopened.latest().await.is_empty());
        let snap = reopened.snapshot([Timestamp::from_secs(2000)]).await.unwrap();
        assert_eq!(snap.len(), 1);
    }
}
