//! # In-Memory Snapshot Store
//!
//! Volatile implementation of [`SnapshotStore`] for tests.

use crate::domain::value_objects::SnapshotId;
use crate::infrastructure::persistence::{PersistenceResult, SnapshotRecord, SnapshotStore};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-memory snapshot backend. "Latest" is the most recently saved record.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    records: RwLock<Vec<SnapshotRecord>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all stored snapshots.
    pub async fn clear(&self) {
        let mut records = self.records.write().await;
        records.clear();
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, record: &SnapshotRecord) -> PersistenceResult<SnapshotId> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(record.id.clone())
    }

    async fn load_latest(&self) -> PersistenceResult<Option<SnapshotRecord>> {
        let records = self.records.read().await;
        Ok(records.last().cloned())
    }

    async fn load_by_id(&self, id: &SnapshotId) -> PersistenceResult<Option<SnapshotRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| &r.id == id).cloned())
    }

    async fn count(&self) -> PersistenceResult<u64> {
        let records = self.records.read().await;
        Ok(records.len() as u64)
    }
}
