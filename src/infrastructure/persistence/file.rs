//! # File Snapshot Store
//!
//! Durable [`SnapshotStore`] writing one JSON file per snapshot.
//!
//! Files are named `<snapshot-id>.json` inside a dedicated directory; the
//! latest snapshot is the file with the newest modification time.

use crate::domain::value_objects::SnapshotId;
use crate::infrastructure::persistence::{PersistenceResult, SnapshotRecord, SnapshotStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const SNAPSHOT_EXTENSION: &str = "json";

/// Snapshot backend persisting each record as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Creates a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the directory snapshots are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &SnapshotId) -> PathBuf {
        self.dir.join(format!("{id}.{SNAPSHOT_EXTENSION}"))
    }

    async fn snapshot_paths(&self) -> PersistenceResult<Vec<(PathBuf, SystemTime)>> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            paths.push((path, modified));
        }
        Ok(paths)
    }

    async fn read_record(path: &Path) -> PersistenceResult<SnapshotRecord> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, record: &SnapshotRecord) -> PersistenceResult<SnapshotId> {
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.path_for(&record.id), bytes).await?;
        Ok(record.id.clone())
    }

    async fn load_latest(&self) -> PersistenceResult<Option<SnapshotRecord>> {
        let paths = self.snapshot_paths().await?;
        let Some((latest, _)) = paths.into_iter().max_by_key(|(_, modified)| *modified) else {
            return Ok(None);
        };
        Ok(Some(Self::read_record(&latest).await?))
    }

    async fn load_by_id(&self, id: &SnapshotId) -> PersistenceResult<Option<SnapshotRecord>> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn count(&self) -> PersistenceResult<u64> {
        Ok(self.snapshot_paths().await?.len() as u64)
    }
}
