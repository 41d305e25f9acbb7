//! # Snapshot Persistence
//!
//! Periodic serialization of canonical state to a pluggable backend.
//!
//! Two interchangeable backends are provided: [`InMemorySnapshotStore`]
//! for tests and [`FileSnapshotStore`] for durable one-file-per-snapshot
//! storage. Save failures are the kernel's *persistence fault* class:
//! logged at error, never allowed to block tick progress.

pub mod file;
pub mod in_memory;

pub use file::FileSnapshotStore;
pub use in_memory::InMemorySnapshotStore;

use crate::domain::entities::ProductState;
use crate::domain::value_objects::{ItemId, SnapshotId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Persistence layer error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A snapshot id that does not resolve to a record.
    #[error("snapshot not found: {0}")]
    NotFound(String),
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// A point-in-time serialized copy of canonical state.
///
/// Money fields inside [`ProductState`] serialize as decimal strings with
/// an explicit currency code, never as binary floats, so a record
/// round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Unique snapshot id.
    pub id: SnapshotId,
    /// When the snapshot was taken (ISO-8601 on disk).
    pub timestamp: Timestamp,
    /// The tick at which the snapshot was taken, when known.
    pub tick: Option<u64>,
    /// The serialized state map.
    pub state: HashMap<ItemId, ProductState>,
}

impl SnapshotRecord {
    /// Creates a record with a generated id stamped now.
    #[must_use]
    pub fn new(state: HashMap<ItemId, ProductState>, tick: Option<u64>) -> Self {
        Self {
            id: SnapshotId::generate(),
            timestamp: Timestamp::now(),
            tick,
            state,
        }
    }
}

/// Pluggable snapshot backend.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persists a snapshot record and returns its id.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on backend failure.
    async fn save(&self, record: &SnapshotRecord) -> PersistenceResult<SnapshotId>;

    /// Loads the most recent snapshot, or `None` if no snapshot exists.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on backend failure.
    async fn load_latest(&self) -> PersistenceResult<Option<SnapshotRecord>>;

    /// Loads a snapshot by id, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on backend failure.
    async fn load_by_id(&self, id: &SnapshotId) -> PersistenceResult<Option<SnapshotRecord>>;

    /// Returns the number of stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on backend failure.
    async fn count(&self) -> PersistenceResult<u64>;
}
