//! Storage traits and backends
//!
//! The engine only talks to these traits, so backends can be swapped
//! without touching alert logic:
//! - `InMemoryStore`: tests, simulation and throwaway deployments
//! - `SledStore`: durable embedded store used by the server
//!
//! All implementations must be thread-safe (Send + Sync) for shared access
//! across async tasks. Calls are synchronous; each is a single short store
//! round-trip.

pub mod memory;
pub mod sled_store;

pub use memory::InMemoryStore;
pub use sled_store::SledStore;

use chrono::{DateTime, Utc};

use crate::types::{
    AlertId, AlertRecord, Batch, BatchId, BatchStatus, NewBatch, PendingAlert, Reading,
    TriggerKind,
};

/// Append-only time-series of readings, keyed by batch.
pub trait ReadingStore: Send + Sync {
    /// Store a reading. Equal timestamps are kept as distinct entries.
    fn append(&self, reading: &Reading) -> Result<(), StorageError>;

    /// Readings with `since <= timestamp <= until`, oldest first.
    fn window(
        &self,
        batch_id: BatchId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StorageError>;

    /// The reading with the greatest timestamp.
    fn latest(&self, batch_id: BatchId) -> Result<Option<Reading>, StorageError>;

    /// Every reading of a batch, oldest first.
    fn all(&self, batch_id: BatchId) -> Result<Vec<Reading>, StorageError> {
        self.window(batch_id, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
    }
}

pub trait BatchRepository: Send + Sync {
    /// Persist a validated registration and assign its id.
    fn create(&self, new: &NewBatch, created_at: DateTime<Utc>) -> Result<Batch, StorageError>;

    fn get(&self, batch_id: BatchId) -> Result<Option<Batch>, StorageError>;

    /// All batches, most recently started first.
    fn list(&self) -> Result<Vec<Batch>, StorageError>;

    /// `None` if the batch does not exist.
    fn set_status(
        &self,
        batch_id: BatchId,
        status: BatchStatus,
    ) -> Result<Option<Batch>, StorageError>;
}

/// Audit trail of delivered alerts.
pub trait AlertHistory: Send + Sync {
    /// Whether a (batch, kind) alert was sent at or after `since`.
    fn exists(
        &self,
        batch_id: BatchId,
        kind: TriggerKind,
        since: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Persist a confirmed delivery.
    fn record(
        &self,
        alert: PendingAlert,
        sent_at: DateTime<Utc>,
    ) -> Result<AlertRecord, StorageError>;

    /// Alerts of a batch, newest first.
    fn list(&self, batch_id: BatchId) -> Result<Vec<AlertRecord>, StorageError>;

    /// Set the acknowledged flag. `None` if no such alert belongs to the batch.
    fn acknowledge(
        &self,
        batch_id: BatchId,
        alert_id: AlertId,
    ) -> Result<Option<AlertRecord>, StorageError>;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("lock poisoned: {0}")]
    Poisoned(String),
    #[error("corrupt entry: {0}")]
    Corrupt(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Sort batches the way `BatchRepository::list` returns them.
pub(crate) fn sort_newest_first(batches: &mut [Batch]) {
    batches.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
}
