//! Sled-backed storage
//!
//! Three named trees in one database:
//!
//! | tree       | key                                  | value          |
//! |------------|--------------------------------------|----------------|
//! | `batches`  | batch id (u64 BE)                    | JSON `Batch`   |
//! | `readings` | batch id ++ timestamp key ++ seq     | JSON `Reading` |
//! | `alerts`   | batch id ++ alert id (u64 BE)        | JSON `AlertRecord` |
//!
//! Big-endian keys make lexicographic order chronological, so range scans
//! return readings oldest first and `next_back` is the latest one. The
//! trailing sequence number keeps readings with equal timestamps distinct.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{sort_newest_first, AlertHistory, BatchRepository, ReadingStore, StorageError};
use crate::types::{
    AlertId, AlertRecord, Batch, BatchId, BatchStatus, NewBatch, PendingAlert, Reading,
    TriggerKind,
};

const BATCHES_TREE: &str = "batches";
const READINGS_TREE: &str = "readings";
const ALERTS_TREE: &str = "alerts";

#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
    batches: sled::Tree,
    readings: sled::Tree,
    alerts: sled::Tree,
}

impl SledStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        let store = Self {
            batches: db.open_tree(BATCHES_TREE)?,
            readings: db.open_tree(READINGS_TREE)?,
            alerts: db.open_tree(ALERTS_TREE)?,
            db: Arc::new(db),
        };
        info!(
            path = %path.display(),
            batches = store.batches.len(),
            readings = store.readings.len(),
            alerts = store.alerts.len(),
            "Sled store opened"
        );
        Ok(store)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64, StorageError> {
        // generate_id starts at 0; ids start at 1
        Ok(self.db.generate_id()? + 1)
    }
}

/// Order-preserving key for a timestamp: nanoseconds with the sign bit
/// flipped, so pre-epoch instants sort before post-epoch ones.
fn ts_key(ts: DateTime<Utc>) -> [u8; 8] {
    let nanos = ts.timestamp_nanos_opt().unwrap_or(if ts.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    });
    ((nanos as u64) ^ (1 << 63)).to_be_bytes()
}

fn reading_key(batch_id: BatchId, ts: DateTime<Utc>, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&batch_id.to_key());
    key.extend_from_slice(&ts_key(ts));
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn alert_key(batch_id: BatchId, alert_id: AlertId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&batch_id.to_key());
    key.extend_from_slice(&alert_id.0.to_be_bytes());
    key
}

fn decode<T: DeserializeOwned>(tree: &str, value: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(value).map_err(|e| StorageError::Corrupt(format!("{tree}: {e}")))
}

impl ReadingStore for SledStore {
    fn append(&self, reading: &Reading) -> Result<(), StorageError> {
        let key = reading_key(reading.batch_id, reading.timestamp, self.db.generate_id()?);
        self.readings.insert(key, serde_json::to_vec(reading)?)?;
        Ok(())
    }

    fn window(
        &self,
        batch_id: BatchId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StorageError> {
        if since > until {
            return Ok(Vec::new());
        }
        let start = reading_key(batch_id, since, 0);
        let end = reading_key(batch_id, until, u64::MAX);
        self.readings
            .range(start..=end)
            .map(|item| {
                let (_, value) = item?;
                decode(READINGS_TREE, &value)
            })
            .collect()
    }

    fn latest(&self, batch_id: BatchId) -> Result<Option<Reading>, StorageError> {
        match self.readings.scan_prefix(batch_id.to_key()).next_back() {
            Some(item) => {
                let (_, value) = item?;
                decode(READINGS_TREE, &value).map(Some)
            }
            None => Ok(None),
        }
    }

    fn all(&self, batch_id: BatchId) -> Result<Vec<Reading>, StorageError> {
        self.readings
            .scan_prefix(batch_id.to_key())
            .map(|item| {
                let (_, value) = item?;
                decode(READINGS_TREE, &value)
            })
            .collect()
    }
}

impl BatchRepository for SledStore {
    fn create(&self, new: &NewBatch, created_at: DateTime<Utc>) -> Result<Batch, StorageError> {
        let batch = Batch {
            id: BatchId(self.next_id()?),
            name: new.name.trim().to_string(),
            yeast_profile: new.normalized_profile(),
            og: new.og,
            fg_target: new.fg_target,
            temp_target: new.temp_target,
            status: BatchStatus::Active,
            started_at: new.started_at.unwrap_or(created_at),
            created_at,
        };
        self.batches
            .insert(batch.id.to_key(), serde_json::to_vec(&batch)?)?;
        self.batches.flush()?;
        Ok(batch)
    }

    fn get(&self, batch_id: BatchId) -> Result<Option<Batch>, StorageError> {
        self.batches
            .get(batch_id.to_key())?
            .map(|value| decode(BATCHES_TREE, &value))
            .transpose()
    }

    fn list(&self) -> Result<Vec<Batch>, StorageError> {
        let mut batches = self
            .batches
            .iter()
            .map(|item| {
                let (_, value) = item?;
                decode(BATCHES_TREE, &value)
            })
            .collect::<Result<Vec<Batch>, StorageError>>()?;
        sort_newest_first(&mut batches);
        Ok(batches)
    }

    fn set_status(
        &self,
        batch_id: BatchId,
        status: BatchStatus,
    ) -> Result<Option<Batch>, StorageError> {
        let Some(mut batch) = BatchRepository::get(self, batch_id)? else {
            return Ok(None);
        };
        batch.status = status;
        self.batches
            .insert(batch_id.to_key(), serde_json::to_vec(&batch)?)?;
        self.batches.flush()?;
        Ok(Some(batch))
    }
}

impl AlertHistory for SledStore {
    fn exists(
        &self,
        batch_id: BatchId,
        kind: TriggerKind,
        since: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        for item in self.alerts.scan_prefix(batch_id.to_key()).rev() {
            let (_, value) = item?;
            let record: AlertRecord = decode(ALERTS_TREE, &value)?;
            if record.kind == kind && record.sent_at >= since {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn record(
        &self,
        alert: PendingAlert,
        sent_at: DateTime<Utc>,
    ) -> Result<AlertRecord, StorageError> {
        let record = AlertRecord::from_pending(AlertId(self.next_id()?), alert, sent_at);
        self.alerts.insert(
            alert_key(record.batch_id, record.id),
            serde_json::to_vec(&record)?,
        )?;
        // the dedup check depends on this entry surviving a crash
        self.alerts.flush()?;
        Ok(record)
    }

    fn list(&self, batch_id: BatchId) -> Result<Vec<AlertRecord>, StorageError> {
        self.alerts
            .scan_prefix(batch_id.to_key())
            .rev()
            .map(|item| {
                let (_, value) = item?;
                decode(ALERTS_TREE, &value)
            })
            .collect()
    }

    fn acknowledge(
        &self,
        batch_id: BatchId,
        alert_id: AlertId,
    ) -> Result<Option<AlertRecord>, StorageError> {
        let key = alert_key(batch_id, alert_id);
        let Some(value) = self.alerts.get(&key)? else {
            return Ok(None);
        };
        let mut record: AlertRecord = decode(ALERTS_TREE, &value)?;
        record.acknowledged = true;
        self.alerts.insert(key, serde_json::to_vec(&record)?)?;
        self.alerts.flush()?;
        Ok(Some(record))
    }
}
