//! In-memory storage for tests, simulation and minimal deployments
//!
//! Thread-safe via `RwLock`. Not durable: data is lost on restart.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::{sort_newest_first, AlertHistory, BatchRepository, ReadingStore, StorageError};
use crate::types::{
    AlertId, AlertRecord, Batch, BatchId, BatchStatus, NewBatch, PendingAlert, Reading,
    TriggerKind,
};

pub struct InMemoryStore {
    batches: RwLock<HashMap<BatchId, Batch>>,
    /// Per batch, kept sorted by timestamp
    readings: RwLock<HashMap<BatchId, Vec<Reading>>>,
    alerts: RwLock<Vec<AlertRecord>>,
    next_batch_id: AtomicU64,
    next_alert_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            batches: RwLock::new(HashMap::new()),
            readings: RwLock::new(HashMap::new()),
            alerts: RwLock::new(Vec::new()),
            next_batch_id: AtomicU64::new(1),
            next_alert_id: AtomicU64::new(1),
        }
    }

    /// Total readings across all batches.
    pub fn reading_count(&self) -> usize {
        self.readings
            .read()
            .map(|r| r.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Poisoned(e.to_string())
}

impl ReadingStore for InMemoryStore {
    fn append(&self, reading: &Reading) -> Result<(), StorageError> {
        let mut store = self.readings.write().map_err(poisoned)?;
        let series = store.entry(reading.batch_id).or_default();
        // after any equal timestamps, so duplicates keep arrival order
        let at = series.partition_point(|r| r.timestamp <= reading.timestamp);
        series.insert(at, reading.clone());
        Ok(())
    }

    fn window(
        &self,
        batch_id: BatchId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StorageError> {
        let store = self.readings.read().map_err(poisoned)?;
        Ok(store
            .get(&batch_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|r| r.timestamp >= since && r.timestamp <= until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest(&self, batch_id: BatchId) -> Result<Option<Reading>, StorageError> {
        let store = self.readings.read().map_err(poisoned)?;
        Ok(store.get(&batch_id).and_then(|s| s.last()).cloned())
    }
}

impl BatchRepository for InMemoryStore {
    fn create(&self, new: &NewBatch, created_at: DateTime<Utc>) -> Result<Batch, StorageError> {
        let id = BatchId(self.next_batch_id.fetch_add(1, Ordering::SeqCst));
        let batch = Batch {
            id,
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
            .write()
            .map_err(poisoned)?
            .insert(id, batch.clone());
        Ok(batch)
    }

    fn get(&self, batch_id: BatchId) -> Result<Option<Batch>, StorageError> {
        Ok(self.batches.read().map_err(poisoned)?.get(&batch_id).cloned())
    }

    fn list(&self) -> Result<Vec<Batch>, StorageError> {
        let mut batches: Vec<Batch> = self.batches.read().map_err(poisoned)?.values().cloned().collect();
        sort_newest_first(&mut batches);
        Ok(batches)
    }

    fn set_status(
        &self,
        batch_id: BatchId,
        status: BatchStatus,
    ) -> Result<Option<Batch>, StorageError> {
        let mut store = self.batches.write().map_err(poisoned)?;
        Ok(store.get_mut(&batch_id).map(|b| {
            b.status = status;
            b.clone()
        }))
    }
}

impl AlertHistory for InMemoryStore {
    fn exists(
        &self,
        batch_id: BatchId,
        kind: TriggerKind,
        since: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let store = self.alerts.read().map_err(poisoned)?;
        Ok(store
            .iter()
            .any(|a| a.batch_id == batch_id && a.kind == kind && a.sent_at >= since))
    }

    fn record(
        &self,
        alert: PendingAlert,
        sent_at: DateTime<Utc>,
    ) -> Result<AlertRecord, StorageError> {
        let id = AlertId(self.next_alert_id.fetch_add(1, Ordering::SeqCst));
        let record = AlertRecord::from_pending(id, alert, sent_at);
        self.alerts.write().map_err(poisoned)?.push(record.clone());
        Ok(record)
    }

    fn list(&self, batch_id: BatchId) -> Result<Vec<AlertRecord>, StorageError> {
        let store = self.alerts.read().map_err(poisoned)?;
        Ok(store
            .iter()
            .rev()
            .filter(|a| a.batch_id == batch_id)
            .cloned()
            .collect())
    }

    fn acknowledge(
        &self,
        batch_id: BatchId,
        alert_id: AlertId,
    ) -> Result<Option<AlertRecord>, StorageError> {
        let mut store = self.alerts.write().map_err(poisoned)?;
        Ok(store
            .iter_mut()
            .find(|a| a.batch_id == batch_id && a.id == alert_id)
            .map(|a| {
                a.acknowledged = true;
                a.clone()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TriggerResult;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn reading(batch: u64, hour: i64, gravity: f64) -> Reading {
        Reading {
            batch_id: BatchId(batch),
            timestamp: t0() + Duration::hours(hour),
            gravity,
            temperature: 19.0,
            battery: 90.0,
            attenuation: 0.5,
        }
    }

    fn pending(batch: u64) -> PendingAlert {
        PendingAlert {
            batch_id: BatchId(batch),
            message: "stable".into(),
            evidence: TriggerResult::GravityStable {
                range_points: 0.2,
                threshold_points: 0.5,
                window_hours: 12.0,
                span_hours: 12.0,
            },
            channel: "log".into(),
        }
    }

    #[test]
    fn readings_stay_ordered_and_keep_duplicates() {
        let store = InMemoryStore::new();
        store.append(&reading(1, 2, 1.040)).unwrap();
        store.append(&reading(1, 0, 1.050)).unwrap();
        store.append(&reading(1, 2, 1.041)).unwrap();
        store.append(&reading(2, 5, 1.060)).unwrap();

        let all = store.all(BatchId(1)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].gravity, 1.050);
        assert_eq!(store.latest(BatchId(1)).unwrap().unwrap().gravity, 1.041);

        let window = store.window(BatchId(1), t0() + Duration::hours(1), t0() + Duration::hours(2)).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(store.reading_count(), 4);
    }

    #[test]
    fn alert_history_window_and_ack() {
        let store = InMemoryStore::new();
        let rec = store.record(pending(1), t0()).unwrap();

        assert!(store.exists(BatchId(1), TriggerKind::GravityStable, t0()).unwrap());
        assert!(!store.exists(BatchId(1), TriggerKind::GravityStable, t0() + Duration::seconds(1)).unwrap());
        assert!(!store.exists(BatchId(2), TriggerKind::GravityStable, t0()).unwrap());

        assert!(store.acknowledge(BatchId(2), rec.id).unwrap().is_none());
        let acked = store.acknowledge(BatchId(1), rec.id).unwrap().unwrap();
        assert!(acked.acknowledged);
        assert!(AlertHistory::list(&store, BatchId(1)).unwrap()[0].acknowledged);
    }

    #[test]
    fn batches_are_listed_newest_first() {
        let store = InMemoryStore::new();
        let new = |name: &str, hour: i64| NewBatch {
            name: name.into(),
            yeast_profile: " Ale ".into(),
            og: 1.050,
            fg_target: 1.010,
            temp_target: 20.0,
            started_at: Some(t0() + Duration::hours(hour)),
        };
        store.create(&new("old", 0), t0()).unwrap();
        let newer = store.create(&new("new", 5), t0()).unwrap();
        assert_eq!(newer.yeast_profile, "ale");

        let listed = BatchRepository::list(&store).unwrap();
        assert_eq!(listed[0].name, "new");

        let done = store.set_status(newer.id, BatchStatus::Done).unwrap().unwrap();
        assert_eq!(done.status, BatchStatus::Done);
        assert!(store.set_status(BatchId(99), BatchStatus::Done).unwrap().is_none());
    }
}
