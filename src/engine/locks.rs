//! Sharded per-batch lock table
//!
//! Each batch owns one async mutex guarding its [`ArmTable`]. Holding it
//! serializes the evaluate, history check and record sequence for that
//! batch, while different batches never contend. Slots of finished batches
//! are released so the table only tracks live ones.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::arming::ArmTable;
use crate::types::BatchId;

#[derive(Default)]
pub struct BatchLocks {
    slots: DashMap<BatchId, Arc<Mutex<ArmTable>>>,
}

impl BatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock slot for a batch, created on first use.
    ///
    /// The shard guard is released before returning so callers can await
    /// the mutex without blocking other batches in the same shard.
    pub fn slot(&self, batch_id: BatchId) -> Arc<Mutex<ArmTable>> {
        self.slots.entry(batch_id).or_default().value().clone()
    }

    /// Drop the slot of a batch nobody is using.
    ///
    /// Returns `false` (and keeps the slot) while any caller still holds a
    /// handle to it; the check and the removal happen under the shard lock.
    pub fn release(&self, batch_id: BatchId) -> bool {
        self.slots
            .remove_if(&batch_id, |_, slot| Arc::strong_count(slot) == 1)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_batch_shares_a_slot() {
        let locks = BatchLocks::new();
        let a = locks.slot(BatchId(1));
        let b = locks.slot(BatchId(1));
        assert!(Arc::ptr_eq(&a, &b));

        let _held = a.lock().await;
        assert!(b.try_lock().is_err());
        // other batches are independent
        assert!(locks.slot(BatchId(2)).try_lock().is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn release_skips_slots_in_use() {
        let locks = BatchLocks::new();
        let held = locks.slot(BatchId(1));
        assert!(!locks.release(BatchId(1)));
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.release(BatchId(1)));
        assert!(locks.is_empty());
        assert!(!locks.release(BatchId(1)));
    }
}
