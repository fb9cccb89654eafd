//! Engine error taxonomy
//!
//! "Not enough data" is not here: it is a normal evaluation
//! outcome (`analysis::Evaluation::NotEnoughData`), not a failure. Delivery
//! failures live in [`crate::notify::NotifyError`] and never escape
//! `process_reading`; the alert simply stays eligible for the next cycle.

use crate::storage::StorageError;
use crate::types::BatchId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad OG/FG/profile setup. Caller configuration error, not retried.
    #[error("invalid batch profile: {0}")]
    InvalidProfile(String),

    /// Malformed or out-of-range sensor input. The reading is not stored.
    #[error("invalid reading: {0}")]
    InvalidReading(String),

    /// Unknown batch. The reading is dropped.
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
