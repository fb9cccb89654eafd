//! Core domain types
//!
//! - `batch`: fermentation runs and their lifecycle
//! - `reading`: sensor samples and stored readings
//! - `alert`: trigger evidence and the alert audit trail

pub mod alert;
pub mod batch;
pub mod reading;

pub use alert::{AlertId, AlertRecord, PendingAlert, TriggerKind, TriggerResult};
pub use batch::{Batch, BatchId, BatchStatus, NewBatch};
pub use reading::{DeviceReading, Reading, SensorSample};
