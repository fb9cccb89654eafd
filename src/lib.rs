//! ferment-watch: Fermentation Monitor
//!
//! Turns periodic hydrometer readings (gravity, temperature, battery) into
//! deduplicated brewer notifications, chiefly "time for the diacetyl rest".
//!
//! ## Architecture
//!
//! - **Analysis**: attenuation, trigger evaluators and the gravity forecast
//!   (pure functions over a window of readings)
//! - **Engine**: composes the analysis per reading, serializes work per
//!   batch and gates alerts through arming state and alert history
//! - **Storage**: reading store, batch repository and alert history traits
//!   with in-memory and sled backends
//! - **Notify**: Telegram and log channels
//! - **API**: thin axum surface; **Poller**: RAPT cloud to ingest endpoint

pub mod analysis;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod poller;
pub mod storage;
pub mod types;

pub use config::MonitorConfig;
pub use engine::AlertEngine;
pub use error::EngineError;

pub use types::{
    AlertId, AlertRecord, Batch, BatchId, BatchStatus, DeviceReading, NewBatch, PendingAlert,
    Reading, SensorSample, TriggerKind, TriggerResult,
};

pub use analysis::{AnalysisReport, Evaluation, ForecastOutcome};
pub use notify::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
pub use storage::{AlertHistory, BatchRepository, InMemoryStore, ReadingStore, SledStore, StorageError};
