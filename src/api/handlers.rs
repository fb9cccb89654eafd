//! API handlers
//!
//! Thin adapters over [`AlertEngine`]: extract, call, wrap in the envelope.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::bot::TelegramBot;
use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::defaults::{READINGS_QUERY_HOURS, READINGS_QUERY_MAX_HOURS};
use crate::engine::AlertEngine;
use crate::types::{
    AlertId, AlertRecord, Batch, BatchId, BatchStatus, DeviceReading, NewBatch, Reading,
    SensorSample,
};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<AlertEngine>,
    pub started_at: Instant,
    /// Telegram command answering; `None` disables the bot webhook
    pub bot: Option<Arc<TelegramBot>>,
}

impl ApiState {
    pub fn new(engine: Arc<AlertEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
            bot: None,
        }
    }

    pub fn with_bot(mut self, bot: TelegramBot) -> Self {
        self.bot = Some(Arc::new(bot));
        self
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub notifier: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: BatchStatus,
}

/// A manually submitted sample; the timestamp defaults to arrival time.
#[derive(Debug, Deserialize)]
pub struct ReadingRequest {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub gravity: f64,
    pub temperature: f64,
    pub battery: f64,
}

impl ReadingRequest {
    fn sample(&self) -> SensorSample {
        SensorSample {
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            gravity: self.gravity,
            temperature: self.temperature,
            battery: self.battery,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadingAccepted {
    pub batch_id: BatchId,
    pub alerts: Vec<AlertRecord>,
}

#[derive(Debug, Deserialize)]
pub struct HoursQuery {
    pub hours: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct BatchHistory {
    pub batch: Batch,
    pub readings: Vec<Reading>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
pub async fn health(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        notifier: state.engine.channel_name().to_string(),
    })
}

/// POST /api/v1/batches
pub async fn create_batch(
    State(state): State<ApiState>,
    axum::Json(request): axum::Json<NewBatch>,
) -> Response {
    match state.engine.register_batch(request) {
        Ok(batch) => ApiResponse::created(batch),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// GET /api/v1/batches
pub async fn list_batches(State(state): State<ApiState>) -> Response {
    match state.engine.list_batches() {
        Ok(batches) => ApiResponse::ok(batches),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// GET /api/v1/batches/:id
pub async fn get_batch(State(state): State<ApiState>, Path(id): Path<u64>) -> Response {
    match state.engine.get_batch(BatchId(id)) {
        Ok(batch) => ApiResponse::ok(batch),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// POST /api/v1/batches/:id/status
pub async fn update_status(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response {
    match state.engine.update_status(BatchId(id), request.status).await {
        Ok(batch) => ApiResponse::ok(batch),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// POST /api/v1/batches/:id/readings
pub async fn add_reading(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    axum::Json(request): axum::Json<ReadingRequest>,
) -> Response {
    let batch_id = BatchId(id);
    match state.engine.process_reading(batch_id, request.sample()).await {
        Ok(alerts) => ApiResponse::created(ReadingAccepted { batch_id, alerts }),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// GET /api/v1/batches/:id/readings?hours=N
pub async fn get_readings(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    Query(q): Query<HoursQuery>,
) -> Response {
    let hours = q.hours.unwrap_or(READINGS_QUERY_HOURS);
    if !(hours > 0.0 && hours <= READINGS_QUERY_MAX_HOURS) {
        return ApiErrorResponse::bad_request(format!(
            "hours must be within (0, {READINGS_QUERY_MAX_HOURS}]"
        ));
    }
    match state.engine.recent_readings(BatchId(id), hours) {
        Ok(readings) => ApiResponse::ok(readings),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// GET /api/v1/batches/:id/analysis
pub async fn get_analysis(State(state): State<ApiState>, Path(id): Path<u64>) -> Response {
    match state.engine.analyze(BatchId(id)) {
        Ok(report) => ApiResponse::ok(report),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// GET /api/v1/batches/:id/history
pub async fn get_history(State(state): State<ApiState>, Path(id): Path<u64>) -> Response {
    match state.engine.history(BatchId(id)) {
        Ok((batch, readings)) => ApiResponse::ok(BatchHistory { batch, readings }),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// GET /api/v1/batches/:id/alerts
pub async fn get_alerts(State(state): State<ApiState>, Path(id): Path<u64>) -> Response {
    match state.engine.alerts(BatchId(id)) {
        Ok(alerts) => ApiResponse::ok(alerts),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// POST /api/v1/batches/:id/alerts/:alert_id/acknowledge
pub async fn acknowledge_alert(
    State(state): State<ApiState>,
    Path((id, alert_id)): Path<(u64, u64)>,
) -> Response {
    match state.engine.acknowledge_alert(BatchId(id), AlertId(alert_id)) {
        Ok(Some(record)) => ApiResponse::ok(record),
        Ok(None) => ApiErrorResponse::not_found(format!("alert {alert_id} not found for batch {id}")),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}

/// POST /api/v1/readings/ingest
///
/// Device payloads carry no batch id; they go to the open batch started last.
pub async fn ingest_device_reading(
    State(state): State<ApiState>,
    axum::Json(payload): axum::Json<DeviceReading>,
) -> Response {
    let batch = match state.engine.current_batch() {
        Ok(Some(batch)) => batch,
        Ok(None) => return ApiErrorResponse::bad_request("no open batch to attach the reading to"),
        Err(e) => return ApiErrorResponse::from_engine(&e),
    };

    info!(
        batch_id = %batch.id,
        device = payload.device_id.as_deref().unwrap_or("unknown"),
        gravity = payload.gravity,
        "📥 Device reading received"
    );
    match state.engine.process_reading(batch.id, payload.sample()).await {
        Ok(alerts) => ApiResponse::created(ReadingAccepted {
            batch_id: batch.id,
            alerts,
        }),
        Err(e) => ApiErrorResponse::from_engine(&e),
    }
}
