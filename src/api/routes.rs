//! API route definitions
//!
//! - /health - liveness and uptime
//! - /batches - registration, listing, status
//! - /batches/:id/readings - manual samples and recent readings
//! - /batches/:id/analysis - on-demand trigger and forecast report
//! - /batches/:id/alerts - alert audit trail and acknowledgement
//! - /readings/ingest - device poller endpoint
//!
//! The Telegram bot webhook lives outside `/api/v1` at `/webhook/telegram`.

use axum::{routing::{get, post}, Router};

use super::bot;
use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/batches", get(handlers::list_batches).post(handlers::create_batch))
        .route("/batches/:id", get(handlers::get_batch))
        .route("/batches/:id/status", post(handlers::update_status))
        .route(
            "/batches/:id/readings",
            get(handlers::get_readings).post(handlers::add_reading),
        )
        .route("/batches/:id/analysis", get(handlers::get_analysis))
        .route("/batches/:id/history", get(handlers::get_history))
        .route("/batches/:id/alerts", get(handlers::get_alerts))
        .route(
            "/batches/:id/alerts/:alert_id/acknowledge",
            post(handlers::acknowledge_alert),
        )
        .route("/readings/ingest", post(handlers::ingest_device_reading))
        .with_state(state)
}

pub fn webhook_routes(state: ApiState) -> Router {
    Router::new()
        .route("/webhook/telegram", post(bot::telegram_webhook))
        .with_state(state)
}
