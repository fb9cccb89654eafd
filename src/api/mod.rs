//! REST API module using Axum
//!
//! A thin HTTP surface over the alert engine, all under `/api/v1` and
//! wrapped in the envelope from `envelope.rs`. No authentication; the
//! Telegram webhook can require the Bot API secret token header.

pub mod bot;
pub mod envelope;
pub mod handlers;
mod routes;

pub use bot::TelegramBot;
pub use handlers::ApiState;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// `server.cors_origins` lists extra allowed origins, e.g. a dashboard dev
/// server on `http://localhost:5173`.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base;
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.trim().parse().ok())
        .collect();
    tracing::info!(origins = ?origins, "CORS: allowing configured origins");
    base.allow_origin(allowed)
}

/// Create the complete application router.
pub fn create_app(state: ApiState, server: &ServerConfig) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(routes::webhook_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&server.cors_origins))
}
