//! Telegram bot webhook
//!
//! `POST /webhook/telegram` receives Bot API updates and answers `/start`,
//! `/status` and `/help` in the chat they came from. Telegram only looks at
//! the status code, so the body is a bare `{"ok": ...}` instead of the API
//! envelope.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::envelope::ApiErrorResponse;
use super::handlers::ApiState;
use crate::analysis::AnalysisReport;
use crate::error::EngineError;
use crate::notify::TelegramNotifier;

/// Header carrying the `secret_token` registered with `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Command answering, present when a Telegram bot is configured.
pub struct TelegramBot {
    notifier: Arc<TelegramNotifier>,
    secret: Option<String>,
}

impl TelegramBot {
    pub fn new(notifier: Arc<TelegramNotifier>, secret: Option<String>) -> Self {
        Self { notifier, secret }
    }

    fn accepts(&self, headers: &HeaderMap) -> bool {
        match &self.secret {
            None => true,
            Some(expected) => {
                headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
            }
        }
    }

    /// Only the alert chat may see batch details.
    fn is_alert_chat(&self, chat_id: i64) -> bool {
        self.notifier.chat_id() == chat_id.to_string()
    }
}

// ============================================================================
// Bot API update (only the fields we read)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Status,
    Help,
    Unknown(String),
}

impl BotCommand {
    /// Parse the first word. In groups commands arrive as `/status@my_bot`.
    pub fn parse(text: &str) -> Self {
        let word = text.split_whitespace().next().unwrap_or_default();
        match word.split('@').next().unwrap_or_default() {
            "/start" => BotCommand::Start,
            "/status" => BotCommand::Status,
            "/help" => BotCommand::Help,
            _ => BotCommand::Unknown(text.trim().to_string()),
        }
    }
}

/// Reply text for a command; `report` is the open batch's analysis, if any.
pub fn render_reply(command: &BotCommand, report: Option<&AnalysisReport>) -> String {
    match command {
        BotCommand::Start => {
            "🍺 Welcome to ferment-watch!\n\n/status - current batch\n/help - commands".to_string()
        }
        BotCommand::Help => {
            "🆘 Commands:\n/start - welcome\n/status - current batch\n/help - this list".to_string()
        }
        BotCommand::Status => status_text(report),
        BotCommand::Unknown(text) => format!("Unknown command: {text}\nSend /help for the list."),
    }
}

fn status_text(report: Option<&AnalysisReport>) -> String {
    let Some(report) = report else {
        return "✅ Online\n\nNo open batch.".to_string();
    };
    let batch = &report.batch;
    match &report.latest {
        None => format!("✅ Online\n\n🍺 {} ({})\nNo readings yet.", batch.name, batch.status),
        Some(latest) => format!(
            "✅ Online\n\n\
             🍺 {} ({})\n\
             ⚖️ Gravity: {:.4}\n\
             📈 Attenuation: {:.1}% (target {:.0}%)\n\
             🌡️ Temperature: {:.1}°C\n\
             🕒 {}",
            batch.name,
            batch.status,
            latest.gravity,
            latest.attenuation * 100.0,
            report.attenuation_threshold * 100.0,
            latest.temperature,
            latest.timestamp.format("%Y-%m-%d %H:%M UTC"),
        ),
    }
}

fn current_report(state: &ApiState) -> Result<Option<AnalysisReport>, EngineError> {
    match state.engine.current_batch()? {
        Some(batch) => Ok(Some(state.engine.analyze(batch.id)?)),
        None => Ok(None),
    }
}

fn ack(ok: bool) -> Response {
    (StatusCode::OK, Json(json!({ "ok": ok }))).into_response()
}

// ============================================================================
// Handler
// ============================================================================

/// POST /webhook/telegram
pub async fn telegram_webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Response {
    let Some(bot) = state.bot.clone() else {
        return ApiErrorResponse::not_found("Telegram bot is not configured");
    };
    if !bot.accepts(&headers) {
        warn!("Telegram webhook call without a valid secret token");
        return ApiErrorResponse::unauthorized("invalid webhook secret");
    }

    let Some(message) = update.message else {
        return ack(true);
    };
    let chat_id = message.chat.id;
    let Some(text) = message.text.filter(|t| !t.trim().is_empty()) else {
        return ack(true);
    };

    let command = BotCommand::parse(&text);
    info!(chat_id, command = ?command, "🤖 Bot command received");

    let reply = if command == BotCommand::Status && !bot.is_alert_chat(chat_id) {
        "This bot only reports to its alert chat.".to_string()
    } else if command == BotCommand::Status {
        match current_report(&state) {
            Ok(report) => render_reply(&command, report.as_ref()),
            Err(e) => return ApiErrorResponse::from_engine(&e),
        }
    } else {
        render_reply(&command, None)
    };

    match bot.notifier.reply(chat_id, &reply).await {
        Ok(()) => ack(true),
        Err(e) => {
            warn!(chat_id, error = %e, "Bot reply failed");
            ack(false)
        }
    }
}
