//! Outbound notification channels
//!
//! The engine hands every approved alert to a [`Notifier`]. A successful
//! return means delivery was confirmed; only then is the alert recorded.
//!
//! - `TelegramNotifier`: Bot API `sendMessage` with HTML formatting
//! - `LogNotifier`: writes alerts to the tracing log (no external service)

pub mod log;
pub mod telegram;

pub use self::log::LogNotifier;
pub use telegram::TelegramNotifier;

use async_trait::async_trait;

use crate::types::BatchId;

/// A delivery channel for alert messages.
///
/// At-least-once is fine: the engine tolerates a message arriving twice when
/// the confirmation itself was lost.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` for `batch_id`.
    ///
    /// # Errors
    ///
    /// Any error leaves the alert unrecorded and eligible for retry.
    async fn send(&self, batch_id: BatchId, message: &str) -> Result<(), NotifyError>;

    /// Channel type name stored with each alert record (e.g. `"telegram"`).
    fn channel_name(&self) -> &str;
}

/// Delivery failures. Always transient from the engine's point of view.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("channel rejected message ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("delivery timed out")]
    Timeout,
    #[error("channel not configured")]
    NotConfigured,
}
