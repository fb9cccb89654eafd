use async_trait::async_trait;
use tracing::info;

use super::{Notifier, NotifyError};
use crate::types::BatchId;

/// Writes alerts to the log. Used when no chat channel is configured and by
/// the simulation binary.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, batch_id: BatchId, message: &str) -> Result<(), NotifyError> {
        info!(batch_id = %batch_id, "📣 ALERT\n{}", message);
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
