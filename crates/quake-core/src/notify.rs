//! Built-in notifiers

use async_trait::async_trait;
use tracing::info;

use crate::config::NotifierConfig;
use crate::error::Result;
use crate::notification::{DeliveryReceipt, Destination, Notification};
use crate::traits::{Notifier, NotifierFactory};

/// Notifier that writes every notification to the log
///
/// Useful for dry runs: the full structured content, follow-ups
/// included, appears in the tracing output instead of being sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(
        &self,
        destination: &Destination,
        notification: &Notification,
    ) -> Result<DeliveryReceipt> {
        let rendered = serde_json::to_string(notification)?;
        info!(
            guild = %destination.guild_id,
            channel = %destination.channel_id,
            "notification: {}",
            rendered
        );

        Ok(DeliveryReceipt {
            channel_id: destination.channel_id.clone(),
            message_id: None,
            messages_sent: notification.message_count(),
        })
    }

    fn notifier_name(&self) -> &'static str {
        "log"
    }
}

/// Factory for [`LogNotifier`]
pub struct LogNotifierFactory;

impl NotifierFactory for LogNotifierFactory {
    fn create(&self, _config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(LogNotifier))
    }
}
