// # Notifier Trait
//
// Defines the interface for delivering notifications to a destination.
//
// ## Implementations
//
// - Log: `LogNotifier` (built in, writes notifications to the log)
// - Webhook: `quake-notify-webhook` crate
//
// ## Usage
//
// ```rust,ignore
// use quake_core::{Destination, Notification};
// use quake_core::traits::Notifier;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let notifier = /* Notifier implementation */;
//
//     let destination = Destination::new("guild", "channel", 30);
//     notifier.deliver(&destination, &Notification::new("地震情報")).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::notification::{DeliveryReceipt, Destination, Notification};

/// Trait for notifier implementations
///
/// Implementations render a [`Notification`] in their target's format
/// and deliver it, including any follow-up thread, to one destination.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to their endpoint only
/// - ✅ Render notifications in the target's format
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed delivery is logged and skipped)
/// - ❌ Filter destinations (owned by the aggregators)
/// - ❌ Spawn tasks or threads
/// - ❌ Access other notifiers or the geocode store
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification to one destination
    ///
    /// # Returns
    ///
    /// - `Ok(DeliveryReceipt)`: Delivered
    /// - `Err(Error)`: Delivery failed; other destinations are unaffected
    async fn deliver(
        &self,
        destination: &Destination,
        notification: &Notification,
    ) -> Result<DeliveryReceipt, crate::Error>;

    /// Notifier name (for logging)
    fn notifier_name(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create a Notifier instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn Notifier>, crate::Error>;
}
