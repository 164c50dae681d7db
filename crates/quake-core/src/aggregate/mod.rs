//! Per-event-type aggregation and delivery
//!
//! Each aggregator turns one envelope into structured notifications and
//! fans them out to every destination whose threshold the event meets.
//! Delivery failures are isolated per destination.

pub mod cache;
pub mod eew;
pub mod quake;
pub mod stub;

pub use cache::EventCache;
pub use eew::{EewAggregator, reduce_to_max_scale};
pub use quake::{IntensityGroups, QuakeAggregator, group_by_intensity};

use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use std::fmt;
use tracing::{info, warn};

use crate::notification::{Destination, Notification};
use crate::traits::Notifier;

/// Why an event was dropped before delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The quake carries no observation points
    NoObservations,
    /// The quake carries no hypocenter
    NoHypocenter,
    /// The hypocenter has an empty name
    EmptyHypocenterName,
    /// The hypocenter carries the "no location" sentinel
    NoLocation,
    /// No forecast area survived the max-scale reduction
    NoForecastAreas,
    /// The warning carries no earthquake metadata
    NoEarthquakeMetadata,
    /// The destination list could not be read
    DestinationsUnavailable(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NoObservations => f.write_str("no observation points"),
            AbortReason::NoHypocenter => f.write_str("no hypocenter"),
            AbortReason::EmptyHypocenterName => f.write_str("no location name"),
            AbortReason::NoLocation => f.write_str("no location"),
            AbortReason::NoForecastAreas => f.write_str("no forecast areas"),
            AbortReason::NoEarthquakeMetadata => f.write_str("no earthquake metadata"),
            AbortReason::DestinationsUnavailable(e) => write!(f, "destinations unavailable: {}", e),
        }
    }
}

/// Result of handling one envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Delivery was attempted to every eligible destination
    Delivered {
        /// Destinations a delivery was attempted to
        attempted: usize,
        /// Destinations whose delivery failed
        failed: usize,
    },
    /// The event was dropped before delivery
    Aborted(AbortReason),
    /// The event is deliberately not processed
    Skipped(&'static str),
    /// The event type has no behaviour yet
    NotImplemented,
    /// The envelope carried an unrecognised code
    Ignored,
}

/// Offset of the feed's timestamps (JST)
const FEED_OFFSET_SECS: i32 = 9 * 3600;

/// Convert a feed timestamp (`2024/01/01 16:10:09.123`, JST) to RFC 3339
///
/// Returns `None` for timestamps in any other shape.
pub fn feed_timestamp(time: &str) -> Option<String> {
    let naive = NaiveDateTime::parse_from_str(time, "%Y/%m/%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(time, "%Y/%m/%d %H:%M:%S"))
        .ok()?;
    let offset = FixedOffset::east_opt(FEED_OFFSET_SECS)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|t| t.to_rfc3339())
}

/// Deliver a notification to every destination that accepts `max_scale`
///
/// Failures are logged and counted; remaining destinations are still
/// attempted.
pub(crate) async fn deliver_to_all(
    notifier: &dyn Notifier,
    destinations: &[Destination],
    max_scale: i32,
    notification: &Notification,
    context: &str,
) -> Outcome {
    let mut attempted = 0;
    let mut failed = 0;

    for destination in destinations.iter().filter(|d| d.accepts(max_scale)) {
        attempted += 1;
        match notifier.deliver(destination, notification).await {
            Ok(receipt) => info!(
                "{}: sent to {} ({} messages)",
                context,
                destination.display_name(),
                receipt.messages_sent
            ),
            Err(e) => {
                failed += 1;
                warn!(
                    "{}: delivery to {} via {} failed: {}",
                    context,
                    destination.display_name(),
                    notifier.notifier_name(),
                    e
                );
            }
        }
    }

    Outcome::Delivered { attempted, failed }
}
