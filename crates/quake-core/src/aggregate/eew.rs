//! Earthquake early warning (code 556)
//!
//! Only drill/test-flagged warnings are processed. Forecast areas are
//! reduced to those sharing the single highest upper-bound scale, sorted
//! by prefecture in ordinal order, and listed per prefecture.

use std::sync::Arc;

use tracing::{debug, info};

use super::{AbortReason, Outcome, deliver_to_all, feed_timestamp};
use crate::event::{Eew, ForecastArea};
use crate::intensity::{self, SCALE_MIN_FELT, SCALE_UNKNOWN};
use crate::notification::{COLOR_RED, Notification};
use crate::traits::{DestinationSource, Notifier};

/// Keep only the areas sharing the highest `scale_to_upper_bound`
///
/// Single pass: a strictly greater bound restarts the kept set, an
/// equal bound joins it. The result is sorted by prefecture using
/// ordinal string comparison.
pub fn reduce_to_max_scale(areas: &[ForecastArea]) -> Vec<ForecastArea> {
    let mut kept: Vec<ForecastArea> = Vec::new();
    for area in areas {
        match kept.first().map(|first| first.scale_to_upper_bound) {
            Some(max) if area.scale_to_upper_bound == max => kept.push(area.clone()),
            Some(max) if area.scale_to_upper_bound < max => {}
            _ => kept = vec![area.clone()],
        }
    }
    kept.sort_by(|a, b| a.prefecture.cmp(&b.prefecture));
    kept
}

/// Render `prefecture: name、name` lines, prefectures in first-seen order
pub fn area_lines(areas: &[ForecastArea]) -> Vec<String> {
    let mut by_prefecture: Vec<(&str, Vec<&str>)> = Vec::new();
    for area in areas {
        match by_prefecture
            .iter_mut()
            .find(|(prefecture, _)| *prefecture == area.prefecture)
        {
            Some((_, names)) => names.push(area.name.as_str()),
            None => by_prefecture.push((area.prefecture.as_str(), vec![area.name.as_str()])),
        }
    }

    by_prefecture
        .into_iter()
        .map(|(prefecture, names)| format!("{}: {}", prefecture, names.join("、")))
        .collect()
}

/// Aggregator for earthquake early warnings
pub struct EewAggregator {
    notifier: Arc<dyn Notifier>,
    destinations: Arc<dyn DestinationSource>,
}

impl EewAggregator {
    /// Create an aggregator
    pub fn new(notifier: Arc<dyn Notifier>, destinations: Arc<dyn DestinationSource>) -> Self {
        Self {
            notifier,
            destinations,
        }
    }

    /// Handle one early warning
    pub async fn handle(&self, eew: &Eew) -> Outcome {
        if !eew.test {
            debug!("eew {}: not a test warning, skipped", eew.id);
            return Outcome::Skipped("not a test warning");
        }

        let areas = reduce_to_max_scale(&eew.areas);
        if areas.is_empty() {
            return abort(&eew.id, AbortReason::NoForecastAreas);
        }
        let Some(earthquake) = &eew.earthquake else {
            return abort(&eew.id, AbortReason::NoEarthquakeMetadata);
        };

        let max_scale = areas
            .iter()
            .map(|area| area.scale_to_upper_bound)
            .max()
            .unwrap_or(SCALE_UNKNOWN);
        let label = intensity::classify(max_scale);
        if max_scale < SCALE_MIN_FELT || label.is_unknown() {
            // Delivery still proceeds for unfelt or unrecognised maxima
            debug!("eew {}: maximum scale {} is below the felt range", eew.id, max_scale);
        }

        let mut notification = Notification::new("緊急地震速報")
            .field("最大予測震度", label.as_str())
            .field("最大震度観測予定地", area_lines(&areas).join("\n"))
            .field("発生日時", earthquake.origin_time.as_str());
        notification.color = Some(COLOR_RED);
        notification.timestamp = feed_timestamp(&eew.time);

        let destinations = match self.destinations.destinations().await {
            Ok(destinations) => destinations,
            Err(e) => return abort(&eew.id, AbortReason::DestinationsUnavailable(e.to_string())),
        };

        let context = format!("eew {}", eew.id);
        deliver_to_all(
            self.notifier.as_ref(),
            &destinations,
            max_scale,
            &notification,
            &context,
        )
        .await
    }
}

fn abort(id: &str, reason: AbortReason) -> Outcome {
    info!("eew {}: {}, not delivered", id, reason);
    Outcome::Aborted(reason)
}
