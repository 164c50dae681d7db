//! JMA earthquake information (code 551)
//!
//! Observation points are grouped by intensity scale (descending), then
//! by prefecture (locale-aware collation), then by address (deduplicated,
//! ascending). The primary notification describes the hypocenter; one
//! threaded follow-up per scale lists the affected addresses.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use icu_locale_core::Locale;
use tracing::{debug, info};

use super::{AbortReason, Outcome, deliver_to_all, feed_timestamp};
use crate::Error;
use crate::event::{Hypocenter, JmaQuake, ObservationPoint};
use crate::geocode::GeocodeResolver;
use crate::intensity::{self, IntensityLabel};
use crate::notification::{Destination, FollowUpThread, Notification};
use crate::traits::{Coordinates, DestinationSource, MapRenderer, Notifier};

/// Addresses per prefecture at one intensity scale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityGroup {
    /// Intensity scale shared by every address in the group
    pub scale: i32,
    /// `(prefecture, addresses)`, prefectures in collation order
    pub prefectures: Vec<(String, Vec<String>)>,
}

/// Intensity groups, highest scale first
pub type IntensityGroups = Vec<IntensityGroup>;

/// Build a collator for ordering prefectures
pub fn collator_for(locale: &str) -> Result<CollatorBorrowed<'static>, Error> {
    let locale: Locale = locale
        .parse()
        .map_err(|e| Error::config(format!("Invalid collation locale {}: {:?}", locale, e)))?;
    Collator::try_new(locale.into(), CollatorOptions::default())
        .map_err(|e| Error::config(format!("No collation data for locale: {}", e)))
}

/// Group observation points by scale, prefecture and address
pub fn group_by_intensity(
    points: &[ObservationPoint],
    collator: &CollatorBorrowed<'_>,
) -> IntensityGroups {
    let mut by_scale: BTreeMap<Reverse<i32>, HashMap<&str, BTreeSet<&str>>> = BTreeMap::new();
    for point in points {
        by_scale
            .entry(Reverse(point.intensity_scale))
            .or_default()
            .entry(point.prefecture.as_str())
            .or_default()
            .insert(point.address.as_str());
    }

    by_scale
        .into_iter()
        .map(|(Reverse(scale), by_prefecture)| {
            let mut prefectures: Vec<(String, Vec<String>)> = by_prefecture
                .into_iter()
                .map(|(prefecture, addresses)| {
                    (
                        prefecture.to_string(),
                        addresses.into_iter().map(str::to_string).collect(),
                    )
                })
                .collect();
            prefectures.sort_by(|a, b| collator.compare(&a.0, &b.0));
            IntensityGroup { scale, prefectures }
        })
        .collect()
}

/// Aggregator for JMA earthquake information
pub struct QuakeAggregator {
    notifier: Arc<dyn Notifier>,
    destinations: Arc<dyn DestinationSource>,
    collator: CollatorBorrowed<'static>,
    map: Option<Arc<dyn MapRenderer>>,
    resolver: Option<Arc<GeocodeResolver>>,
    max_map_markers: usize,
}

impl QuakeAggregator {
    /// Create an aggregator ordering prefectures by `collation_locale`
    pub fn new(
        notifier: Arc<dyn Notifier>,
        destinations: Arc<dyn DestinationSource>,
        collation_locale: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            notifier,
            destinations,
            collator: collator_for(collation_locale)?,
            map: None,
            resolver: None,
            max_map_markers: 0,
        })
    }

    /// Attach a map image to primary notifications
    pub fn with_map(mut self, map: Arc<dyn MapRenderer>) -> Self {
        self.map = Some(map);
        self
    }

    /// Pin up to `max_markers` geocoded addresses of the highest scale on the map
    pub fn with_resolver(mut self, resolver: Arc<GeocodeResolver>, max_markers: usize) -> Self {
        self.resolver = Some(resolver);
        self.max_map_markers = max_markers;
        self
    }

    /// Handle one quake report
    pub async fn handle(&self, quake: &JmaQuake) -> Outcome {
        let points = quake.points.as_deref().unwrap_or_default();
        let groups = group_by_intensity(points, &self.collator);

        let hypocenter = match check_reportable(quake, &groups) {
            Ok(hypocenter) => hypocenter,
            Err(reason) => {
                info!("quake {}: {}, not delivered", quake.id, reason);
                return Outcome::Aborted(reason);
            }
        };

        let max_scale = quake.earthquake.max_scale;
        let label = intensity::classify(max_scale);

        let destinations = match self.destinations.destinations().await {
            Ok(destinations) => destinations,
            Err(e) => {
                let reason = AbortReason::DestinationsUnavailable(e.to_string());
                info!("quake {}: {}, not delivered", quake.id, reason);
                return Outcome::Aborted(reason);
            }
        };
        if !destinations.iter().any(|d| d.accepts(max_scale)) {
            debug!("quake {}: no destination accepts scale {}", quake.id, max_scale);
            return Outcome::Delivered {
                attempted: 0,
                failed: 0,
            };
        }

        let image_url = self.map_image(hypocenter, &groups).await;
        let notification = build_notification(quake, hypocenter, label, &groups, image_url);

        self.deliver(&destinations, max_scale, &notification, &quake.id)
            .await
    }

    async fn deliver(
        &self,
        destinations: &[Destination],
        max_scale: i32,
        notification: &Notification,
        id: &str,
    ) -> Outcome {
        let context = format!("quake {}", id);
        deliver_to_all(
            self.notifier.as_ref(),
            destinations,
            max_scale,
            notification,
            &context,
        )
        .await
    }

    async fn map_image(&self, hypocenter: &Hypocenter, groups: &IntensityGroups) -> Option<String> {
        let map = self.map.as_ref()?;
        let center = Coordinates::new(hypocenter.latitude, hypocenter.longitude);

        let mut markers = Vec::new();
        if let (Some(resolver), Some(top)) = (&self.resolver, groups.first()) {
            // Owned before awaiting so the handler future stays spawnable
            let addresses = marker_addresses(top, self.max_map_markers);
            for (prefecture, address) in &addresses {
                if let Some(coordinates) = resolver.resolve(prefecture, address).await {
                    markers.push(coordinates);
                }
            }
        }

        map.render(center, &markers)
    }
}

/// First `limit` `(prefecture, address)` pairs of a group, in display order
fn marker_addresses(group: &IntensityGroup, limit: usize) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (prefecture, addresses) in &group.prefectures {
        for address in addresses {
            if pairs.len() == limit {
                return pairs;
            }
            pairs.push((prefecture.clone(), address.clone()));
        }
    }
    pairs
}

fn check_reportable<'a>(
    quake: &'a JmaQuake,
    groups: &IntensityGroups,
) -> Result<&'a Hypocenter, AbortReason> {
    if groups.is_empty() {
        return Err(AbortReason::NoObservations);
    }
    let hypocenter = quake
        .earthquake
        .hypocenter
        .as_ref()
        .ok_or(AbortReason::NoHypocenter)?;
    if hypocenter.name.is_empty() {
        return Err(AbortReason::EmptyHypocenterName);
    }
    if hypocenter.has_no_location() {
        return Err(AbortReason::NoLocation);
    }
    Ok(hypocenter)
}

fn build_notification(
    quake: &JmaQuake,
    hypocenter: &Hypocenter,
    label: IntensityLabel,
    groups: &IntensityGroups,
    image_url: Option<String>,
) -> Notification {
    let mut notification = Notification::new("地震情報")
        .line(format!("{}で最大{}の地震が発生しました。", hypocenter.name, label));
    if let Some(magnitude) = hypocenter.known_magnitude() {
        notification = notification.line(format!("マグニチュードは {}。", magnitude));
    }
    if let Some(depth) = hypocenter.known_depth() {
        notification = notification.line(format!("震源の深さはおよそ {}km です。", depth));
    }

    notification.url = Some(format!(
        "https://www.google.com/maps/@{},{},8z",
        hypocenter.latitude, hypocenter.longitude
    ));
    notification.image_url = image_url;
    notification.timestamp = feed_timestamp(&quake.time);
    notification.thread = Some(FollowUpThread {
        name: format!("{} 震度別地域詳細", quake.time),
        messages: groups.iter().map(follow_up).collect(),
    });
    notification
}

fn follow_up(group: &IntensityGroup) -> Notification {
    group.prefectures.iter().fold(
        Notification::new(intensity::classify(group.scale).as_str()),
        |notification, (prefecture, addresses)| {
            notification.field(prefecture.as_str(), addresses.join("、"))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::QuakeSummary;

    fn point(prefecture: &str, address: &str, scale: i32) -> ObservationPoint {
        ObservationPoint {
            prefecture: prefecture.to_string(),
            address: address.to_string(),
            intensity_scale: scale,
            is_area: false,
        }
    }

    fn collator() -> CollatorBorrowed<'static> {
        collator_for("ja").unwrap()
    }

    #[test]
    fn test_grouping_orders_scale_descending() {
        let points = [point("A", "x", 40), point("A", "y", 40), point("B", "z", 30)];
        let groups = group_by_intensity(&points, &collator());

        assert_eq!(
            groups,
            vec![
                IntensityGroup {
                    scale: 40,
                    prefectures: vec![("A".to_string(), vec!["x".to_string(), "y".to_string()])],
                },
                IntensityGroup {
                    scale: 30,
                    prefectures: vec![("B".to_string(), vec!["z".to_string()])],
                },
            ]
        );
    }

    #[test]
    fn test_grouping_dedupes_and_sorts_addresses() {
        let points = [
            point("東京都", "新宿区", 30),
            point("東京都", "千代田区", 30),
            point("東京都", "新宿区", 30),
        ];
        let groups = group_by_intensity(&points, &collator());

        assert_eq!(groups.len(), 1);
        let (_, addresses) = &groups[0].prefectures[0];
        assert_eq!(addresses.len(), 2);
        let mut sorted = addresses.clone();
        sorted.sort();
        assert_eq!(addresses, &sorted);
    }

    #[test]
    fn test_prefectures_use_locale_collation() {
        // Byte order would put "Z" first
        let points = [point("b", "1", 10), point("Z", "1", 10), point("a", "1", 10)];
        let groups = group_by_intensity(&points, &collator());

        let order: Vec<&str> = groups[0].prefectures.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "Z"]);
    }

    #[test]
    fn test_marker_addresses_take_display_order_up_to_limit() {
        let group = IntensityGroup {
            scale: 70,
            prefectures: vec![
                ("石川県".to_string(), vec!["珠洲市".to_string(), "輪島市".to_string()]),
                ("新潟県".to_string(), vec!["長岡市".to_string()]),
            ],
        };

        let pair = |p: &str, a: &str| (p.to_string(), a.to_string());
        assert_eq!(
            marker_addresses(&group, 2),
            vec![pair("石川県", "珠洲市"), pair("石川県", "輪島市")]
        );
        assert_eq!(marker_addresses(&group, 10).len(), 3);
        assert!(marker_addresses(&group, 0).is_empty());
    }

    #[test]
    fn test_invalid_locale_is_config_error() {
        assert!(matches!(collator_for("not a locale!"), Err(Error::Config(_))));
    }

    fn quake(hypocenter: Option<Hypocenter>, points: Vec<ObservationPoint>) -> JmaQuake {
        JmaQuake {
            id: "q1".to_string(),
            time: "2024/01/01 16:10:09.123".to_string(),
            earthquake: QuakeSummary {
                time: "2024/01/01 16:10:00".to_string(),
                hypocenter,
                max_scale: 40,
                domestic_tsunami: None,
                foreign_tsunami: None,
            },
            points: Some(points),
        }
    }

    fn hypocenter(name: &str, latitude: f64) -> Hypocenter {
        Hypocenter {
            name: name.to_string(),
            magnitude: 5.2,
            depth: -1.0,
            latitude,
            longitude: 137.2,
        }
    }

    #[test]
    fn test_check_reportable_aborts() {
        let groups = vec![IntensityGroup {
            scale: 40,
            prefectures: vec![],
        }];

        let no_points = quake(Some(hypocenter("能登半島沖", 37.5)), vec![]);
        assert_eq!(
            check_reportable(&no_points, &Vec::new()).unwrap_err(),
            AbortReason::NoObservations
        );

        let missing = quake(None, vec![]);
        assert_eq!(
            check_reportable(&missing, &groups).unwrap_err(),
            AbortReason::NoHypocenter
        );

        let unnamed = quake(Some(hypocenter("", 37.5)), vec![]);
        assert_eq!(
            check_reportable(&unnamed, &groups).unwrap_err(),
            AbortReason::EmptyHypocenterName
        );

        let nowhere = quake(Some(hypocenter("能登半島沖", -200.0)), vec![]);
        assert_eq!(
            check_reportable(&nowhere, &groups).unwrap_err(),
            AbortReason::NoLocation
        );
    }

    #[test]
    fn test_notification_content() {
        let event = quake(
            Some(hypocenter("能登半島沖", 37.5)),
            vec![point("石川県", "輪島市", 40), point("富山県", "富山市", 30)],
        );
        let groups = group_by_intensity(event.points.as_deref().unwrap(), &collator());
        let hypocenter = event.earthquake.hypocenter.as_ref().unwrap();

        let notification =
            build_notification(&event, hypocenter, IntensityLabel::Scale4, &groups, None);

        assert_eq!(notification.title, "地震情報");
        assert_eq!(
            notification.body,
            vec![
                "能登半島沖で最大震度4の地震が発生しました。".to_string(),
                "マグニチュードは 5.2。".to_string(),
            ]
        );
        assert_eq!(
            notification.url.as_deref(),
            Some("https://www.google.com/maps/@37.5,137.2,8z")
        );
        assert_eq!(
            notification.timestamp.as_deref(),
            Some("2024-01-01T16:10:09.123+09:00")
        );

        let thread = notification.thread.unwrap();
        assert_eq!(thread.name, "2024/01/01 16:10:09.123 震度別地域詳細");
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.messages[0].title, "震度4");
        assert_eq!(thread.messages[0].fields[0].name, "石川県");
        assert_eq!(thread.messages[0].fields[0].value, "輪島市");
        assert_eq!(thread.messages[1].title, "震度3");
    }
}
