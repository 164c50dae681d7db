//! Feed envelope model and frame classifier
//!
//! Every frame from the feed is a JSON object carrying an integer `code`
//! that selects the payload type. [`classify`] parses a raw frame,
//! normalises the identifier field and returns the matching
//! [`EventEnvelope`] variant. Unknown codes become
//! [`EventEnvelope::Ignored`] instead of an error.
//!
//! ## Identifier normalisation
//!
//! Producers are inconsistent: most frames carry `_id` rather than `id`.
//! When `id` is absent (or null) and `_id` is present, `_id` is copied
//! into `id` before the payload is decoded.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// JMA earthquake information
pub const CODE_JMA_QUAKE: i64 = 551;
/// JMA tsunami forecast
pub const CODE_JMA_TSUNAMI: i64 = 552;
/// Earthquake early warning detection
pub const CODE_EEW_DETECTION: i64 = 554;
/// Peer counts per area
pub const CODE_AREA_PEERS: i64 = 555;
/// Earthquake early warning
pub const CODE_EEW: i64 = 556;
/// User-reported quake sensing
pub const CODE_USER_QUAKE: i64 = 561;
/// Evaluation of user-reported quake sensing
pub const CODE_USER_QUAKE_EVALUATION: i64 = 9611;

/// Latitude/longitude sentinel meaning "no location"
pub const NO_LOCATION: f64 = -200.0;

/// Magnitude/depth sentinel meaning "unknown"
pub const UNKNOWN_VALUE: f64 = -1.0;

/// A classified feed event
///
/// Exactly one variant is active per envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum EventEnvelope {
    /// Code 551
    JmaQuake(JmaQuake),
    /// Code 552
    JmaTsunami(JmaTsunami),
    /// Code 554
    EewDetection(EewDetection),
    /// Code 555
    AreaPeers(AreaPeers),
    /// Code 556
    Eew(Eew),
    /// Code 561
    UserQuake(UserQuake),
    /// Code 9611
    UserQuakeEvaluation(UserQuakeEvaluation),
    /// Any other code; dispatching it is a no-op
    Ignored {
        /// The unrecognised code
        code: i64,
    },
}

impl EventEnvelope {
    /// The feed code of this envelope
    pub fn code(&self) -> i64 {
        match self {
            EventEnvelope::JmaQuake(_) => CODE_JMA_QUAKE,
            EventEnvelope::JmaTsunami(_) => CODE_JMA_TSUNAMI,
            EventEnvelope::EewDetection(_) => CODE_EEW_DETECTION,
            EventEnvelope::AreaPeers(_) => CODE_AREA_PEERS,
            EventEnvelope::Eew(_) => CODE_EEW,
            EventEnvelope::UserQuake(_) => CODE_USER_QUAKE,
            EventEnvelope::UserQuakeEvaluation(_) => CODE_USER_QUAKE_EVALUATION,
            EventEnvelope::Ignored { code } => *code,
        }
    }

    /// The normalised event identifier, if the variant carries one
    pub fn id(&self) -> Option<&str> {
        match self {
            EventEnvelope::JmaQuake(p) => Some(&p.id),
            EventEnvelope::JmaTsunami(p) => Some(&p.id),
            EventEnvelope::EewDetection(p) => Some(&p.id),
            EventEnvelope::AreaPeers(p) => Some(&p.id),
            EventEnvelope::Eew(p) => Some(&p.id),
            EventEnvelope::UserQuake(p) => Some(&p.id),
            EventEnvelope::UserQuakeEvaluation(p) => Some(&p.id),
            EventEnvelope::Ignored { .. } => None,
        }
    }
}

/// JMA earthquake information (code 551)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JmaQuake {
    /// Event identifier
    #[serde(default)]
    pub id: String,
    /// Time the feed received the event (`YYYY/MM/DD HH:MM:SS.sss`, JST)
    #[serde(default)]
    pub time: String,
    /// Earthquake summary
    pub earthquake: QuakeSummary,
    /// Observation points; the feed omits this for some issue types
    #[serde(default)]
    pub points: Option<Vec<ObservationPoint>>,
}

/// Earthquake summary of a [`JmaQuake`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuakeSummary {
    /// Origin time
    #[serde(default)]
    pub time: String,
    /// Hypocenter, absent when not yet determined
    #[serde(default)]
    pub hypocenter: Option<Hypocenter>,
    /// Maximum observed intensity scale
    #[serde(default = "default_scale")]
    pub max_scale: i32,
    /// Domestic tsunami status
    #[serde(default)]
    pub domestic_tsunami: Option<String>,
    /// Foreign tsunami status
    #[serde(default)]
    pub foreign_tsunami: Option<String>,
}

/// Hypocenter of an earthquake
///
/// Missing numeric fields decode to their sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypocenter {
    /// Region name; empty when unknown
    #[serde(default)]
    pub name: String,
    /// Magnitude, `-1` when unknown
    #[serde(default = "default_unknown")]
    pub magnitude: f64,
    /// Depth in km, `-1` when unknown
    #[serde(default = "default_unknown")]
    pub depth: f64,
    /// Latitude, `-200` when there is no location
    #[serde(default = "default_no_location")]
    pub latitude: f64,
    /// Longitude, `-200` when there is no location
    #[serde(default = "default_no_location")]
    pub longitude: f64,
}

impl Hypocenter {
    /// Whether latitude or longitude carry the "no location" sentinel
    pub fn has_no_location(&self) -> bool {
        self.latitude == NO_LOCATION || self.longitude == NO_LOCATION
    }

    /// Magnitude, unless unknown
    pub fn known_magnitude(&self) -> Option<f64> {
        (self.magnitude != UNKNOWN_VALUE).then_some(self.magnitude)
    }

    /// Depth, unless unknown
    pub fn known_depth(&self) -> Option<f64> {
        (self.depth != UNKNOWN_VALUE).then_some(self.depth)
    }
}

/// One intensity observation point of a [`JmaQuake`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationPoint {
    /// Prefecture
    #[serde(rename = "pref")]
    pub prefecture: String,
    /// Address within the prefecture
    #[serde(rename = "addr")]
    pub address: String,
    /// Observed intensity scale
    #[serde(rename = "scale")]
    pub intensity_scale: i32,
    /// Whether the point is an area rather than a station
    #[serde(default)]
    pub is_area: bool,
}

/// JMA tsunami forecast (code 552)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JmaTsunami {
    /// Event identifier
    #[serde(default)]
    pub id: String,
    /// Receive time
    #[serde(default)]
    pub time: String,
    /// Whether the forecast was cancelled
    #[serde(default)]
    pub cancelled: bool,
    /// Forecast areas
    #[serde(default)]
    pub areas: Vec<TsunamiArea>,
}

/// A tsunami forecast area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsunamiArea {
    /// Area name
    #[serde(default)]
    pub name: String,
    /// Forecast grade (e.g. `Warning`)
    #[serde(default)]
    pub grade: String,
    /// Whether arrival is immediate
    #[serde(default)]
    pub immediate: bool,
}

/// EEW detection (code 554)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EewDetection {
    /// Event identifier
    #[serde(default)]
    pub id: String,
    /// Receive time
    #[serde(default)]
    pub time: String,
    /// Detection type
    #[serde(default, rename = "type")]
    pub detection_type: String,
}

/// Peer counts per area (code 555)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaPeers {
    /// Event identifier
    #[serde(default)]
    pub id: String,
    /// Receive time
    #[serde(default)]
    pub time: String,
    /// Peer counts
    #[serde(default)]
    pub areas: Vec<AreaPeerCount>,
}

/// Peer count of one area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaPeerCount {
    /// Area code
    pub id: i32,
    /// Number of peers
    pub peer: i32,
}

/// Earthquake early warning (code 556)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eew {
    /// Event identifier
    #[serde(default)]
    pub id: String,
    /// Receive time
    #[serde(default)]
    pub time: String,
    /// Test/drill flag
    #[serde(default)]
    pub test: bool,
    /// Whether the warning was cancelled
    #[serde(default)]
    pub cancelled: bool,
    /// Earthquake metadata
    #[serde(default)]
    pub earthquake: Option<EewEarthquake>,
    /// Forecast areas
    #[serde(default)]
    pub areas: Vec<ForecastArea>,
}

/// Earthquake metadata of an [`Eew`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EewEarthquake {
    /// Origin time
    #[serde(default)]
    pub origin_time: String,
    /// Arrival time
    #[serde(default)]
    pub arrival_time: String,
    /// Condition text
    #[serde(default)]
    pub condition: String,
    /// Hypocenter estimate
    #[serde(default)]
    pub hypocenter: Option<Hypocenter>,
}

/// A forecast area of an [`Eew`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastArea {
    /// Prefecture
    #[serde(rename = "pref")]
    pub prefecture: String,
    /// Area name
    #[serde(default)]
    pub name: String,
    /// Lower bound of the forecast scale
    #[serde(default = "default_scale")]
    pub scale_from: i32,
    /// Upper bound of the forecast scale
    #[serde(rename = "scaleTo", default = "default_scale")]
    pub scale_to_upper_bound: i32,
    /// Warning kind code
    #[serde(default)]
    pub kind_code: String,
    /// Expected arrival time
    #[serde(default)]
    pub arrival_time: Option<String>,
}

/// User-reported quake sensing (code 561)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuake {
    /// Event identifier
    #[serde(default)]
    pub id: String,
    /// Receive time
    #[serde(default)]
    pub time: String,
    /// Area code
    #[serde(default)]
    pub area: i32,
}

/// Evaluation of user-reported quake sensing (code 9611)
///
/// This payload uses snake_case field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuakeEvaluation {
    /// Event identifier
    #[serde(default)]
    pub id: String,
    /// Receive time
    #[serde(default)]
    pub time: String,
    /// Number of reports
    #[serde(default)]
    pub count: i32,
    /// Confidence of the evaluation
    #[serde(default)]
    pub confidence: f64,
    /// First report time
    #[serde(default)]
    pub started_at: String,
    /// Last update time
    #[serde(default)]
    pub updated_at: String,
}

fn default_scale() -> i32 {
    crate::intensity::SCALE_UNKNOWN
}

fn default_unknown() -> f64 {
    UNKNOWN_VALUE
}

fn default_no_location() -> f64 {
    NO_LOCATION
}

/// Parse a raw frame into an envelope
///
/// # Errors
///
/// Returns [`Error::MalformedFrame`] when the frame is not a JSON object,
/// has no integer `code`, or when a recognised code carries a payload
/// that does not decode.
pub fn classify(frame: &str) -> Result<EventEnvelope> {
    let mut value: Value = serde_json::from_str(frame)
        .map_err(|e| Error::malformed(format!("frame is not JSON: {}", e)))?;

    if !value.is_object() {
        return Err(Error::malformed("frame is not a JSON object"));
    }

    normalize_identifier(&mut value);

    let code = value
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::malformed("frame has no integer code"))?;

    let envelope = match code {
        CODE_JMA_QUAKE => EventEnvelope::JmaQuake(decode(code, value)?),
        CODE_JMA_TSUNAMI => EventEnvelope::JmaTsunami(decode(code, value)?),
        CODE_EEW_DETECTION => EventEnvelope::EewDetection(decode(code, value)?),
        CODE_AREA_PEERS => EventEnvelope::AreaPeers(decode(code, value)?),
        CODE_EEW => EventEnvelope::Eew(decode(code, value)?),
        CODE_USER_QUAKE => EventEnvelope::UserQuake(decode(code, value)?),
        CODE_USER_QUAKE_EVALUATION => EventEnvelope::UserQuakeEvaluation(decode(code, value)?),
        other => EventEnvelope::Ignored { code: other },
    };

    Ok(envelope)
}

/// Copy `_id` into `id` when the canonical field is missing
pub fn normalize_identifier(value: &mut Value) {
    let Some(object) = value.as_object_mut() else {
        return;
    };

    if object.get("id").is_none_or(Value::is_null)
        && let Some(alternate) = object.get("_id").cloned()
    {
        let alternate = match alternate {
            Value::String(_) => alternate,
            other => Value::String(other.to_string()),
        };
        object.insert("id".to_string(), alternate);
    }
}

fn decode<T: DeserializeOwned>(code: i64, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::malformed(format!("code {} payload does not decode: {}", code, e)))
}
