//! Handlers for event types with no behaviour yet
//!
//! Each is a valid dispatch target: no side effects, no logging.

use super::Outcome;
use crate::event::{AreaPeers, EewDetection, JmaTsunami, UserQuake, UserQuakeEvaluation};

/// Tsunami forecasts (code 552)
pub fn tsunami(_tsunami: &JmaTsunami) -> Outcome {
    Outcome::NotImplemented
}

/// Early warning detections (code 554)
pub fn eew_detection(_detection: &EewDetection) -> Outcome {
    Outcome::NotImplemented
}

/// Peer counts per area (code 555)
pub fn area_peers(_peers: &AreaPeers) -> Outcome {
    Outcome::NotImplemented
}

/// User-reported shaking (code 561)
pub fn user_quake(_report: &UserQuake) -> Outcome {
    Outcome::NotImplemented
}

/// Evaluations of user-reported shaking (code 9611)
pub fn user_quake_evaluation(_evaluation: &UserQuakeEvaluation) -> Outcome {
    Outcome::NotImplemented
}
