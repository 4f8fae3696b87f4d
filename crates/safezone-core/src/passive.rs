//! Passive Geofence Bridge: OS enter/exit callbacks into the shared detector.
//!
//! Callbacks are turned into location samples and routed through the same
//! [`SampleEvaluator`] as the periodic sweep, so a crossing seen by both
//! paths alerts once. Nothing here returns an error to the caller; bad
//! callbacks are logged and dropped.

use std::sync::Arc;

use safezone_state::{Coordinate, LocationSample, SafeZone, SubjectId, TriggerSource, ZoneId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detector::TransitionEvent;
use crate::error::MonitorResult;
use crate::evaluator::SampleEvaluator;
use crate::geo;
use crate::metrics::METRICS;

/// Transition kind as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceTransition {
    Enter,
    Exit,
    Dwell,
    Unknown(i32),
}

impl GeofenceTransition {
    /// Map platform transition codes (1 enter, 2 exit, 4 dwell).
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => GeofenceTransition::Enter,
            2 => GeofenceTransition::Exit,
            4 => GeofenceTransition::Dwell,
            other => GeofenceTransition::Unknown(other),
        }
    }
}

/// A geofence callback as delivered by the OS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGeofenceEvent {
    pub subject_id: SubjectId,
    /// Zones whose boundary triggered
    pub zone_ids: Vec<ZoneId>,
    pub transition: Option<GeofenceTransition>,
    /// Position the OS reported with the callback, if any
    #[serde(default)]
    pub position: Option<Coordinate>,
    pub timestamp_millis: i64,
    /// Set when the platform delivered an error instead of a transition
    #[serde(default)]
    pub error_code: Option<i32>,
}

impl RawGeofenceEvent {
    pub fn new(
        subject_id: impl Into<String>,
        zone_id: impl Into<String>,
        transition: GeofenceTransition,
        timestamp_millis: i64,
    ) -> Self {
        Self {
            subject_id: SubjectId::new(subject_id),
            zone_ids: vec![ZoneId::new(zone_id)],
            transition: Some(transition),
            position: None,
            timestamp_millis,
            error_code: None,
        }
    }

    pub fn with_position(mut self, position: Coordinate) -> Self {
        self.position = Some(position);
        self
    }
}

/// Position standing in for a callback that carried none: the center for an
/// enter, one meter past the boundary due north for an exit.
fn synthetic_position(zone: &SafeZone, transition: GeofenceTransition) -> MonitorResult<Coordinate> {
    match transition {
        GeofenceTransition::Exit => geo::offset_north(&zone.center, zone.radius_meters + 1.0),
        _ => Ok(zone.center),
    }
}

#[derive(Clone)]
pub struct PassiveGeofenceBridge {
    evaluator: Arc<SampleEvaluator>,
}

impl PassiveGeofenceBridge {
    pub fn new(evaluator: Arc<SampleEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Handle one OS callback. Returns the transitions it produced.
    pub async fn on_transition(&self, raw: RawGeofenceEvent) -> Vec<TransitionEvent> {
        if let Some(code) = raw.error_code {
            warn!(subject_id = %raw.subject_id, error_code = code, "geofence callback carried an error; ignored");
            METRICS.inc_passive_ignored();
            return Vec::new();
        }
        let transition = match raw.transition {
            Some(t @ (GeofenceTransition::Enter | GeofenceTransition::Exit)) => t,
            other => {
                debug!(subject_id = %raw.subject_id, transition = ?other, "geofence callback without enter/exit; ignored");
                METRICS.inc_passive_ignored();
                return Vec::new();
            }
        };
        if raw.zone_ids.is_empty() {
            warn!(subject_id = %raw.subject_id, "geofence callback without zones; ignored");
            METRICS.inc_passive_ignored();
            return Vec::new();
        }

        let subject = self.evaluator.directory().resolve(&raw.subject_id);
        let mut events = Vec::new();
        for zone_id in &raw.zone_ids {
            let zone = match self.evaluator.zones().get(zone_id).await {
                Some(zone) if zone.applies_to(&raw.subject_id) => zone,
                _ => {
                    warn!(subject_id = %raw.subject_id, zone_id = %zone_id, "geofence callback for unknown zone; ignored");
                    METRICS.inc_passive_ignored();
                    continue;
                }
            };

            let position = match raw.position {
                Some(position) => position,
                None => match synthetic_position(&zone, transition) {
                    Ok(position) => position,
                    Err(e) => {
                        warn!(zone_id = %zone_id, error = %e, "cannot place synthetic sample");
                        continue;
                    }
                },
            };
            let sample = LocationSample {
                subject_id: raw.subject_id.clone(),
                position,
                timestamp_millis: raw.timestamp_millis,
                battery_percent: None,
            };

            match self
                .evaluator
                .evaluate_zones(&sample, &subject, std::slice::from_ref(&zone), TriggerSource::Passive)
                .await
            {
                Ok(report) => events.extend(report.events),
                Err(e) => {
                    warn!(subject_id = %raw.subject_id, zone_id = %zone_id, error = %e, "geofence callback rejected");
                    METRICS.inc_passive_ignored();
                }
            }
        }
        events
    }
}
