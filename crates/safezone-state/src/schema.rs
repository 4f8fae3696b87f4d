//! Typed records exchanged with collaborators
//!
//! - `Subject` / `SubjectId`: tracked pets
//! - `SafeZone` / `ZoneId` / `ZoneScope`: circular geofences from configuration
//! - `LocationSample`: one position observation
//! - `HistoryRecord`: derived record written to the history store
//! - `Notification`: what the notification sink displays

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a tracked subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        SubjectId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        SubjectId(s.to_string())
    }
}

/// Stable identifier of a safe zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        ZoneId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        ZoneId(s.to_string())
    }
}

/// A tracked entity (a pet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub subject_id: SubjectId,
    pub display_name: String,
}

impl Subject {
    pub fn new(subject_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            subject_id: SubjectId(subject_id.into()),
            display_name: display_name.into(),
        }
    }
}

/// WGS84 position in decimal degrees.
///
/// Construction is unchecked; geo math rejects NaN and out-of-range values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite, latitude within [-90, 90] and longitude within [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Which subjects a zone applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneScope {
    /// Every tracked subject
    #[default]
    Global,
    /// Only the listed subjects
    Subjects(Vec<SubjectId>),
}

/// A circular geofence. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub zone_id: ZoneId,
    /// Human readable label used in alert text; falls back to the id
    #[serde(default)]
    pub name: Option<String>,
    pub center: Coordinate,
    pub radius_meters: f64,
    #[serde(default)]
    pub scope: ZoneScope,
}

impl SafeZone {
    pub fn new(zone_id: impl Into<String>, center: Coordinate, radius_meters: f64) -> Self {
        Self {
            zone_id: ZoneId(zone_id.into()),
            name: None,
            center,
            radius_meters,
            scope: ZoneScope::Global,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_scope(mut self, scope: ZoneScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.zone_id.as_str())
    }

    pub fn applies_to(&self, subject_id: &SubjectId) -> bool {
        match &self.scope {
            ZoneScope::Global => true,
            ZoneScope::Subjects(ids) => ids.contains(subject_id),
        }
    }
}

/// One position observation for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub subject_id: SubjectId,
    #[serde(flatten)]
    pub position: Coordinate,
    /// Milliseconds since the Unix epoch; monotonic per subject
    pub timestamp_millis: i64,
    /// Tracker battery level, when the tracker reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<u8>,
}

impl LocationSample {
    pub fn new(subject_id: impl Into<String>, position: Coordinate, timestamp_millis: i64) -> Self {
        Self {
            subject_id: SubjectId(subject_id.into()),
            position,
            timestamp_millis,
            battery_percent: None,
        }
    }

    pub fn with_battery(mut self, percent: u8) -> Self {
        self.battery_percent = Some(percent);
        self
    }
}

/// Whether a subject is inside or outside a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainmentState {
    Inside,
    Outside,
}

impl fmt::Display for ContainmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainmentState::Inside => f.write_str("inside"),
            ContainmentState::Outside => f.write_str("outside"),
        }
    }
}

/// Which signal path produced an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Scheduled sweep over every subject
    Periodic,
    /// OS geofence enter/exit callback
    Passive,
    /// Pushed real-time location update
    Realtime,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Periodic => f.write_str("periodic"),
            TriggerSource::Passive => f.write_str("passive"),
            TriggerSource::Realtime => f.write_str("realtime"),
        }
    }
}

/// Kind of history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    ZoneExit,
    ZoneEnter,
    BatteryLow,
}

/// Derived record persisted by the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: uuid::Uuid,
    pub subject_id: SubjectId,
    pub kind: HistoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ContainmentState>,
    /// Best-known position at the time of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<u8>,
    pub trigger: TriggerSource,
    pub timestamp_millis: i64,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        subject_id: SubjectId,
        kind: HistoryKind,
        trigger: TriggerSource,
        timestamp_millis: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            subject_id,
            kind,
            zone_id: None,
            state: None,
            position: None,
            battery_percent: None,
            trigger,
            timestamp_millis,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_zone(mut self, zone_id: ZoneId, state: ContainmentState) -> Self {
        self.zone_id = Some(zone_id);
        self.state = Some(state);
        self
    }

    pub fn with_position(mut self, position: Coordinate) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_battery(mut self, percent: u8) -> Self {
        self.battery_percent = Some(percent);
        self
    }
}

/// Interruption level of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Default,
    High,
}

/// Channel a notification is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    GeofenceAlerts,
    BatteryAlerts,
    /// Reminders and other non-alert messages
    General,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::GeofenceAlerts => "geofence_alerts",
            NotificationChannel::BatteryAlerts => "battery_alerts",
            NotificationChannel::General => "general",
        }
    }
}

/// A user-visible alert handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Stable key; sinks suppress a second display of the same key
    pub dedupe_key: String,
    /// Numeric id derived from the dedupe key, for platforms that need one
    pub notification_id: u32,
    pub subject_id: SubjectId,
    pub title: String,
    pub body: String,
    pub priority: NotificationPriority,
    pub channel: NotificationChannel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_validity() {
        assert!(Coordinate::new(4.6097, -74.0817).is_valid());
        assert!(Coordinate::new(90.0, 180.0).is_valid());
        assert!(!Coordinate::new(90.1, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn zone_scope_applies() {
        let center = Coordinate::new(0.0, 0.0);
        let global = SafeZone::new("home", center, 100.0);
        assert!(global.applies_to(&SubjectId::from("p1")));

        let scoped = SafeZone::new("walk", center, 50.0)
            .with_scope(ZoneScope::Subjects(vec![SubjectId::from("p2")]));
        assert!(!scoped.applies_to(&SubjectId::from("p1")));
        assert!(scoped.applies_to(&SubjectId::from("p2")));
    }

    #[test]
    fn zone_label_falls_back_to_id() {
        let zone = SafeZone::new("home", Coordinate::new(0.0, 0.0), 100.0);
        assert_eq!(zone.label(), "home");
        assert_eq!(zone.with_name("Casa").label(), "Casa");
    }

    #[test]
    fn zone_file_shape_deserializes() {
        let json = r#"[
            {"zone_id": "home", "center": {"latitude": 4.6097, "longitude": -74.0817}, "radius_meters": 500.0},
            {"zone_id": "park", "name": "Park", "center": {"latitude": 4.6, "longitude": -74.08},
             "radius_meters": 120.0, "scope": {"subjects": ["p2"]}}
        ]"#;
        let zones: Vec<SafeZone> = serde_json::from_str(json).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].scope, ZoneScope::Global);
        assert_eq!(
            zones[1].scope,
            ZoneScope::Subjects(vec![SubjectId::from("p2")])
        );
    }

    #[test]
    fn sample_flattens_position() {
        let sample = LocationSample::new("p1", Coordinate::new(1.0, 2.0), 42).with_battery(80);
        let value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value["latitude"], 1.0);
        assert_eq!(value["longitude"], 2.0);
        assert_eq!(value["battery_percent"], 80);

        let back: LocationSample = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn containment_display() {
        assert_eq!(ContainmentState::Inside.to_string(), "inside");
        assert_eq!(ContainmentState::Outside.to_string(), "outside");
    }
}
