//! Configured safe zones and which subjects they apply to.

use std::collections::HashSet;
use std::path::Path;

use safezone_state::{SafeZone, SubjectId, ZoneId};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{MonitorError, MonitorResult};

/// Check the invariants of one zone: non-empty id, valid center, finite positive radius.
pub fn validate_zone(zone: &SafeZone) -> MonitorResult<()> {
    let invalid = |reason: &str| MonitorError::InvalidZone {
        zone_id: zone.zone_id.to_string(),
        reason: reason.to_string(),
    };
    if zone.zone_id.as_str().trim().is_empty() {
        return Err(invalid("zone id must not be empty"));
    }
    if !zone.center.is_valid() {
        return Err(invalid("center is not a valid coordinate"));
    }
    if !(zone.radius_meters.is_finite() && zone.radius_meters > 0.0) {
        return Err(invalid("radius_meters must be a positive number"));
    }
    Ok(())
}

fn validate_all(zones: &[SafeZone]) -> MonitorResult<()> {
    let mut seen = HashSet::new();
    for zone in zones {
        validate_zone(zone)?;
        if !seen.insert(zone.zone_id.clone()) {
            return Err(MonitorError::InvalidZone {
                zone_id: zone.zone_id.to_string(),
                reason: "duplicate zone id".to_string(),
            });
        }
    }
    Ok(())
}

/// Read-mostly set of safe zones. The engine never mutates zones itself;
/// external configuration swaps the whole set with [`ZoneRegistry::replace`].
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: RwLock<Vec<SafeZone>>,
}

impl ZoneRegistry {
    pub fn new(zones: Vec<SafeZone>) -> MonitorResult<Self> {
        validate_all(&zones)?;
        Ok(Self {
            zones: RwLock::new(zones),
        })
    }

    /// Load a JSON array of zones.
    pub fn from_json_file(path: impl AsRef<Path>) -> MonitorResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let zones: Vec<SafeZone> = serde_json::from_slice(&bytes)?;
        info!(count = zones.len(), path = %path.as_ref().display(), "loaded safe zones");
        Self::new(zones)
    }

    /// Swap in a new zone set. Rejected as a whole if any zone is invalid.
    pub async fn replace(&self, zones: Vec<SafeZone>) -> MonitorResult<()> {
        validate_all(&zones)?;
        *self.zones.write().await = zones;
        Ok(())
    }

    pub async fn all(&self) -> Vec<SafeZone> {
        self.zones.read().await.clone()
    }

    pub async fn get(&self, zone_id: &ZoneId) -> Option<SafeZone> {
        self.zones
            .read()
            .await
            .iter()
            .find(|z| &z.zone_id == zone_id)
            .cloned()
    }

    /// Zones whose scope includes the subject.
    pub async fn applicable_to(&self, subject_id: &SubjectId) -> Vec<SafeZone> {
        self.zones
            .read()
            .await
            .iter()
            .filter(|z| z.applies_to(subject_id))
            .cloned()
            .collect()
    }
}
