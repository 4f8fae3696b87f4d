//! Great-circle math and circular-zone containment.

use safezone_state::{Coordinate, SafeZone};

use crate::error::{MonitorError, MonitorResult};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

fn check(c: &Coordinate) -> MonitorResult<()> {
    if c.is_valid() {
        Ok(())
    } else {
        Err(MonitorError::InvalidCoordinate {
            latitude: c.latitude,
            longitude: c.longitude,
        })
    }
}

/// Great-circle distance in meters (haversine).
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> MonitorResult<f64> {
    check(a)?;
    check(b)?;

    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    Ok(EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt()))
}

/// Whether `point` lies within `zone`. The boundary counts as inside.
pub fn is_contained(point: &Coordinate, zone: &SafeZone) -> MonitorResult<bool> {
    Ok(distance_meters(point, &zone.center)? <= zone.radius_meters)
}

/// Point `meters` due north of `origin` (due south when that would cross the pole).
pub fn offset_north(origin: &Coordinate, meters: f64) -> MonitorResult<Coordinate> {
    check(origin)?;
    let delta = (meters / EARTH_RADIUS_M).to_degrees();
    let latitude = if origin.latitude + delta <= 90.0 {
        origin.latitude + delta
    } else {
        origin.latitude - delta
    };
    Ok(Coordinate::new(latitude, origin.longitude))
}
