//! Transition Detector: the single deduplication authority.
//!
//! Every signal path (periodic sweep, passive geofence callback, realtime
//! push) feeds samples through [`TransitionDetector::evaluate`]. The store's
//! per-key atomic `observe` guarantees one event per genuine crossing no
//! matter how many paths observe it.

use std::sync::Arc;

use safezone_state::{
    ContainmentState, Coordinate, LocationSample, SafeZone, SubjectId, TriggerSource, ZoneId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MonitorResult;
use crate::geo;
use crate::metrics::METRICS;
use crate::obs;
use crate::zone_state::{Observation, ZoneStateStore};

/// A materialized containment change. `from != to` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub subject_id: SubjectId,
    pub zone_id: ZoneId,
    pub from: ContainmentState,
    pub to: ContainmentState,
    pub at_timestamp_millis: i64,
    pub trigger_source: TriggerSource,
    /// Position of the sample that produced the event
    pub position: Coordinate,
}

#[derive(Debug, Clone)]
pub struct TransitionDetector {
    store: Arc<ZoneStateStore>,
}

impl TransitionDetector {
    pub fn new(store: Arc<ZoneStateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ZoneStateStore> {
        &self.store
    }

    /// Evaluate one sample against one zone.
    ///
    /// Returns `Ok(None)` for stale samples, the first sighting of a pair
    /// and unchanged state. Invalid coordinates are rejected before the
    /// store is touched.
    pub fn evaluate(
        &self,
        sample: &LocationSample,
        zone: &SafeZone,
        source: TriggerSource,
    ) -> MonitorResult<Option<TransitionEvent>> {
        let state = if geo::is_contained(&sample.position, zone)? {
            ContainmentState::Inside
        } else {
            ContainmentState::Outside
        };
        METRICS.inc_samples_evaluated();

        let observation =
            self.store
                .observe(&sample.subject_id, &zone.zone_id, state, sample.timestamp_millis);
        match observation {
            Observation::Stale { last_evaluated_ms } => {
                METRICS.inc_stale_rejected();
                debug!(
                    subject_id = %sample.subject_id,
                    zone_id = %zone.zone_id,
                    timestamp_millis = sample.timestamp_millis,
                    last_evaluated_ms,
                    source = %source,
                    "stale sample ignored"
                );
                Ok(None)
            }
            Observation::Baseline(state) => {
                debug!(
                    subject_id = %sample.subject_id,
                    zone_id = %zone.zone_id,
                    state = %state,
                    source = %source,
                    "baseline established"
                );
                Ok(None)
            }
            Observation::Unchanged(_) => Ok(None),
            Observation::Changed { from, to } => {
                METRICS.inc_transitions();
                obs::emit_transition(&sample.subject_id, &zone.zone_id, from, to, source);
                Ok(Some(TransitionEvent {
                    subject_id: sample.subject_id.clone(),
                    zone_id: zone.zone_id.clone(),
                    from,
                    to,
                    at_timestamp_millis: sample.timestamp_millis,
                    trigger_source: source,
                    position: sample.position,
                }))
            }
        }
    }

    pub fn current_state(&self, subject_id: &SubjectId, zone_id: &ZoneId) -> Option<ContainmentState> {
        self.store.get(subject_id, zone_id)
    }
}
