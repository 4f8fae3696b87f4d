//! Battery Watch: low-battery alerts with the same baseline and dedupe rules
//! as zone transitions.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use safezone_state::{LocationSample, SubjectId};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryLevel {
    Ok,
    Low,
}

#[derive(Debug, Clone, Copy)]
struct BatteryEntry {
    level: BatteryLevel,
    last_evaluated_ms: i64,
}

#[derive(Debug)]
pub struct BatteryWatch {
    threshold_percent: u8,
    entries: DashMap<SubjectId, BatteryEntry>,
}

impl BatteryWatch {
    /// `threshold_percent`: readings strictly below it count as low.
    pub fn new(threshold_percent: u8) -> Self {
        Self {
            threshold_percent,
            entries: DashMap::new(),
        }
    }

    pub fn threshold_percent(&self) -> u8 {
        self.threshold_percent
    }

    pub fn level(&self, subject_id: &SubjectId) -> Option<BatteryLevel> {
        self.entries.get(subject_id).map(|e| e.level)
    }

    /// Returns the reported percentage when the sample takes the subject from
    /// `Ok` to `Low`. Samples without a battery reading, stale samples and
    /// first sightings never alert.
    pub fn observe(&self, sample: &LocationSample) -> Option<u8> {
        let percent = sample.battery_percent?;
        let level = if percent < self.threshold_percent {
            BatteryLevel::Low
        } else {
            BatteryLevel::Ok
        };

        match self.entries.entry(sample.subject_id.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(BatteryEntry {
                    level,
                    last_evaluated_ms: sample.timestamp_millis,
                });
                None
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if sample.timestamp_millis <= entry.last_evaluated_ms {
                    return None;
                }
                entry.last_evaluated_ms = sample.timestamp_millis;
                let previous = std::mem::replace(&mut entry.level, level);
                match (previous, level) {
                    (BatteryLevel::Ok, BatteryLevel::Low) => Some(percent),
                    (BatteryLevel::Low, BatteryLevel::Ok) => {
                        debug!(subject_id = %sample.subject_id, percent, "battery recovered, alert re-armed");
                        None
                    }
                    _ => None,
                }
            }
        }
    }
}
