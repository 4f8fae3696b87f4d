//! Zone State Store: last-known containment per (subject, zone).
//!
//! Backed by `DashMap`, so keys in different shards never contend and every
//! read-compare-write on one key runs under that key's shard lock.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use safezone_state::{ContainmentState, SubjectId, ZoneId};

/// Store key.
pub type ZoneKey = (SubjectId, ZoneId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ZoneEntry {
    state: ContainmentState,
    /// Timestamp of the newest sample evaluated for this key
    last_evaluated_ms: i64,
}

/// Result of feeding one observation into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Sample not newer than the last evaluated one; nothing changed
    Stale { last_evaluated_ms: i64 },
    /// First sighting for this key; state recorded without a transition
    Baseline(ContainmentState),
    /// Same state as before
    Unchanged(ContainmentState),
    /// State flipped
    Changed {
        from: ContainmentState,
        to: ContainmentState,
    },
}

#[derive(Debug, Default)]
pub struct ZoneStateStore {
    entries: DashMap<ZoneKey, ZoneEntry>,
}

impl ZoneStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if the pair has never been observed.
    pub fn get(&self, subject_id: &SubjectId, zone_id: &ZoneId) -> Option<ContainmentState> {
        self.entries
            .get(&(subject_id.clone(), zone_id.clone()))
            .map(|e| e.state)
    }

    /// Overwrite the state for a key, keeping its stale-check watermark.
    pub fn set(&self, subject_id: &SubjectId, zone_id: &ZoneId, state: ContainmentState) {
        self.entries
            .entry((subject_id.clone(), zone_id.clone()))
            .and_modify(|e| e.state = state)
            .or_insert(ZoneEntry {
                state,
                last_evaluated_ms: i64::MIN,
            });
    }

    /// Seed a key from persisted state. Keys already present are left alone;
    /// returns whether the seed was applied.
    pub fn restore(
        &self,
        subject_id: &SubjectId,
        zone_id: &ZoneId,
        state: ContainmentState,
        timestamp_millis: i64,
    ) -> bool {
        match self.entries.entry((subject_id.clone(), zone_id.clone())) {
            Entry::Vacant(vacant) => {
                vacant.insert(ZoneEntry {
                    state,
                    last_evaluated_ms: timestamp_millis,
                });
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn last_evaluated(&self, subject_id: &SubjectId, zone_id: &ZoneId) -> Option<i64> {
        self.entries
            .get(&(subject_id.clone(), zone_id.clone()))
            .map(|e| e.last_evaluated_ms)
    }

    /// Atomically apply one observation taken at `timestamp_millis`.
    ///
    /// The stale check, comparison and write all happen while holding the
    /// entry, so two callers racing on the same key see one `Changed` at most.
    pub fn observe(
        &self,
        subject_id: &SubjectId,
        zone_id: &ZoneId,
        state: ContainmentState,
        timestamp_millis: i64,
    ) -> Observation {
        match self.entries.entry((subject_id.clone(), zone_id.clone())) {
            Entry::Vacant(vacant) => {
                vacant.insert(ZoneEntry {
                    state,
                    last_evaluated_ms: timestamp_millis,
                });
                Observation::Baseline(state)
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if timestamp_millis <= entry.last_evaluated_ms {
                    return Observation::Stale {
                        last_evaluated_ms: entry.last_evaluated_ms,
                    };
                }
                entry.last_evaluated_ms = timestamp_millis;
                if entry.state == state {
                    Observation::Unchanged(state)
                } else {
                    let from = entry.state;
                    entry.state = state;
                    Observation::Changed { from, to: state }
                }
            }
        }
    }

    /// Snapshot of every tracked key.
    pub fn snapshot(&self) -> Vec<(ZoneKey, ContainmentState)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().state))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every pair belonging to a subject.
    pub fn forget_subject(&self, subject_id: &SubjectId) {
        self.entries.retain(|(s, _), _| s != subject_id);
    }
}
