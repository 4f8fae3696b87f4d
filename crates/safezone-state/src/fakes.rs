//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryLocationSource`, `MemoryNotificationSink`,
//! `MemoryHistoryStore`, and `MemoryGeofenceService` that satisfy the trait
//! contracts without any external dependencies, plus failure injection so
//! tests can drive transient/permanent error paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::collaborator_traits::*;
use crate::error::CollaboratorError;
use crate::schema::{
    HistoryRecord, LocationSample, Notification, SafeZone, Subject, SubjectId, ZoneId,
};

/// Failure mode injected into a fake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Return a transient error (network down)
    Transient,
    /// Return a permanent error (access revoked)
    Permanent,
    /// Never complete; exercises caller timeouts
    Hang,
}

impl InjectedFailure {
    async fn fire(self, service: &str) -> CollaboratorError {
        match self {
            InjectedFailure::Transient => {
                CollaboratorError::transient(service, "injected transient failure")
            }
            InjectedFailure::Permanent => {
                CollaboratorError::permanent(service, "injected permanent failure")
            }
            InjectedFailure::Hang => std::future::pending::<CollaboratorError>().await,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryLocationSource
// ---------------------------------------------------------------------------

/// In-memory location source backed by per-subject sample lists.
#[derive(Debug, Default)]
pub struct MemoryLocationSource {
    subjects: Mutex<Vec<Subject>>,
    samples: Mutex<HashMap<SubjectId, Vec<LocationSample>>>,
    failures: Mutex<HashMap<SubjectId, InjectedFailure>>,
    listing_failure: Mutex<Option<InjectedFailure>>,
    fetches: AtomicUsize,
}

impl MemoryLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subject. No-op if already registered.
    pub fn add_subject(&self, subject: Subject) {
        let mut subjects = self.subjects.lock().unwrap();
        if !subjects.iter().any(|s| s.subject_id == subject.subject_id) {
            subjects.push(subject);
        }
    }

    /// Record a sample; registers the subject (named after its id) if unknown.
    pub fn push_sample(&self, sample: LocationSample) {
        let id = sample.subject_id.clone();
        self.add_subject(Subject {
            subject_id: id.clone(),
            display_name: id.0.clone(),
        });
        self.samples.lock().unwrap().entry(id).or_default().push(sample);
    }

    /// Make `latest_sample` fail for one subject until cleared.
    pub fn fail_subject(&self, subject_id: &SubjectId, failure: InjectedFailure) {
        self.failures
            .lock()
            .unwrap()
            .insert(subject_id.clone(), failure);
    }

    pub fn clear_failure(&self, subject_id: &SubjectId) {
        self.failures.lock().unwrap().remove(subject_id);
    }

    /// Make `subjects()` fail until cleared with `None`.
    pub fn fail_listing(&self, failure: Option<InjectedFailure>) {
        *self.listing_failure.lock().unwrap() = failure;
    }

    /// Number of `latest_sample` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationSource for MemoryLocationSource {
    async fn subjects(&self) -> CollaboratorResult<Vec<Subject>> {
        let failure = *self.listing_failure.lock().unwrap();
        if let Some(failure) = failure {
            return Err(failure.fire("location").await);
        }
        Ok(self.subjects.lock().unwrap().clone())
    }

    async fn latest_sample(
        &self,
        subject_id: &SubjectId,
    ) -> CollaboratorResult<Option<LocationSample>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failure = self.failures.lock().unwrap().get(subject_id).copied();
        if let Some(failure) = failure {
            return Err(failure.fire("location").await);
        }
        let samples = self.samples.lock().unwrap();
        Ok(samples
            .get(subject_id)
            .and_then(|list| list.iter().max_by_key(|s| s.timestamp_millis))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryNotificationSink
// ---------------------------------------------------------------------------

/// In-memory notification sink recording every delivery.
///
/// Mirrors platform behaviour: a second delivery with the same dedupe key
/// replaces the displayed alert instead of adding one.
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    sent: Mutex<Vec<Notification>>,
    displayed: Mutex<HashSet<String>>,
    failing: AtomicBool,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every successful delivery, in order.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Distinct alerts currently displayed.
    pub fn displayed_count(&self) -> usize {
        self.displayed.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn notify(&self, notification: &Notification) -> CollaboratorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::NotAvailable {
                service: "notifications".to_string(),
                reason: "permission denied".to_string(),
            });
        }
        self.sent.lock().unwrap().push(notification.clone());
        self.displayed
            .lock()
            .unwrap()
            .insert(notification.dedupe_key.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryHistoryStore
// ---------------------------------------------------------------------------

/// In-memory append-only history store.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<HistoryRecord>>,
    failing: AtomicBool,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All records in append order.
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: &HistoryRecord) -> CollaboratorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::transient("history", "store offline"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn recent_for(
        &self,
        subject_id: &SubjectId,
        limit: usize,
    ) -> CollaboratorResult<Vec<HistoryRecord>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::transient("history", "store offline"));
        }
        let records = self.records.lock().unwrap();
        let mut matching: Vec<HistoryRecord> = records
            .iter()
            .filter(|r| &r.subject_id == subject_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp_millis.cmp(&a.timestamp_millis));
        matching.truncate(limit);
        Ok(matching)
    }
}

// ---------------------------------------------------------------------------
// MemoryGeofenceService
// ---------------------------------------------------------------------------

/// In-memory geofence registry.
#[derive(Debug, Default)]
pub struct MemoryGeofenceService {
    zones: Mutex<HashMap<ZoneId, SafeZone>>,
    failing: AtomicBool,
}

impl MemoryGeofenceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_registered(&self, zone_id: &ZoneId) -> bool {
        self.zones.lock().unwrap().contains_key(zone_id)
    }

    pub fn registered_count(&self) -> usize {
        self.zones.lock().unwrap().len()
    }

    fn check(&self) -> CollaboratorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::NotAvailable {
                service: "geofencing".to_string(),
                reason: "location permission not granted".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GeofenceService for MemoryGeofenceService {
    async fn register_zone(&self, zone: &SafeZone) -> CollaboratorResult<()> {
        self.check()?;
        self.zones
            .lock()
            .unwrap()
            .insert(zone.zone_id.clone(), zone.clone());
        Ok(())
    }

    async fn unregister_zone(&self, zone_id: &ZoneId) -> CollaboratorResult<()> {
        self.check()?;
        self.zones.lock().unwrap().remove(zone_id);
        Ok(())
    }

    async fn unregister_all(&self) -> CollaboratorResult<()> {
        self.check()?;
        self.zones.lock().unwrap().clear();
        Ok(())
    }
}
