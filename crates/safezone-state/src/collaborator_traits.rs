//! Collaborator trait definitions for SafeZone
//!
//! These traits define everything the engine consumes:
//! - `LocationSource`: subjects and their most recent position sample
//! - `NotificationSink`: user-visible alert delivery
//! - `HistoryStore`: durable monitoring history
//! - `GeofenceService`: OS-level circular region registration
//!
//! All traits are async and backend-agnostic. They are injected into the
//! engine as `Arc<dyn Trait>`; in-memory fakes are provided for testing via
//! the `fakes` module.

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::schema::{HistoryRecord, LocationSample, Notification, SafeZone, Subject, SubjectId, ZoneId};

/// Result type for collaborator calls
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

// ---------------------------------------------------------------------------
// LocationSource
// ---------------------------------------------------------------------------

/// Supplies subject position samples on demand.
///
/// Guarantees:
/// - `subjects()` lists every subject currently tracked.
/// - `latest_sample(id)` returns the newest known sample, or `None` when the
///   tracker has not reported yet (not an error).
/// - Errors report `is_transient()` truthfully so the caller can retry.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// List every tracked subject.
    async fn subjects(&self) -> CollaboratorResult<Vec<Subject>>;

    /// Fetch the most recent sample for a subject.
    async fn latest_sample(&self, subject_id: &SubjectId)
        -> CollaboratorResult<Option<LocationSample>>;
}

// ---------------------------------------------------------------------------
// NotificationSink
// ---------------------------------------------------------------------------

/// Displays user-visible alerts.
///
/// Delivering the same `dedupe_key` twice must not show two alerts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> CollaboratorResult<()>;
}

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// Durable, append-only store of monitoring events.
///
/// Guarantees:
/// - `append` never rewrites earlier records.
/// - `recent_for` returns at most `limit` records for the subject, newest
///   first (by `timestamp_millis`).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: &HistoryRecord) -> CollaboratorResult<()>;

    async fn recent_for(
        &self,
        subject_id: &SubjectId,
        limit: usize,
    ) -> CollaboratorResult<Vec<HistoryRecord>>;
}

// ---------------------------------------------------------------------------
// GeofenceService
// ---------------------------------------------------------------------------

/// OS geofencing. Transitions are delivered out of band to the passive bridge.
///
/// Registering an already-registered zone replaces it.
#[async_trait]
pub trait GeofenceService: Send + Sync {
    async fn register_zone(&self, zone: &SafeZone) -> CollaboratorResult<()>;

    /// Remove one zone. No-op if absent.
    async fn unregister_zone(&self, zone_id: &ZoneId) -> CollaboratorResult<()>;

    async fn unregister_all(&self) -> CollaboratorResult<()>;
}
