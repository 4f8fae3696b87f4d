//! SafeZone State: collaborator boundary for the SafeZone engine
//!
//! This crate owns every type that crosses the boundary between the
//! monitoring engine and the outside world, plus the async traits the engine
//! consumes.
//!
//! ## Layer 0 - Records and Collaborators
//!
//! Focus: explicit typed records instead of ad-hoc documents, and
//! constructor-injectable collaborators instead of global clients.
//!
//! ## Key Components
//!
//! - `LocationSource`: latest position sample per subject
//! - `NotificationSink`: user-visible alert delivery keyed by a dedupe key
//! - `HistoryStore`: durable, append-only monitoring history
//! - `GeofenceService`: OS-level circular region registration
//! - `JsonlHistoryStore` / `JsonFileLocationSource`: file-backed adapters
//! - `fakes`: in-memory implementations with failure injection (testing)

pub mod collaborator_traits;
mod error;
pub mod fakes;
mod file_location;
mod jsonl_history;
pub mod schema;

pub use collaborator_traits::{
    CollaboratorResult, GeofenceService, HistoryStore, LocationSource, NotificationSink,
};
pub use error::CollaboratorError;
pub use file_location::{JsonFileLocationSource, LocationSnapshot};
pub use jsonl_history::JsonlHistoryStore;
pub use schema::{
    ContainmentState, Coordinate, HistoryKind, HistoryRecord, LocationSample, Notification,
    NotificationChannel, NotificationPriority, SafeZone, Subject, SubjectId, TriggerSource,
    ZoneId, ZoneScope,
};
