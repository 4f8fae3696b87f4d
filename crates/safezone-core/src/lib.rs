//! SafeZone Core Library
//!
//! Containment tracking for pets against circular safe zones: one shared
//! transition detector fed by periodic sweeps, OS geofence callbacks and
//! realtime pushes, with deduplicated alerts and scheduled retries.

pub mod battery;
pub mod config;
pub mod detector;
pub mod directory;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod geo;
pub mod live;
pub mod metrics;
pub mod monitoring;
pub mod obs;
pub mod passive;
pub mod reminder;
pub mod scheduler;
pub mod telemetry;
pub mod zone_state;
pub mod zones;

pub use battery::{BatteryLevel, BatteryWatch};
pub use config::MonitorConfig;
pub use detector::{TransitionDetector, TransitionEvent};
pub use directory::SubjectDirectory;
pub use dispatcher::{AlertDispatcher, DispatchReport};
pub use engine::{MonitorBuilder, SafeZoneMonitor};
pub use error::{MonitorError, MonitorResult, SideEffect};
pub use evaluator::{SampleEvaluator, SampleReport};
pub use live::{LiveSummary, LiveTracker};
pub use monitoring::{MonitoringJob, MonitoringOutcome};
pub use passive::{GeofenceTransition, PassiveGeofenceBridge, RawGeofenceEvent};
pub use reminder::{Reminder, ReminderJob};
pub use scheduler::{
    AlwaysAvailable, BackoffPolicy, MonitoringScheduler, Registration, ResourceProbe,
    RunConstraints, SchedulerState, TaskScheduler, TokioTaskScheduler,
};
pub use telemetry::init_tracing;
pub use zone_state::ZoneStateStore;
pub use zones::ZoneRegistry;

pub use safezone_state::{
    ContainmentState, Coordinate, LocationSample, SafeZone, Subject, SubjectId, TriggerSource,
    ZoneId, ZoneScope,
};

/// Crate version, reported by the daemon at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
