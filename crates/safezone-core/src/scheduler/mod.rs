//! Periodic and on-demand execution of the monitoring job.
//!
//! - `primitive`: the [`TaskScheduler`] contract and its tokio implementation
//! - `adapter`: [`MonitoringScheduler`], the start/stop/trigger state machine
//! - `backoff`: linear (or exponential) retry delays with a floor

pub mod adapter;
pub mod backoff;
pub mod primitive;

pub use adapter::{MonitoringScheduler, SchedulerState, IMMEDIATE_JOB_NAME, PERIODIC_JOB_NAME};
pub use backoff::{BackoffKind, BackoffPolicy, MIN_BACKOFF_FLOOR};
pub use primitive::{
    AlwaysAvailable, JobStatus, PeriodicSpec, Registration, ResourceProbe, RunConstraints,
    ScheduledJob, TaskScheduler, TokioTaskScheduler,
};
