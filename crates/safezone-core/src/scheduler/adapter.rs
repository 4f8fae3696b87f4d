//! Scheduler Adapter: the monitoring job's lifecycle on top of a
//! [`TaskScheduler`].
//!
//! Re-registration follows a keep-existing policy: `start` while already
//! scheduled leaves the current schedule in place and logs that the new
//! parameters were ignored. Call `stop` first to change them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backoff::BackoffPolicy;
use super::primitive::{
    JobStatus, PeriodicSpec, Registration, RunConstraints, ScheduledJob, TaskScheduler,
};
use crate::error::{MonitorError, MonitorResult};
use crate::monitoring::MonitoringOutcome;

/// Unique name of the periodic sweep.
pub const PERIODIC_JOB_NAME: &str = "pet_monitoring_periodic";
/// Name given to on-demand sweeps.
pub const IMMEDIATE_JOB_NAME: &str = "pet_monitoring_immediate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Scheduled { interval_minutes: u64 },
    Running,
}

pub struct MonitoringScheduler {
    primitive: Arc<dyn TaskScheduler>,
    job: Arc<dyn ScheduledJob>,
    backoff: BackoffPolicy,
}

impl MonitoringScheduler {
    pub fn new(
        primitive: Arc<dyn TaskScheduler>,
        job: Arc<dyn ScheduledJob>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            primitive,
            job,
            backoff,
        }
    }

    /// Schedule the periodic sweep. Idempotent; see module docs for the
    /// keep-existing policy.
    pub fn start(
        &self,
        interval_minutes: u64,
        constraints: RunConstraints,
    ) -> MonitorResult<Registration> {
        if interval_minutes == 0 {
            return Err(MonitorError::Config(
                "monitoring interval must be at least one minute".to_string(),
            ));
        }
        let interval_secs = interval_minutes.checked_mul(60).ok_or_else(|| {
            MonitorError::Config(format!("monitoring interval of {interval_minutes} minutes is too large"))
        })?;
        let spec = PeriodicSpec {
            interval: Duration::from_secs(interval_secs),
            constraints,
            backoff: self.backoff,
        };
        let registration =
            self.primitive
                .schedule_periodic(PERIODIC_JOB_NAME, spec, Arc::clone(&self.job));
        match registration {
            Registration::Scheduled => {
                info!(job = PERIODIC_JOB_NAME, interval_minutes, "monitoring started");
            }
            Registration::KeptExisting(existing) if existing != spec => {
                warn!(
                    job = PERIODIC_JOB_NAME,
                    requested_minutes = interval_minutes,
                    active_minutes = existing.interval.as_secs() / 60,
                    "monitoring already scheduled; new parameters ignored (stop first to change them)"
                );
            }
            Registration::KeptExisting(_) => {}
        }
        Ok(registration)
    }

    /// Cancel future sweeps. A sweep in progress runs to completion.
    pub fn stop(&self) {
        if self.primitive.cancel(PERIODIC_JOB_NAME) {
            info!(job = PERIODIC_JOB_NAME, "monitoring stopped");
        }
    }

    /// One sweep now, without touching the periodic schedule.
    pub fn trigger_immediate(&self) -> JoinHandle<MonitoringOutcome> {
        info!(job = IMMEDIATE_JOB_NAME, "immediate check requested");
        self.primitive
            .schedule_once(IMMEDIATE_JOB_NAME, self.backoff, Arc::clone(&self.job))
    }

    pub fn state(&self) -> SchedulerState {
        match self.primitive.status(PERIODIC_JOB_NAME) {
            None => SchedulerState::Stopped,
            Some(JobStatus::Running) => SchedulerState::Running,
            Some(JobStatus::Enqueued) => SchedulerState::Scheduled {
                interval_minutes: self
                    .primitive
                    .periodic_spec(PERIODIC_JOB_NAME)
                    .map(|s| s.interval.as_secs() / 60)
                    .unwrap_or_default(),
            },
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state(), SchedulerState::Stopped)
    }
}
