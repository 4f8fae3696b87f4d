//! Task scheduler primitive: runs named jobs periodically under resource
//! constraints, retrying with backoff.
//!
//! `TokioTaskScheduler` is the in-process implementation. Each periodic job
//! is one spawned task driven by a `tokio::time::Interval`; cancellation is
//! signalled over a `watch` channel and only takes effect between runs, so an
//! execution that has started always finishes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::backoff::BackoffPolicy;
use crate::monitoring::MonitoringOutcome;
use crate::obs;

/// A unit of work the scheduler can execute.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// `attempt` is 1-based within one execution.
    async fn run(&self, attempt: u32) -> MonitoringOutcome;
}

/// Device resources a constrained run depends on.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn network_available(&self) -> bool;

    /// `None` when the host has no battery or cannot tell.
    async fn battery_percent(&self) -> Option<u8>;
}

/// Probe for hosts where resources are never constrained (servers, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAvailable;

#[async_trait]
impl ResourceProbe for AlwaysAvailable {
    async fn network_available(&self) -> bool {
        true
    }

    async fn battery_percent(&self) -> Option<u8> {
        None
    }
}

/// Conditions a periodic run waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConstraints {
    pub require_network: bool,
    /// Runs are deferred while the host battery is strictly below this
    pub min_battery_percent: Option<u8>,
}

impl Default for RunConstraints {
    fn default() -> Self {
        Self {
            require_network: true,
            min_battery_percent: Some(15),
        }
    }
}

impl RunConstraints {
    pub fn none() -> Self {
        Self {
            require_network: false,
            min_battery_percent: None,
        }
    }

    /// Why a run may not start right now, if anything.
    pub async fn unmet(&self, probe: &dyn ResourceProbe) -> Option<String> {
        if self.require_network && !probe.network_available().await {
            return Some("network unavailable".to_string());
        }
        if let Some(min) = self.min_battery_percent {
            if let Some(level) = probe.battery_percent().await {
                if level < min {
                    return Some(format!("battery at {level}% (needs {min}%)"));
                }
            }
        }
        None
    }
}

/// Everything that defines one periodic registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicSpec {
    pub interval: Duration,
    pub constraints: RunConstraints,
    pub backoff: BackoffPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting for its next tick, for constraints, or for a retry
    Enqueued,
    Running,
}

/// Result of a periodic registration under the keep-existing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Scheduled,
    /// A job with this id already existed; it was left untouched
    KeptExisting(PeriodicSpec),
}

/// The scheduler contract the monitoring adapter drives.
pub trait TaskScheduler: Send + Sync {
    /// Register a periodic job. An existing registration with the same id
    /// is kept as is.
    fn schedule_periodic(
        &self,
        job_id: &str,
        spec: PeriodicSpec,
        job: Arc<dyn ScheduledJob>,
    ) -> Registration;

    /// One unconstrained execution (with retries), independent of any
    /// periodic registration.
    fn schedule_once(
        &self,
        job_id: &str,
        backoff: BackoffPolicy,
        job: Arc<dyn ScheduledJob>,
    ) -> JoinHandle<MonitoringOutcome> {
        self.schedule_delayed(job_id, Duration::ZERO, backoff, job)
    }

    /// Like [`TaskScheduler::schedule_once`], but the first attempt starts
    /// after `delay`. Aborting the returned handle drops a run that has not
    /// started.
    fn schedule_delayed(
        &self,
        job_id: &str,
        delay: Duration,
        backoff: BackoffPolicy,
        job: Arc<dyn ScheduledJob>,
    ) -> JoinHandle<MonitoringOutcome>;

    /// Stop future executions of a periodic job. Returns false if unknown.
    fn cancel(&self, job_id: &str) -> bool;

    /// `None` when no periodic job with this id is registered.
    fn status(&self, job_id: &str) -> Option<JobStatus>;

    fn periodic_spec(&self, job_id: &str) -> Option<PeriodicSpec>;
}

const ENQUEUED: u8 = 0;
const RUNNING: u8 = 1;

#[derive(Debug, Default)]
struct StatusCell(AtomicU8);

impl StatusCell {
    fn set(&self, status: JobStatus) {
        let raw = match status {
            JobStatus::Enqueued => ENQUEUED,
            JobStatus::Running => RUNNING,
        };
        self.0.store(raw, Ordering::SeqCst);
    }

    fn get(&self) -> JobStatus {
        match self.0.load(Ordering::SeqCst) {
            RUNNING => JobStatus::Running,
            _ => JobStatus::Enqueued,
        }
    }
}

struct PeriodicEntry {
    spec: PeriodicSpec,
    status: Arc<StatusCell>,
    cancel: watch::Sender<bool>,
}

/// In-process scheduler on the tokio runtime.
pub struct TokioTaskScheduler {
    probe: Arc<dyn ResourceProbe>,
    constraint_poll: Duration,
    periodic: DashMap<String, PeriodicEntry>,
}

impl TokioTaskScheduler {
    pub fn new(probe: Arc<dyn ResourceProbe>) -> Self {
        Self {
            probe,
            constraint_poll: Duration::from_secs(30),
            periodic: DashMap::new(),
        }
    }

    /// How often deferred runs re-check their constraints.
    pub fn with_constraint_poll(mut self, every: Duration) -> Self {
        self.constraint_poll = every;
        self
    }
}

impl TaskScheduler for TokioTaskScheduler {
    fn schedule_periodic(
        &self,
        job_id: &str,
        spec: PeriodicSpec,
        job: Arc<dyn ScheduledJob>,
    ) -> Registration {
        match self.periodic.entry(job_id.to_string()) {
            Entry::Occupied(existing) => Registration::KeptExisting(existing.get().spec),
            Entry::Vacant(vacant) => {
                let (cancel, cancel_rx) = watch::channel(false);
                let status = Arc::new(StatusCell::default());
                tokio::spawn(periodic_loop(PeriodicTask {
                    job_id: job_id.to_string(),
                    spec,
                    job,
                    probe: Arc::clone(&self.probe),
                    constraint_poll: self.constraint_poll,
                    status: Arc::clone(&status),
                    cancel: cancel_rx,
                }));
                vacant.insert(PeriodicEntry {
                    spec,
                    status,
                    cancel,
                });
                info!(job = %job_id, interval_secs = spec.interval.as_secs(), "periodic job scheduled");
                Registration::Scheduled
            }
        }
    }

    fn schedule_delayed(
        &self,
        job_id: &str,
        delay: Duration,
        backoff: BackoffPolicy,
        job: Arc<dyn ScheduledJob>,
    ) -> JoinHandle<MonitoringOutcome> {
        let job_id = job_id.to_string();
        // Never cancelled; the sender lives until the run completes.
        let (keep_alive, mut cancel) = watch::channel(false);
        let status = StatusCell::default();
        tokio::spawn(async move {
            debug!(job = %job_id, delay_secs = delay.as_secs(), "one-off run enqueued");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let outcome = run_with_retries(&job_id, job.as_ref(), &backoff, &status, &mut cancel).await;
            drop(keep_alive);
            outcome
        })
    }

    fn cancel(&self, job_id: &str) -> bool {
        match self.periodic.remove(job_id) {
            Some((_, entry)) => {
                let _ = entry.cancel.send(true);
                info!(job = %job_id, "periodic job cancelled");
                true
            }
            None => false,
        }
    }

    fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.periodic.get(job_id).map(|e| e.status.get())
    }

    fn periodic_spec(&self, job_id: &str) -> Option<PeriodicSpec> {
        self.periodic.get(job_id).map(|e| e.spec)
    }
}

struct PeriodicTask {
    job_id: String,
    spec: PeriodicSpec,
    job: Arc<dyn ScheduledJob>,
    probe: Arc<dyn ResourceProbe>,
    constraint_poll: Duration,
    status: Arc<StatusCell>,
    cancel: watch::Receiver<bool>,
}

async fn periodic_loop(mut task: PeriodicTask) {
    let mut ticker = tokio::time::interval(task.spec.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = task.cancel.changed() => break,
        }
        if *task.cancel.borrow() {
            break;
        }
        if !wait_for_constraints(&mut task).await {
            break;
        }
        run_with_retries(
            &task.job_id,
            task.job.as_ref(),
            &task.spec.backoff,
            &task.status,
            &mut task.cancel,
        )
        .await;
    }
    debug!(job = %task.job_id, "periodic loop exited");
}

/// Returns false if cancelled while waiting.
async fn wait_for_constraints(task: &mut PeriodicTask) -> bool {
    let mut deferred = false;
    while let Some(reason) = task.spec.constraints.unmet(task.probe.as_ref()).await {
        if !deferred {
            obs::emit_run_deferred(&task.job_id, &reason);
            deferred = true;
        }
        tokio::select! {
            _ = tokio::time::sleep(task.constraint_poll) => {}
            _ = task.cancel.changed() => return false,
        }
        if *task.cancel.borrow() {
            return false;
        }
    }
    true
}

/// Run `job` until it stops asking for a retry, the retry budget is spent,
/// or the job is cancelled during a backoff wait.
async fn run_with_retries(
    job_id: &str,
    job: &dyn ScheduledJob,
    backoff: &BackoffPolicy,
    status: &StatusCell,
    cancel: &mut watch::Receiver<bool>,
) -> MonitoringOutcome {
    let mut attempt = 1;
    loop {
        status.set(JobStatus::Running);
        let outcome = job.run(attempt).await;
        status.set(JobStatus::Enqueued);

        if !matches!(outcome, MonitoringOutcome::RetryRequested(_)) {
            return outcome;
        }
        if !backoff.allows_retry_after(attempt) {
            obs::emit_retries_exhausted(job_id, attempt);
            return outcome;
        }

        let delay = backoff.delay_after(attempt);
        obs::emit_retry_scheduled(job_id, attempt + 1, delay.as_millis() as u64);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.changed() => return outcome,
        }
        if *cancel.borrow() {
            return outcome;
        }
        attempt += 1;
    }
}
