//! `SafeZoneMonitor`: the surface the surrounding application calls.
//!
//! All collaborators are constructor-injected through [`MonitorBuilder`];
//! every signal path shares one zone state store and one detector.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use safezone_state::{
    ContainmentState, GeofenceService, HistoryRecord, HistoryStore, LocationSource,
    NotificationSink, SafeZone, SubjectId, ZoneId,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::battery::BatteryWatch;
use crate::config::MonitorConfig;
use crate::detector::TransitionDetector;
use crate::directory::SubjectDirectory;
use crate::dispatcher::AlertDispatcher;
use crate::error::{MonitorError, MonitorResult};
use crate::evaluator::SampleEvaluator;
use crate::live::LiveTracker;
use crate::monitoring::{MonitoringJob, MonitoringOutcome};
use crate::passive::PassiveGeofenceBridge;
use crate::reminder::{Reminder, ReminderJob, REMINDER_JOB_PREFIX};
use crate::scheduler::{
    AlwaysAvailable, MonitoringScheduler, Registration, SchedulerState, TaskScheduler,
    TokioTaskScheduler,
};
use crate::zone_state::ZoneStateStore;
use crate::zones::ZoneRegistry;

/// History records read per subject when restoring zone state.
const RESTORE_DEPTH: usize = 64;

#[derive(Default)]
pub struct MonitorBuilder {
    config: MonitorConfig,
    zones: Option<Arc<ZoneRegistry>>,
    location: Option<Arc<dyn LocationSource>>,
    notifications: Option<Arc<dyn NotificationSink>>,
    history: Option<Arc<dyn HistoryStore>>,
    geofence: Option<Arc<dyn GeofenceService>>,
    task_scheduler: Option<Arc<dyn TaskScheduler>>,
}

impl MonitorBuilder {
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn zones(mut self, zones: Arc<ZoneRegistry>) -> Self {
        self.zones = Some(zones);
        self
    }

    pub fn location(mut self, location: Arc<dyn LocationSource>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Optional; without it passive registration is a no-op.
    pub fn geofence(mut self, geofence: Arc<dyn GeofenceService>) -> Self {
        self.geofence = Some(geofence);
        self
    }

    /// Defaults to a [`TokioTaskScheduler`] over [`AlwaysAvailable`].
    pub fn task_scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.task_scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> MonitorResult<SafeZoneMonitor> {
        self.config.validate()?;
        let missing = |what: &str| MonitorError::Config(format!("{what} not configured"));
        let location = self.location.ok_or_else(|| missing("location source"))?;
        let notifications = self.notifications.ok_or_else(|| missing("notification sink"))?;
        let history = self.history.ok_or_else(|| missing("history store"))?;
        let zones = match self.zones {
            Some(zones) => zones,
            None => Arc::new(ZoneRegistry::default()),
        };

        let store = Arc::new(ZoneStateStore::new());
        let dispatcher = Arc::new(AlertDispatcher::new(
            Arc::clone(&notifications),
            Arc::clone(&history),
            self.config.side_effect_timeout(),
        ));
        let evaluator = Arc::new(SampleEvaluator::new(
            Arc::clone(&zones),
            TransitionDetector::new(Arc::clone(&store)),
            dispatcher,
            Arc::new(BatteryWatch::new(self.config.low_battery_threshold_percent)),
            Arc::new(SubjectDirectory::new()),
        ));
        let job = Arc::new(MonitoringJob::new(
            Arc::clone(&location),
            Arc::clone(&evaluator),
            self.config.fetch_timeout(),
            self.config.max_concurrent_subjects,
        ));
        let primitive: Arc<dyn TaskScheduler> = match self.task_scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioTaskScheduler::new(Arc::new(AlwaysAvailable))),
        };
        let scheduler =
            MonitoringScheduler::new(Arc::clone(&primitive), job.clone(), self.config.backoff);

        Ok(SafeZoneMonitor {
            config: self.config,
            zones,
            store,
            evaluator,
            job,
            scheduler,
            tasks: primitive,
            location,
            notifications,
            geofence: self.geofence,
            history,
        })
    }
}

pub struct SafeZoneMonitor {
    config: MonitorConfig,
    zones: Arc<ZoneRegistry>,
    store: Arc<ZoneStateStore>,
    evaluator: Arc<SampleEvaluator>,
    job: Arc<MonitoringJob>,
    scheduler: MonitoringScheduler,
    tasks: Arc<dyn TaskScheduler>,
    location: Arc<dyn LocationSource>,
    notifications: Arc<dyn NotificationSink>,
    geofence: Option<Arc<dyn GeofenceService>>,
    history: Arc<dyn HistoryStore>,
}

impl SafeZoneMonitor {
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::default()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn zones(&self) -> &Arc<ZoneRegistry> {
        &self.zones
    }

    /// Start periodic sweeps using the configured constraints.
    pub fn start_monitoring(&self, interval_minutes: u64) -> MonitorResult<Registration> {
        self.scheduler.start(interval_minutes, self.config.constraints)
    }

    pub fn stop_monitoring(&self) {
        self.scheduler.stop();
    }

    /// One unconstrained sweep now; the periodic schedule is left alone.
    pub fn run_immediate_check(&self) -> JoinHandle<MonitoringOutcome> {
        self.scheduler.trigger_immediate()
    }

    /// Run a single sweep inline, without retries.
    pub async fn sweep_once(&self) -> MonitoringOutcome {
        self.job.run(1).await
    }

    pub fn is_monitoring_active(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn current_state(&self, subject_id: &SubjectId, zone_id: &ZoneId) -> Option<ContainmentState> {
        self.store.get(subject_id, zone_id)
    }

    /// Newest first.
    pub async fn recent_events(
        &self,
        subject_id: &SubjectId,
        limit: usize,
    ) -> MonitorResult<Vec<HistoryRecord>> {
        Ok(self.history.recent_for(subject_id, limit).await?)
    }

    /// Post `reminder` once after `delay`. Transient sink failures are
    /// retried with the configured backoff; aborting the handle before the
    /// delay elapses cancels the reminder.
    pub fn schedule_reminder(
        &self,
        reminder: Reminder,
        delay: Duration,
    ) -> JoinHandle<MonitoringOutcome> {
        let job_id = format!("{REMINDER_JOB_PREFIX}/{}", uuid::Uuid::new_v4());
        info!(
            job = %job_id,
            subject_id = %reminder.subject_id,
            delay_secs = delay.as_secs(),
            "reminder scheduled"
        );
        let job = Arc::new(ReminderJob::new(
            reminder,
            Arc::clone(&self.notifications),
            self.config.side_effect_timeout(),
        ));
        self.tasks
            .schedule_delayed(&job_id, delay, self.config.backoff, job)
    }

    /// Seed the zone state store from the newest persisted transition of
    /// each (subject, zone) pair, so a new process compares the next sample
    /// against where the subject was last reported instead of starting a
    /// fresh baseline.
    ///
    /// Pairs already observed by this monitor and zones no longer configured
    /// are skipped. Returns the number of pairs seeded.
    pub async fn restore_from_history(&self) -> MonitorResult<usize> {
        let subjects = self.location.subjects().await?;
        let mut seeded = 0;
        for subject in subjects {
            let records = self
                .history
                .recent_for(&subject.subject_id, RESTORE_DEPTH)
                .await?;
            let mut seen = HashSet::new();
            for record in records {
                let (Some(zone_id), Some(state)) = (record.zone_id, record.state) else {
                    continue;
                };
                if !seen.insert(zone_id.clone()) || self.zones.get(&zone_id).await.is_none() {
                    continue;
                }
                if self
                    .store
                    .restore(&subject.subject_id, &zone_id, state, record.timestamp_millis)
                {
                    debug!(
                        subject_id = %subject.subject_id,
                        zone_id = %zone_id,
                        state = %state,
                        "zone state restored"
                    );
                    seeded += 1;
                }
            }
        }
        info!(seeded, "zone states restored from history");
        Ok(seeded)
    }

    /// Register every configured zone with the OS geofence service.
    /// Failures are reported per zone and never abort the others.
    pub async fn register_passive_zones(&self) -> Vec<(ZoneId, MonitorResult<()>)> {
        let Some(geofence) = &self.geofence else {
            info!("no geofence service configured; passive signals disabled");
            return Vec::new();
        };
        let mut results = Vec::new();
        for zone in self.zones.all().await {
            let result = register_one(geofence.as_ref(), &zone).await;
            results.push((zone.zone_id, result));
        }
        results
    }

    pub async fn unregister_passive_zones(&self) -> MonitorResult<()> {
        if let Some(geofence) = &self.geofence {
            geofence.unregister_all().await?;
            info!("passive geofences removed");
        }
        Ok(())
    }

    pub fn passive_bridge(&self) -> PassiveGeofenceBridge {
        PassiveGeofenceBridge::new(Arc::clone(&self.evaluator))
    }

    pub fn live_tracker(&self) -> LiveTracker {
        LiveTracker::new(Arc::clone(&self.evaluator))
    }
}

async fn register_one(geofence: &dyn GeofenceService, zone: &SafeZone) -> MonitorResult<()> {
    match geofence.register_zone(zone).await {
        Ok(()) => {
            info!(zone_id = %zone.zone_id, radius_meters = zone.radius_meters, "geofence registered");
            Ok(())
        }
        Err(e) => {
            warn!(zone_id = %zone.zone_id, error = %e, "geofence registration failed");
            Err(e.into())
        }
    }
}
