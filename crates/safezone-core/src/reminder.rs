//! One-off reminders posted to the general channel after a delay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use safezone_state::{
    Notification, NotificationChannel, NotificationPriority, NotificationSink, SubjectId,
};
use tracing::{info, warn};

use crate::dispatcher::notification_id;
use crate::monitoring::MonitoringOutcome;
use crate::scheduler::ScheduledJob;

pub const DEFAULT_REMINDER_TITLE: &str = "SafeZonePet";
pub const DEFAULT_REMINDER_BODY: &str = "Reminder";

/// Job id prefix for scheduled reminders.
pub const REMINDER_JOB_PREFIX: &str = "safezone_reminder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub subject_id: SubjectId,
    pub title: String,
    pub body: String,
}

impl Reminder {
    pub fn new(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            title: DEFAULT_REMINDER_TITLE.to_string(),
            body: DEFAULT_REMINDER_BODY.to_string(),
        }
    }

    /// Blank titles keep the default.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.trim().is_empty() {
            self.title = title;
        }
        self
    }

    /// Blank bodies keep the default.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        if !body.trim().is_empty() {
            self.body = body;
        }
        self
    }

    /// Reminders with the same subject and title share one display slot.
    pub fn dedupe_key(&self) -> String {
        format!("{}/reminder/{}", self.subject_id, self.title)
    }

    pub fn notification(&self) -> Notification {
        let dedupe_key = self.dedupe_key();
        Notification {
            notification_id: notification_id(&dedupe_key),
            dedupe_key,
            subject_id: self.subject_id.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
            priority: NotificationPriority::Default,
            channel: NotificationChannel::General,
        }
    }
}

/// Delivers one reminder when the scheduler runs it.
pub struct ReminderJob {
    reminder: Reminder,
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
}

impl ReminderJob {
    pub fn new(reminder: Reminder, sink: Arc<dyn NotificationSink>, timeout: Duration) -> Self {
        Self {
            reminder,
            sink,
            timeout,
        }
    }
}

#[async_trait]
impl ScheduledJob for ReminderJob {
    async fn run(&self, attempt: u32) -> MonitoringOutcome {
        let notification = self.reminder.notification();
        match tokio::time::timeout(self.timeout, self.sink.notify(&notification)).await {
            Ok(Ok(())) => {
                info!(
                    event = "reminder_sent",
                    subject_id = %self.reminder.subject_id,
                    title = %self.reminder.title,
                    attempt,
                    "reminder delivered"
                );
                MonitoringOutcome::Success
            }
            Ok(Err(e)) if e.is_transient() => {
                warn!(subject_id = %self.reminder.subject_id, attempt, error = %e, "reminder delivery failed");
                MonitoringOutcome::RetryRequested(attempt)
            }
            Ok(Err(e)) => {
                warn!(subject_id = %self.reminder.subject_id, error = %e, "reminder dropped");
                MonitoringOutcome::PermanentFailure
            }
            Err(_) => {
                warn!(
                    subject_id = %self.reminder.subject_id,
                    attempt,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "reminder delivery timed out"
                );
                MonitoringOutcome::RetryRequested(attempt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use safezone_state::fakes::MemoryNotificationSink;
    use safezone_state::{CollaboratorError, CollaboratorResult};

    /// Fails transiently for the first `failures` deliveries.
    struct FlakySink {
        failures: AtomicU32,
        inner: MemoryNotificationSink,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn notify(&self, notification: &Notification) -> CollaboratorResult<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(CollaboratorError::transient("notifications", "busy"));
            }
            self.inner.notify(notification).await
        }
    }

    #[test]
    fn defaults_and_blank_overrides() {
        let r = Reminder::new(SubjectId::from("p1")).with_title("  ").with_body("");
        assert_eq!(r.title, DEFAULT_REMINDER_TITLE);
        assert_eq!(r.body, DEFAULT_REMINDER_BODY);

        let n = Reminder::new(SubjectId::from("p1"))
            .with_title("Walk")
            .with_body("Time for Luna's walk")
            .notification();
        assert_eq!(n.dedupe_key, "p1/reminder/Walk");
        assert_eq!(n.channel, NotificationChannel::General);
        assert_eq!(n.priority, NotificationPriority::Default);
        assert_eq!(n.body, "Time for Luna's walk");
    }

    #[tokio::test]
    async fn transient_sink_failure_requests_retry() {
        let sink = Arc::new(FlakySink {
            failures: AtomicU32::new(1),
            inner: MemoryNotificationSink::new(),
        });
        let job = ReminderJob::new(
            Reminder::new(SubjectId::from("p1")),
            sink.clone(),
            Duration::from_secs(5),
        );
        assert_eq!(job.run(1).await, MonitoringOutcome::RetryRequested(1));
        assert_eq!(job.run(2).await, MonitoringOutcome::Success);
        assert_eq!(sink.inner.sent().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_sink_is_permanent() {
        let sink = Arc::new(MemoryNotificationSink::new());
        sink.set_failing(true);
        let job = ReminderJob::new(Reminder::new(SubjectId::from("p1")), sink, Duration::from_secs(5));
        assert_eq!(job.run(1).await, MonitoringOutcome::PermanentFailure);
    }
}
