//! Alert Dispatcher: turns events into a notification plus a history record.
//!
//! The two side effects run concurrently, each under its own timeout, and
//! both outcomes are returned in a [`DispatchReport`]. Neither failure
//! suppresses the other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use safezone_state::{
    CollaboratorError, ContainmentState, HistoryKind, HistoryRecord, HistoryStore,
    LocationSample, Notification, NotificationChannel, NotificationPriority, NotificationSink,
    SafeZone, Subject, SubjectId, TriggerSource, ZoneId,
};
use sha2::{Digest, Sha256};

use crate::detector::TransitionEvent;
use crate::error::{MonitorError, MonitorResult, SideEffect};
use crate::metrics::METRICS;
use crate::obs;

/// Dedupe key for a zone alert, deterministic in (subject, zone, new state).
pub fn zone_dedupe_key(subject_id: &SubjectId, zone_id: &ZoneId, to: ContainmentState) -> String {
    format!("{subject_id}/{zone_id}/{to}")
}

pub fn battery_dedupe_key(subject_id: &SubjectId) -> String {
    format!("{subject_id}/battery/low")
}

/// Numeric id for platforms that key notifications by integer.
/// First four bytes of the SHA-256 of the dedupe key, so it is stable across processes.
pub fn notification_id(dedupe_key: &str) -> u32 {
    let digest = Sha256::digest(dedupe_key.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Build the user-visible alert for a zone transition.
pub fn zone_notification(event: &TransitionEvent, subject: &Subject, zone: &SafeZone) -> Notification {
    let name = &subject.display_name;
    let (title, body, priority) = match event.to {
        ContainmentState::Outside => (
            format!("⚠️ {name} left the safe zone"),
            format!(
                "{name} has left the safe area around {}. Check their location.",
                zone.label()
            ),
            NotificationPriority::High,
        ),
        ContainmentState::Inside => (
            format!("🟢 {name} is back"),
            format!("{name} has returned to the safe zone {}.", zone.label()),
            NotificationPriority::Default,
        ),
    };
    let dedupe_key = zone_dedupe_key(&event.subject_id, &event.zone_id, event.to);
    Notification {
        notification_id: notification_id(&dedupe_key),
        dedupe_key,
        subject_id: event.subject_id.clone(),
        title,
        body,
        priority,
        channel: NotificationChannel::GeofenceAlerts,
    }
}

pub fn battery_notification(subject: &Subject, percent: u8) -> Notification {
    let name = &subject.display_name;
    let dedupe_key = battery_dedupe_key(&subject.subject_id);
    Notification {
        notification_id: notification_id(&dedupe_key),
        dedupe_key,
        subject_id: subject.subject_id.clone(),
        title: format!("🔋 Low battery - {name}"),
        body: format!("{name}'s tracker is at {percent}% battery."),
        priority: NotificationPriority::High,
        channel: NotificationChannel::BatteryAlerts,
    }
}

/// Outcome of both side effects of one alert.
#[derive(Debug)]
pub struct DispatchReport {
    pub dedupe_key: String,
    pub notification: MonitorResult<()>,
    pub history: MonitorResult<()>,
}

impl DispatchReport {
    pub fn notified(&self) -> bool {
        self.notification.is_ok()
    }

    pub fn persisted(&self) -> bool {
        self.history.is_ok()
    }

    pub fn is_complete(&self) -> bool {
        self.notified() && self.persisted()
    }
}

pub struct AlertDispatcher {
    sink: Arc<dyn NotificationSink>,
    history: Arc<dyn HistoryStore>,
    side_effect_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        history: Arc<dyn HistoryStore>,
        side_effect_timeout: Duration,
    ) -> Self {
        Self {
            sink,
            history,
            side_effect_timeout,
        }
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Notify and persist for one zone transition.
    pub async fn dispatch(
        &self,
        event: &TransitionEvent,
        subject: &Subject,
        zone: &SafeZone,
    ) -> DispatchReport {
        let notification = zone_notification(event, subject, zone);
        let kind = match event.to {
            ContainmentState::Outside => HistoryKind::ZoneExit,
            ContainmentState::Inside => HistoryKind::ZoneEnter,
        };
        let record = HistoryRecord::new(
            event.subject_id.clone(),
            kind,
            event.trigger_source,
            event.at_timestamp_millis,
        )
        .with_zone(event.zone_id.clone(), event.to)
        .with_position(event.position);

        self.send(notification, record).await
    }

    /// Notify and persist a low-battery alert.
    pub async fn dispatch_battery(
        &self,
        subject: &Subject,
        sample: &LocationSample,
        percent: u8,
        trigger: TriggerSource,
    ) -> DispatchReport {
        let notification = battery_notification(subject, percent);
        let record = HistoryRecord::new(
            subject.subject_id.clone(),
            HistoryKind::BatteryLow,
            trigger,
            sample.timestamp_millis,
        )
        .with_position(sample.position)
        .with_battery(percent);

        self.send(notification, record).await
    }

    async fn send(&self, notification: Notification, record: HistoryRecord) -> DispatchReport {
        let (notified, persisted) = tokio::join!(
            self.bounded(SideEffect::Notify, self.sink.notify(&notification)),
            self.bounded(SideEffect::Persist, self.history.append(&record)),
        );

        if let Err(e) = &notified {
            METRICS.inc_notifications_failed();
            obs::emit_side_effect_failed(&notification.subject_id, SideEffect::Notify, e);
        }
        if let Err(e) = &persisted {
            METRICS.inc_history_writes_failed();
            obs::emit_side_effect_failed(&record.subject_id, SideEffect::Persist, e);
        }

        DispatchReport {
            dedupe_key: notification.dedupe_key,
            notification: notified,
            history: persisted,
        }
    }

    async fn bounded(
        &self,
        effect: SideEffect,
        fut: impl Future<Output = Result<(), CollaboratorError>>,
    ) -> MonitorResult<()> {
        match tokio::time::timeout(self.side_effect_timeout, fut).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MonitorError::SideEffectFailure {
                effect,
                detail: e.to_string(),
            }),
            Err(_) => Err(MonitorError::SideEffectFailure {
                effect,
                detail: format!("timed out after {}ms", self.side_effect_timeout.as_millis()),
            }),
        }
    }
}
