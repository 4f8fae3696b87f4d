//! Notification sink that writes alerts to the log.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use safezone_state::{CollaboratorResult, Notification, NotificationPriority, NotificationSink};
use tracing::{info, warn};

/// Logs every delivery, the way a platform tray re-alerts on each post.
///
/// Alerts are tracked by `notification_id`: a delivery with an id already
/// shown replaces that entry instead of adding one. Suppressing repeats is
/// the detector's job, not the sink's.
#[derive(Default)]
pub struct LogNotificationSink {
    displayed: DashMap<u32, String>,
    delivered: AtomicUsize,
}

impl LogNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts logged so far.
    pub fn delivered_count(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Distinct alert slots currently shown.
    pub fn displayed_count(&self) -> usize {
        self.displayed.len()
    }
}

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, notification: &Notification) -> CollaboratorResult<()> {
        let replaced = self
            .displayed
            .insert(notification.notification_id, notification.dedupe_key.clone())
            .is_some();
        self.delivered.fetch_add(1, Ordering::Relaxed);

        match notification.priority {
            NotificationPriority::High => warn!(
                event = "alert",
                subject_id = %notification.subject_id,
                id = notification.notification_id,
                channel = notification.channel.as_str(),
                replaced,
                title = %notification.title,
                "{}",
                notification.body
            ),
            NotificationPriority::Default => info!(
                event = "alert",
                subject_id = %notification.subject_id,
                id = notification.notification_id,
                channel = notification.channel.as_str(),
                replaced,
                title = %notification.title,
                "{}",
                notification.body
            ),
        }
        Ok(())
    }
}
