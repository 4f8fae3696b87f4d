//! Sample evaluation shared by the periodic, passive and realtime paths.
//!
//! One sample is checked against zones through the shared
//! [`TransitionDetector`], and every resulting event is dispatched.

use std::sync::Arc;

use safezone_state::{LocationSample, SafeZone, Subject, TriggerSource};

use crate::battery::BatteryWatch;
use crate::detector::{TransitionDetector, TransitionEvent};
use crate::directory::SubjectDirectory;
use crate::dispatcher::{AlertDispatcher, DispatchReport};
use crate::error::{MonitorError, MonitorResult};
use crate::zones::ZoneRegistry;

/// What one sample produced.
#[derive(Debug, Default)]
pub struct SampleReport {
    pub events: Vec<TransitionEvent>,
    pub dispatches: Vec<DispatchReport>,
    /// Battery percentage that raised a low-battery alert
    pub battery_alert: Option<u8>,
}

pub struct SampleEvaluator {
    zones: Arc<ZoneRegistry>,
    detector: TransitionDetector,
    dispatcher: Arc<AlertDispatcher>,
    battery: Arc<BatteryWatch>,
    directory: Arc<SubjectDirectory>,
}

impl SampleEvaluator {
    pub fn new(
        zones: Arc<ZoneRegistry>,
        detector: TransitionDetector,
        dispatcher: Arc<AlertDispatcher>,
        battery: Arc<BatteryWatch>,
        directory: Arc<SubjectDirectory>,
    ) -> Self {
        Self {
            zones,
            detector,
            dispatcher,
            battery,
            directory,
        }
    }

    pub fn zones(&self) -> &Arc<ZoneRegistry> {
        &self.zones
    }

    pub fn detector(&self) -> &TransitionDetector {
        &self.detector
    }

    pub fn directory(&self) -> &Arc<SubjectDirectory> {
        &self.directory
    }

    /// Evaluate against every zone applicable to the sample's subject, then
    /// check its battery reading.
    pub async fn evaluate(
        &self,
        sample: &LocationSample,
        source: TriggerSource,
    ) -> MonitorResult<SampleReport> {
        let zones = self.zones.applicable_to(&sample.subject_id).await;
        let subject = self.directory.resolve(&sample.subject_id);
        let mut report = self.evaluate_zones(sample, &subject, &zones, source).await?;

        if let Some(percent) = self.battery.observe(sample) {
            let dispatch = self
                .dispatcher
                .dispatch_battery(&subject, sample, percent, source)
                .await;
            report.dispatches.push(dispatch);
            report.battery_alert = Some(percent);
        }
        Ok(report)
    }

    /// Evaluate against the given zones only. No battery check.
    pub async fn evaluate_zones(
        &self,
        sample: &LocationSample,
        subject: &Subject,
        zones: &[SafeZone],
        source: TriggerSource,
    ) -> MonitorResult<SampleReport> {
        if !sample.position.is_valid() {
            return Err(MonitorError::InvalidCoordinate {
                latitude: sample.position.latitude,
                longitude: sample.position.longitude,
            });
        }

        let mut report = SampleReport::default();
        for zone in zones {
            if let Some(event) = self.detector.evaluate(sample, zone, source)? {
                let dispatch = self.dispatcher.dispatch(&event, subject, zone).await;
                report.dispatches.push(dispatch);
                report.events.push(event);
            }
        }
        Ok(report)
    }
}
