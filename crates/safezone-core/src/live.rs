//! Live Tracker: evaluates pushed location updates as they arrive.

use std::sync::Arc;

use safezone_state::{LocationSample, TriggerSource};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::evaluator::SampleEvaluator;

#[derive(Clone)]
pub struct LiveTracker {
    evaluator: Arc<SampleEvaluator>,
}

/// Totals for one tracking session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveSummary {
    pub samples: usize,
    pub transitions: usize,
    pub rejected: usize,
}

impl LiveTracker {
    pub fn new(evaluator: Arc<SampleEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Consume samples until the channel closes or `shutdown` flips to true.
    pub async fn run(
        &self,
        mut samples: mpsc::Receiver<LocationSample>,
        mut shutdown: watch::Receiver<bool>,
    ) -> LiveSummary {
        let mut summary = LiveSummary::default();
        // Cleared once the shutdown sender is gone; the channel close still ends the loop.
        let mut watching = true;
        info!("live tracking started");
        loop {
            let sample = tokio::select! {
                next = samples.recv() => match next {
                    Some(sample) => sample,
                    None => break,
                },
                changed = shutdown.changed(), if watching => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => break,
                        Ok(()) => continue,
                        Err(_) => {
                            watching = false;
                            continue;
                        }
                    }
                }
            };
            summary.samples += 1;
            match self.evaluator.evaluate(&sample, TriggerSource::Realtime).await {
                Ok(report) => summary.transitions += report.events.len(),
                Err(e) => {
                    summary.rejected += 1;
                    warn!(subject_id = %sample.subject_id, error = %e, "live sample rejected");
                }
            }
        }
        debug!(?summary, "live tracking stopped");
        summary
    }
}
