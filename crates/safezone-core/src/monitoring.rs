//! Monitoring Job: one periodic sweep over every subject.
//!
//! Subjects are evaluated concurrently, bounded by a semaphore. A failure for
//! one subject never stops the others; the sweep reports the worst outcome
//! seen (`PermanentFailure` > `RetryRequested` > `Success`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use safezone_state::{CollaboratorError, LocationSource, Subject, TriggerSource};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn, Instrument};
use uuid::Uuid;

use crate::error::MonitorError;
use crate::evaluator::SampleEvaluator;
use crate::metrics::METRICS;
use crate::obs;
use crate::scheduler::ScheduledJob;

/// Result of one sweep, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringOutcome {
    Success,
    /// Transient failure on the given attempt; the scheduler may retry
    RetryRequested(u32),
    PermanentFailure,
}

impl MonitoringOutcome {
    fn severity(&self) -> u8 {
        match self {
            MonitoringOutcome::Success => 0,
            MonitoringOutcome::RetryRequested(_) => 1,
            MonitoringOutcome::PermanentFailure => 2,
        }
    }

    /// The more severe of two outcomes.
    pub fn worst(self, other: MonitoringOutcome) -> MonitoringOutcome {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringOutcome::Success => "success",
            MonitoringOutcome::RetryRequested(_) => "retry_requested",
            MonitoringOutcome::PermanentFailure => "permanent_failure",
        }
    }
}

/// How a fetch failure maps onto the sweep outcome.
fn classify(err: &CollaboratorError, attempt: u32) -> MonitoringOutcome {
    if err.is_transient() {
        MonitoringOutcome::RetryRequested(attempt)
    } else {
        MonitoringOutcome::PermanentFailure
    }
}

#[derive(Debug, Default)]
struct SubjectResult {
    outcome: Option<MonitoringOutcome>,
    transitions: usize,
}

#[derive(Clone)]
pub struct MonitoringJob {
    location: Arc<dyn LocationSource>,
    evaluator: Arc<SampleEvaluator>,
    fetch_timeout: Duration,
    max_concurrent_subjects: usize,
}

impl MonitoringJob {
    pub fn new(
        location: Arc<dyn LocationSource>,
        evaluator: Arc<SampleEvaluator>,
        fetch_timeout: Duration,
        max_concurrent_subjects: usize,
    ) -> Self {
        Self {
            location,
            evaluator,
            fetch_timeout,
            max_concurrent_subjects: max_concurrent_subjects.max(1),
        }
    }

    /// Run one sweep. Never returns an error; failures are folded into the outcome.
    pub async fn run(&self, attempt: u32) -> MonitoringOutcome {
        let run_id = format!("sweep-{}", Uuid::new_v4());
        self.sweep(attempt, &run_id)
            .instrument(obs::sweep_span(&run_id))
            .await
    }

    async fn sweep(&self, attempt: u32, run_id: &str) -> MonitoringOutcome {
        let started = Instant::now();
        METRICS.inc_sweeps();

        let subjects = match tokio::time::timeout(self.fetch_timeout, self.location.subjects()).await
        {
            Ok(Ok(subjects)) => subjects,
            Ok(Err(e)) => {
                warn!(error = %e, "listing subjects failed");
                return self.finish(run_id, started, 0, classify(&e, attempt));
            }
            Err(_) => {
                warn!(timeout_ms = self.fetch_timeout.as_millis() as u64, "listing subjects timed out");
                return self.finish(run_id, started, 0, MonitoringOutcome::RetryRequested(attempt));
            }
        };
        obs::emit_sweep_started(run_id, attempt, subjects.len());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_subjects));
        let mut join_set = JoinSet::new();
        for subject in subjects {
            self.evaluator.directory().remember(&subject);
            let job = self.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    job.evaluate_subject(&subject, attempt).await
                }
                .in_current_span(),
            );
        }

        let mut outcome = MonitoringOutcome::Success;
        let mut transitions = 0;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    transitions += result.transitions;
                    if let Some(subject_outcome) = result.outcome {
                        outcome = outcome.worst(subject_outcome);
                    }
                }
                Err(e) => {
                    error!(error = %e, "subject evaluation task failed");
                    outcome = outcome.worst(MonitoringOutcome::PermanentFailure);
                }
            }
        }

        self.finish(run_id, started, transitions, outcome)
    }

    async fn evaluate_subject(&self, subject: &Subject, attempt: u32) -> SubjectResult {
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.location.latest_sample(&subject.subject_id),
        )
        .await;

        let sample = match fetched {
            Ok(Ok(Some(sample))) => sample,
            Ok(Ok(None)) => return SubjectResult::default(),
            Ok(Err(e)) => {
                let err = if e.is_transient() {
                    MonitorError::TransientFetchFailure {
                        subject_id: subject.subject_id.to_string(),
                        detail: e.to_string(),
                    }
                } else {
                    MonitorError::PermanentFailure(e.to_string())
                };
                warn!(subject_id = %subject.subject_id, error = %err, "location fetch failed");
                return SubjectResult {
                    outcome: Some(classify(&e, attempt)),
                    transitions: 0,
                };
            }
            Err(_) => {
                warn!(
                    subject_id = %subject.subject_id,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "location fetch timed out"
                );
                return SubjectResult {
                    outcome: Some(MonitoringOutcome::RetryRequested(attempt)),
                    transitions: 0,
                };
            }
        };

        match self.evaluator.evaluate(&sample, TriggerSource::Periodic).await {
            Ok(report) => SubjectResult {
                outcome: None,
                transitions: report.events.len(),
            },
            Err(e) => {
                warn!(subject_id = %subject.subject_id, error = %e, "sample rejected");
                SubjectResult {
                    outcome: Some(MonitoringOutcome::PermanentFailure),
                    transitions: 0,
                }
            }
        }
    }

    fn finish(
        &self,
        run_id: &str,
        started: Instant,
        transitions: usize,
        outcome: MonitoringOutcome,
    ) -> MonitoringOutcome {
        obs::emit_sweep_finished(
            run_id,
            started.elapsed().as_millis() as u64,
            transitions,
            outcome.as_str(),
        );
        METRICS.flush();
        outcome
    }
}

#[async_trait]
impl ScheduledJob for MonitoringJob {
    async fn run(&self, attempt: u32) -> MonitoringOutcome {
        MonitoringJob::run(self, attempt).await
    }
}
