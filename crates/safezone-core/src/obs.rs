//! Structured observability hooks for the monitoring lifecycle.
//!
//! - `SweepSpan`: RAII guard entering a sweep-scoped span
//! - `emit_*`: one function per lifecycle event, each tagged `event = "..."`

use safezone_state::{ContainmentState, SubjectId, TriggerSource, ZoneId};
use tracing::{info, warn};

use crate::error::SideEffect;

/// RAII guard that enters a `safezone.sweep` span tagged with the run id.
///
/// Only use this in synchronous sections; across `.await` points attach
/// [`sweep_span`] with `Instrument` instead.
pub struct SweepSpan {
    _span: tracing::span::EnteredSpan,
}

impl SweepSpan {
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: sweep_span(run_id).entered(),
        }
    }
}

/// The span a sweep runs inside.
pub fn sweep_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("safezone.sweep", run_id = %run_id)
}

pub fn emit_sweep_started(run_id: &str, attempt: u32, subjects: usize) {
    info!(
        event = "sweep.started",
        run_id = %run_id,
        attempt = attempt,
        subjects = subjects,
    );
}

pub fn emit_sweep_finished(run_id: &str, duration_ms: u64, transitions: usize, outcome: &str) {
    info!(
        event = "sweep.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        transitions = transitions,
        outcome = %outcome,
    );
}

/// Emit event: containment changed for one (subject, zone) pair.
pub fn emit_transition(
    subject_id: &SubjectId,
    zone_id: &ZoneId,
    from: ContainmentState,
    to: ContainmentState,
    source: TriggerSource,
) {
    info!(
        event = "zone.transition",
        subject_id = %subject_id,
        zone_id = %zone_id,
        from = %from,
        to = %to,
        source = %source,
    );
}

/// Emit event: notify or persist failed (warning level). Never fatal.
pub fn emit_side_effect_failed(
    subject_id: &SubjectId,
    effect: SideEffect,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "alert.side_effect_failed",
        subject_id = %subject_id,
        effect = %effect,
        error = %error,
    );
}

pub fn emit_retry_scheduled(job: &str, attempt: u32, delay_ms: u64) {
    info!(
        event = "scheduler.retry_scheduled",
        job = %job,
        attempt = attempt,
        delay_ms = delay_ms,
    );
}

/// Emit event: retry budget spent; waiting for the next periodic tick.
pub fn emit_retries_exhausted(job: &str, attempts: u32) {
    warn!(event = "scheduler.retries_exhausted", job = %job, attempts = attempts);
}

pub fn emit_run_deferred(job: &str, reason: &str) {
    info!(event = "scheduler.run_deferred", job = %job, reason = %reason);
}
