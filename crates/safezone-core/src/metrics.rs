//! Global atomic counters for SafeZone monitoring.
//!
//! Counters are bumped at the call site without logging. [`Metrics::flush`]
//! emits every current value as one `tracing::info!` event; the monitoring
//! job calls it at the end of each sweep.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    sweeps_run: AtomicU64,
    samples_evaluated: AtomicU64,
    stale_samples_rejected: AtomicU64,
    transitions_emitted: AtomicU64,
    notifications_failed: AtomicU64,
    history_writes_failed: AtomicU64,
    passive_callbacks_ignored: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            sweeps_run: AtomicU64::new(0),
            samples_evaluated: AtomicU64::new(0),
            stale_samples_rejected: AtomicU64::new(0),
            transitions_emitted: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            history_writes_failed: AtomicU64::new(0),
            passive_callbacks_ignored: AtomicU64::new(0),
        }
    }

    pub fn inc_sweeps(&self) {
        self.sweeps_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sweeps_run", "counter incremented");
    }

    pub fn inc_samples_evaluated(&self) {
        self.samples_evaluated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "samples_evaluated", "counter incremented");
    }

    pub fn inc_stale_rejected(&self) {
        self.stale_samples_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stale_samples_rejected", "counter incremented");
    }

    pub fn inc_transitions(&self) {
        self.transitions_emitted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "transitions_emitted", "counter incremented");
    }

    pub fn inc_notifications_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "notifications_failed", "counter incremented");
    }

    pub fn inc_history_writes_failed(&self) {
        self.history_writes_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "history_writes_failed", "counter incremented");
    }

    pub fn inc_passive_ignored(&self) {
        self.passive_callbacks_ignored.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "passive_callbacks_ignored", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            sweeps_run = self.sweeps_run(),
            samples_evaluated = self.samples_evaluated(),
            stale_samples_rejected = self.stale_samples_rejected(),
            transitions_emitted = self.transitions_emitted(),
            notifications_failed = self.notifications_failed(),
            history_writes_failed = self.history_writes_failed(),
            passive_callbacks_ignored = self.passive_callbacks_ignored(),
        );
    }

    pub fn sweeps_run(&self) -> u64 {
        self.sweeps_run.load(Ordering::Relaxed)
    }

    pub fn samples_evaluated(&self) -> u64 {
        self.samples_evaluated.load(Ordering::Relaxed)
    }

    pub fn stale_samples_rejected(&self) -> u64 {
        self.stale_samples_rejected.load(Ordering::Relaxed)
    }

    pub fn transitions_emitted(&self) -> u64 {
        self.transitions_emitted.load(Ordering::Relaxed)
    }

    pub fn notifications_failed(&self) -> u64 {
        self.notifications_failed.load(Ordering::Relaxed)
    }

    pub fn history_writes_failed(&self) -> u64 {
        self.history_writes_failed.load(Ordering::Relaxed)
    }

    pub fn passive_callbacks_ignored(&self) -> u64 {
        self.passive_callbacks_ignored.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.sweeps_run.store(0, Ordering::Relaxed);
        self.samples_evaluated.store(0, Ordering::Relaxed);
        self.stale_samples_rejected.store(0, Ordering::Relaxed);
        self.transitions_emitted.store(0, Ordering::Relaxed);
        self.notifications_failed.store(0, Ordering::Relaxed);
        self.history_writes_failed.store(0, Ordering::Relaxed);
        self.passive_callbacks_ignored.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_sweeps();
        m.inc_samples_evaluated();
        m.inc_samples_evaluated();
        m.inc_stale_rejected();
        m.inc_transitions();
        m.inc_notifications_failed();
        m.inc_history_writes_failed();
        m.inc_passive_ignored();
        m.inc_passive_ignored();

        assert_eq!(m.sweeps_run(), 1);
        assert_eq!(m.samples_evaluated(), 2);
        assert_eq!(m.stale_samples_rejected(), 1);
        assert_eq!(m.transitions_emitted(), 1);
        assert_eq!(m.notifications_failed(), 1);
        assert_eq!(m.history_writes_failed(), 1);
        assert_eq!(m.passive_callbacks_ignored(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_sweeps();
        m.inc_transitions();
        m.inc_passive_ignored();
        m.reset();
        assert_eq!(m.sweeps_run(), 0);
        assert_eq!(m.transitions_emitted(), 0);
        assert_eq!(m.passive_callbacks_ignored(), 0);
    }
}
