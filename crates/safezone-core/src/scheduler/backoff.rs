//! Retry backoff for scheduled runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest delay any policy will wait between attempts.
pub const MIN_BACKOFF_FLOOR: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// `min_delay * attempt`
    #[default]
    Linear,
    /// `min_delay * 2^(attempt - 1)`
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub kind: BackoffKind,
    /// Raised to [`MIN_BACKOFF_FLOOR`] when lower
    pub min_delay_secs: u64,
    /// Total attempts per execution, the first one included
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::linear(MIN_BACKOFF_FLOOR, 3)
    }
}

impl BackoffPolicy {
    pub fn linear(min_delay: Duration, max_attempts: u32) -> Self {
        Self {
            kind: BackoffKind::Linear,
            min_delay_secs: min_delay.as_secs(),
            max_attempts,
        }
    }

    pub fn exponential(min_delay: Duration, max_attempts: u32) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            ..Self::linear(min_delay, max_attempts)
        }
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(self.min_delay_secs).max(MIN_BACKOFF_FLOOR)
    }

    /// Whether another attempt may follow the (1-based) `attempt` that just failed.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Wait before the attempt following `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.kind {
            BackoffKind::Linear => self.min_delay().saturating_mul(attempt),
            BackoffKind::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.min_delay().saturating_mul(factor)
            }
        }
    }
}
