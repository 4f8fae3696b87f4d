//! Engine configuration.
//!
//! Defaults match a phone-class tracker host: a 15 minute sweep that waits
//! for network and a non-critical battery, with three linear retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};
use crate::scheduler::{BackoffPolicy, RunConstraints};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_minutes: u64,
    pub constraints: RunConstraints,
    pub backoff: BackoffPolicy,
    pub fetch_timeout_secs: u64,
    pub side_effect_timeout_secs: u64,
    pub max_concurrent_subjects: usize,
    /// Tracker battery strictly below this raises a low-battery alert
    pub low_battery_threshold_percent: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            constraints: RunConstraints::default(),
            backoff: BackoffPolicy::default(),
            fetch_timeout_secs: 10,
            side_effect_timeout_secs: 5,
            max_concurrent_subjects: 4,
            low_battery_threshold_percent: 20,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> MonitorResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MonitorError::Config(format!("{name}: cannot parse {raw:?}"))),
        Err(_) => Ok(None),
    }
}

impl MonitorConfig {
    pub fn with_interval_minutes(mut self, minutes: u64) -> Self {
        self.interval_minutes = minutes;
        self
    }

    pub fn with_constraints(mut self, constraints: RunConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_side_effect_timeout(mut self, timeout: Duration) -> Self {
        self.side_effect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_max_concurrent_subjects(mut self, max: usize) -> Self {
        self.max_concurrent_subjects = max;
        self
    }

    pub fn with_low_battery_threshold(mut self, percent: u8) -> Self {
        self.low_battery_threshold_percent = percent;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn side_effect_timeout(&self) -> Duration {
        Duration::from_secs(self.side_effect_timeout_secs)
    }

    /// Defaults overlaid with environment variables.
    ///
    /// Reads (all optional):
    /// - SAFEZONE_INTERVAL_MINUTES
    /// - SAFEZONE_REQUIRE_NETWORK ("true"/"false")
    /// - SAFEZONE_MIN_BATTERY_PERCENT (0 disables the battery constraint)
    /// - SAFEZONE_MAX_ATTEMPTS
    /// - SAFEZONE_BACKOFF_SECS
    /// - SAFEZONE_FETCH_TIMEOUT_SECS
    /// - SAFEZONE_SIDE_EFFECT_TIMEOUT_SECS
    /// - SAFEZONE_MAX_CONCURRENT_SUBJECTS
    /// - SAFEZONE_LOW_BATTERY_PERCENT
    pub fn from_env() -> MonitorResult<Self> {
        let mut config = Self::default();
        if let Some(v) = env_parse("SAFEZONE_INTERVAL_MINUTES")? {
            config.interval_minutes = v;
        }
        if let Ok(v) = std::env::var("SAFEZONE_REQUIRE_NETWORK") {
            config.constraints.require_network = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = env_parse::<u8>("SAFEZONE_MIN_BATTERY_PERCENT")? {
            config.constraints.min_battery_percent = (v > 0).then_some(v);
        }
        if let Some(v) = env_parse("SAFEZONE_MAX_ATTEMPTS")? {
            config.backoff.max_attempts = v;
        }
        if let Some(v) = env_parse("SAFEZONE_BACKOFF_SECS")? {
            config.backoff.min_delay_secs = v;
        }
        if let Some(v) = env_parse("SAFEZONE_FETCH_TIMEOUT_SECS")? {
            config.fetch_timeout_secs = v;
        }
        if let Some(v) = env_parse("SAFEZONE_SIDE_EFFECT_TIMEOUT_SECS")? {
            config.side_effect_timeout_secs = v;
        }
        if let Some(v) = env_parse("SAFEZONE_MAX_CONCURRENT_SUBJECTS")? {
            config.max_concurrent_subjects = v;
        }
        if let Some(v) = env_parse("SAFEZONE_LOW_BATTERY_PERCENT")? {
            config.low_battery_threshold_percent = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MonitorResult<()> {
        let fail = |msg: &str| Err(MonitorError::Config(msg.to_string()));
        if self.interval_minutes == 0 {
            return fail("interval_minutes must be at least 1");
        }
        if self.interval_minutes.checked_mul(60).is_none() {
            return fail("interval_minutes is too large");
        }
        if self.backoff.max_attempts == 0 {
            return fail("backoff.max_attempts must be at least 1");
        }
        if self.fetch_timeout_secs == 0 || self.side_effect_timeout_secs == 0 {
            return fail("timeouts must be at least one second");
        }
        if self.max_concurrent_subjects == 0 {
            return fail("max_concurrent_subjects must be at least 1");
        }
        if self.low_battery_threshold_percent > 100 {
            return fail("low_battery_threshold_percent must be within 0..=100");
        }
        if self.constraints.min_battery_percent.is_some_and(|p| p > 100) {
            return fail("constraints.min_battery_percent must be within 0..=100");
        }
        Ok(())
    }
}
