//! Listing management configuration.

use std::time::Duration;

use serde::Deserialize;

/// Listing toggling and auto-raise settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LotConfig {
    /// Periodically raise listings in every allowed category.
    #[serde(default)]
    pub auto_raise: bool,
    #[serde(default = "default_raise_interval")]
    pub raise_interval_secs: u64,
    /// Attempts to flip one listing's active flag.
    #[serde(default = "default_update_attempts")]
    pub update_attempts: u32,
    /// Backoff step between update attempts (milliseconds).
    #[serde(default = "default_retry_step")]
    pub retry_step_ms: u64,
    /// Backoff step per consecutive error during bulk deactivation.
    #[serde(default = "default_error_step")]
    pub error_step_ms: u64,
    /// Upper bound for either backoff.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

const fn default_raise_interval() -> u64 {
    3_600
}

const fn default_update_attempts() -> u32 {
    3
}

const fn default_retry_step() -> u64 {
    500
}

const fn default_error_step() -> u64 {
    200
}

const fn default_max_backoff() -> u64 {
    1_500
}

impl Default for LotConfig {
    fn default() -> Self {
        Self {
            auto_raise: false,
            raise_interval_secs: default_raise_interval(),
            update_attempts: default_update_attempts(),
            retry_step_ms: default_retry_step(),
            error_step_ms: default_error_step(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl LotConfig {
    #[must_use]
    pub const fn raise_interval(&self) -> Duration {
        Duration::from_secs(self.raise_interval_secs)
    }

    /// Backoff after the `attempt`-th failed update (1-based).
    #[must_use]
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis((self.retry_step_ms * u64::from(attempt)).min(self.max_backoff_ms))
    }

    /// Backoff after `errors` consecutive failures in a bulk pass.
    #[must_use]
    pub fn error_backoff(&self, errors: u32) -> Duration {
        Duration::from_millis((self.error_step_ms * u64::from(errors)).min(self.max_backoff_ms))
    }
}
