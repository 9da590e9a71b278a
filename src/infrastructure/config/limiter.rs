//! Per-session send throttling configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::limiter::RateLimits;

/// Send pacing applied to every session independently.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum pause between any two sends on one session (seconds).
    #[serde(default = "default_min_send_delay")]
    pub min_send_delay_secs: f64,
    /// Minimum pause between two sends to the same recipient (seconds).
    #[serde(default = "default_per_recipient_delay")]
    pub per_recipient_delay_secs: f64,
    /// Length of the sliding burst window (seconds).
    #[serde(default = "default_burst_window")]
    pub burst_window_secs: f64,
    /// Maximum sends inside one burst window.
    #[serde(default = "default_burst_max_sends")]
    pub burst_max_sends: usize,
    /// Upper bound of the random jitter added to non-zero waits (seconds).
    #[serde(default = "default_send_jitter")]
    pub send_jitter_secs: f64,
}

const fn default_min_send_delay() -> f64 {
    0.35
}

const fn default_per_recipient_delay() -> f64 {
    1.20
}

const fn default_burst_window() -> f64 {
    10.0
}

const fn default_burst_max_sends() -> usize {
    20
}

const fn default_send_jitter() -> f64 {
    0.08
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_send_delay_secs: default_min_send_delay(),
            per_recipient_delay_secs: default_per_recipient_delay(),
            burst_window_secs: default_burst_window(),
            burst_max_sends: default_burst_max_sends(),
            send_jitter_secs: default_send_jitter(),
        }
    }
}

pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl From<&RateLimitConfig> for RateLimits {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            min_delay: secs(config.min_send_delay_secs),
            per_recipient_delay: secs(config.per_recipient_delay_secs),
            burst_window: secs(config.burst_window_secs),
            burst_max: config.burst_max_sends,
            jitter: secs(config.send_jitter_secs),
        }
    }
}
