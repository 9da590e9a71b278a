//! Failure recovery configuration.

use std::time::Duration;

use serde::Deserialize;

use super::limiter::secs;

/// Cooldowns applied after classified send failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryConfig {
    /// Added on top of a platform flood wait (seconds).
    #[serde(default = "default_flood_extra")]
    pub flood_extra_secs: f64,
    /// Session cooldown after a spam block.
    #[serde(default = "default_spam_block_pause")]
    pub spam_block_pause_secs: u64,
    /// Session cooldown after a network failure.
    #[serde(default = "default_network_pause")]
    pub network_pause_secs: f64,
    /// Cooldown used for a flood without an explicit wait.
    #[serde(default = "default_flood_fallback")]
    pub flood_fallback_secs: u64,
    /// Deactivate listings when a flood wait is hit.
    #[serde(default)]
    pub deactivate_on_flood: bool,
    /// Minimum spacing between flood-triggered deactivations.
    #[serde(default = "default_flood_deactivate_cooldown")]
    pub flood_deactivate_cooldown_secs: u64,
}

const fn default_flood_extra() -> f64 {
    0.30
}

const fn default_spam_block_pause() -> u64 {
    21_600 // 6 hours
}

const fn default_network_pause() -> f64 {
    3.0
}

const fn default_flood_fallback() -> u64 {
    60
}

const fn default_flood_deactivate_cooldown() -> u64 {
    900
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            flood_extra_secs: default_flood_extra(),
            spam_block_pause_secs: default_spam_block_pause(),
            network_pause_secs: default_network_pause(),
            flood_fallback_secs: default_flood_fallback(),
            deactivate_on_flood: false,
            flood_deactivate_cooldown_secs: default_flood_deactivate_cooldown(),
        }
    }
}

impl RecoveryConfig {
    #[must_use]
    pub fn flood_extra(&self) -> Duration {
        secs(self.flood_extra_secs)
    }

    #[must_use]
    pub const fn spam_block_pause(&self) -> Duration {
        Duration::from_secs(self.spam_block_pause_secs)
    }

    #[must_use]
    pub fn network_pause(&self) -> Duration {
        secs(self.network_pause_secs)
    }

    #[must_use]
    pub const fn flood_fallback(&self) -> Duration {
        Duration::from_secs(self.flood_fallback_secs)
    }

    #[must_use]
    pub const fn flood_deactivate_cooldown(&self) -> Duration {
        Duration::from_secs(self.flood_deactivate_cooldown_secs)
    }
}
