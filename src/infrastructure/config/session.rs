//! Session pool configuration.

use std::time::Duration;

use serde::Deserialize;

use super::limiter::secs;

/// Messaging account pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session names in configuration order. Empty means "whatever the
    /// caller discovered".
    #[serde(default)]
    pub sessions: Vec<String>,
    /// Preferred session; falls back to the first alive one.
    #[serde(default = "default_primary")]
    pub primary: String,
    /// Try other sessions when the active one fails transiently.
    #[serde(default)]
    pub auto_switch: bool,
    /// Pick a session with enough balance before collecting recipients.
    #[serde(default = "default_true")]
    pub auto_select_for_precheck: bool,
    #[serde(default = "default_balance_cache")]
    pub balance_cache_secs: f64,
    /// How long a failed balance query is remembered as unknown.
    #[serde(default = "default_unknown_balance_cache")]
    pub unknown_balance_cache_secs: f64,
    /// Username to peer id cache lifetime.
    #[serde(default = "default_username_cache_ttl")]
    pub username_cache_ttl_secs: u64,
    #[serde(default)]
    pub timeouts: SessionTimeouts,
}

/// Deadlines for calls into the session worker.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTimeouts {
    #[serde(default = "default_ping_ms")]
    pub ping_ms: u64,
    #[serde(default = "default_restart_ms")]
    pub restart_ms: u64,
    /// Pause between stop and start during a restart.
    #[serde(default = "default_restart_pause_ms")]
    pub restart_pause_ms: u64,
    #[serde(default = "default_send_ms")]
    pub send_ms: u64,
    #[serde(default = "default_balance_ms")]
    pub balance_ms: u64,
}

fn default_primary() -> String {
    "stars".into()
}

const fn default_true() -> bool {
    true
}

const fn default_balance_cache() -> f64 {
    10.0
}

const fn default_unknown_balance_cache() -> f64 {
    3.0
}

const fn default_username_cache_ttl() -> u64 {
    86_400 // 1 day
}

const fn default_ping_ms() -> u64 {
    5_000
}

const fn default_restart_ms() -> u64 {
    20_000
}

const fn default_restart_pause_ms() -> u64 {
    200
}

const fn default_send_ms() -> u64 {
    30_000
}

const fn default_balance_ms() -> u64 {
    10_000
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            ping_ms: default_ping_ms(),
            restart_ms: default_restart_ms(),
            restart_pause_ms: default_restart_pause_ms(),
            send_ms: default_send_ms(),
            balance_ms: default_balance_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            primary: default_primary(),
            auto_switch: false,
            auto_select_for_precheck: default_true(),
            balance_cache_secs: default_balance_cache(),
            unknown_balance_cache_secs: default_unknown_balance_cache(),
            username_cache_ttl_secs: default_username_cache_ttl(),
            timeouts: SessionTimeouts::default(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn balance_ttl(&self) -> Duration {
        secs(self.balance_cache_secs)
    }

    #[must_use]
    pub fn unknown_balance_ttl(&self) -> Duration {
        secs(self.unknown_balance_cache_secs)
    }

    #[must_use]
    pub const fn username_ttl(&self) -> Duration {
        Duration::from_secs(self.username_cache_ttl_secs)
    }
}

impl SessionTimeouts {
    #[must_use]
    pub const fn ping(&self) -> Duration {
        Duration::from_millis(self.ping_ms)
    }

    #[must_use]
    pub const fn restart(&self) -> Duration {
        Duration::from_millis(self.restart_ms)
    }

    #[must_use]
    pub const fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }

    #[must_use]
    pub const fn send(&self) -> Duration {
        Duration::from_millis(self.send_ms)
    }

    #[must_use]
    pub const fn balance(&self) -> Duration {
        Duration::from_millis(self.balance_ms)
    }
}
