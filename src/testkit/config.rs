//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use crate::infrastructure::config::limiter::RateLimitConfig;
use crate::infrastructure::config::lots::LotConfig;
use crate::infrastructure::config::recovery::RecoveryConfig;
use crate::infrastructure::config::session::{SessionConfig, SessionTimeouts};
use crate::infrastructure::config::settings::Config;

/// Listing config with zero backoff so tests never sleep.
pub fn lots() -> LotConfig {
    LotConfig {
        retry_step_ms: 0,
        error_step_ms: 0,
        max_backoff_ms: 0,
        ..LotConfig::default()
    }
}

/// Send pacing with every delay disabled.
pub fn limits() -> RateLimitConfig {
    RateLimitConfig {
        min_send_delay_secs: 0.0,
        per_recipient_delay_secs: 0.0,
        burst_window_secs: 10.0,
        burst_max_sends: 10_000,
        send_jitter_secs: 0.0,
    }
}

/// Session config for the named sessions; the first one is primary.
///
/// Timeouts are short so a hung fake fails a test quickly instead of
/// stalling it.
pub fn sessions(names: &[&str], auto_switch: bool) -> SessionConfig {
    SessionConfig {
        sessions: names.iter().map(|name| (*name).to_string()).collect(),
        primary: names.first().map_or_else(String::new, |name| (*name).to_string()),
        auto_switch,
        timeouts: SessionTimeouts {
            ping_ms: 2_000,
            restart_ms: 2_000,
            restart_pause_ms: 0,
            send_ms: 2_000,
            balance_ms: 2_000,
        },
        ..SessionConfig::default()
    }
}

/// Recovery config with default cooldowns and no network pause.
pub fn recovery() -> RecoveryConfig {
    RecoveryConfig {
        network_pause_secs: 0.0,
        ..RecoveryConfig::default()
    }
}

/// Full application config for delivery tests.
pub fn app(names: &[&str], auto_switch: bool) -> Config {
    Config {
        orders: crate::infrastructure::config::order::OrderConfig {
            reply_cooldown_secs: 0.0,
            ..Default::default()
        },
        limits: limits(),
        sessions: sessions(names, auto_switch),
        recovery: recovery(),
        lots: lots(),
        ..Config::default()
    }
}
