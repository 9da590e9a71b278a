//! Main application configuration.
//!
//! Loaded from a TOML file, then overridden by the flat environment keys a
//! `.env` deployment uses (see [`super::env`]).
//!
//! ```no_run
//! use giftcourier::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::env;
use super::limiter::RateLimitConfig;
use super::logging::LoggingConfig;
use super::lots::LotConfig;
use super::order::OrderConfig;
use super::recovery::RecoveryConfig;
use super::session::SessionConfig;
use crate::error::{ConfigError, Result};

/// Locations of the catalog, bundle and template files.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_gifts_path")]
    pub gifts: PathBuf,
    #[serde(default = "default_gift_sets_path")]
    pub gift_sets: PathBuf,
    #[serde(default = "default_messages_path")]
    pub messages: PathBuf,
}

fn default_gifts_path() -> PathBuf {
    PathBuf::from("gifts.json")
}

fn default_gift_sets_path() -> PathBuf {
    PathBuf::from("gift_sets.json")
}

fn default_messages_path() -> PathBuf {
    PathBuf::from("messages.json")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            gifts: default_gifts_path(),
            gift_sets: default_gift_sets_path(),
            messages: default_messages_path(),
        }
    }
}

/// Main application configuration.
///
/// Every section is optional; missing sections take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Order acceptance, confirmation and settlement.
    #[serde(default)]
    pub orders: OrderConfig,

    /// Per-session send pacing.
    #[serde(default)]
    pub limits: RateLimitConfig,

    #[serde(default)]
    pub sessions: SessionConfig,

    /// Cooldowns after classified send failures.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub lots: LotConfig,

    #[serde(default)]
    pub data: DataConfig,
}

impl Config {
    /// Parse configuration from a TOML string, apply environment overrides
    /// and validate.
    pub fn parse_toml(content: &str) -> Result<Self> {
        Self::parse_toml_with(content, |key| std::env::var(key).ok())
    }

    /// Like [`Config::parse_toml`] with an explicit variable lookup.
    pub fn parse_toml_with(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        env::apply_overrides(&mut config, lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.orders.marker_key.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "marker_key",
            }
            .into());
        }
        if self.orders.category_ids.is_empty() {
            return Err(ConfigError::MissingField {
                field: "category_ids",
            }
            .into());
        }
        if self.orders.confirm_token.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "confirm_token",
            }
            .into());
        }
        if url::Url::parse(&self.orders.order_url_base).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "order_url_base",
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        let delays = [
            ("reply_cooldown_secs", self.orders.reply_cooldown_secs),
            ("min_send_delay_secs", self.limits.min_send_delay_secs),
            ("per_recipient_delay_secs", self.limits.per_recipient_delay_secs),
            ("send_jitter_secs", self.limits.send_jitter_secs),
            ("balance_cache_secs", self.sessions.balance_cache_secs),
            ("unknown_balance_cache_secs", self.sessions.unknown_balance_cache_secs),
            ("flood_extra_secs", self.recovery.flood_extra_secs),
            ("network_pause_secs", self.recovery.network_pause_secs),
        ];
        for (field, value) in delays {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be a non-negative number of seconds".to_string(),
                }
                .into());
            }
        }

        if !self.limits.burst_window_secs.is_finite() || self.limits.burst_window_secs <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "burst_window_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.limits.burst_max_sends == 0 {
            return Err(ConfigError::InvalidValue {
                field: "burst_max_sends",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        let timeouts = &self.sessions.timeouts;
        if timeouts.ping_ms == 0
            || timeouts.restart_ms == 0
            || timeouts.send_ms == 0
            || timeouts.balance_ms == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "timeouts",
                reason: "session timeouts must be greater than 0".to_string(),
            }
            .into());
        }

        if self.lots.auto_raise && self.lots.raise_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "raise_interval_secs",
                reason: "must be greater than 0 when auto_raise is enabled".to_string(),
            }
            .into());
        }
        if self.lots.update_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "update_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
